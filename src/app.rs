use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use askbox_core::{
    AskClient, Avatar, ChatTurnController, Config, ControllerConfig, LoadingId, RenderSurface,
    RenderedMessage, Transport,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;

use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// One entry in the transcript pane.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewItem {
    Message(RenderedMessage),
    Loading { id: LoadingId, avatar: Avatar },
}

/// Everything the controller can change on screen.
#[derive(Debug)]
pub struct ChatView {
    pub items: Vec<ViewItem>,
    pub input: String,
    /// Cursor position in characters, not bytes
    pub cursor: usize,
    pub controls_enabled: bool,
    pub input_focused: bool,
    /// False while the centered welcome layout is shown
    pub active_layout: bool,
    pub scroll: u16,
    /// Keep the newest message in view
    pub follow_bottom: bool,
}

impl ChatView {
    pub fn new(active_layout: bool) -> Self {
        Self {
            items: Vec::new(),
            input: String::new(),
            cursor: 0,
            controls_enabled: true,
            input_focused: true,
            active_layout,
            scroll: 0,
            follow_bottom: true,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// (line, column) of the cursor inside the input, both in characters.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let before: String = self.input.chars().take(self.cursor).collect();
        let line = before.matches('\n').count();
        let col = before
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count())
            .unwrap_or(0);
        (line, col)
    }

    pub fn is_loading(&self) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, ViewItem::Loading { .. }))
    }
}

/// [`RenderSurface`] backed by the shared [`ChatView`].
#[derive(Clone)]
pub struct TuiSurface {
    view: Arc<Mutex<ChatView>>,
    redraw: Option<UnboundedSender<AppEvent>>,
}

impl TuiSurface {
    pub fn new(view: Arc<Mutex<ChatView>>, redraw: Option<UnboundedSender<AppEvent>>) -> Self {
        Self { view, redraw }
    }

    fn update(&self, f: impl FnOnce(&mut ChatView)) {
        f(&mut lock_view(&self.view));
        if let Some(tx) = &self.redraw {
            // the loop is gone when this fails, nothing left to redraw
            let _ = tx.send(AppEvent::Redraw);
        }
    }
}

fn lock_view(view: &Mutex<ChatView>) -> MutexGuard<'_, ChatView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RenderSurface for TuiSurface {
    fn render_message(&self, message: &RenderedMessage) {
        let message = message.clone();
        self.update(|view| {
            view.items.push(ViewItem::Message(message));
            view.follow_bottom = true;
        });
    }

    fn render_loading(&self, id: LoadingId, avatar: &Avatar) {
        let avatar = avatar.clone();
        self.update(|view| {
            view.items.push(ViewItem::Loading { id, avatar });
            view.follow_bottom = true;
        });
    }

    fn remove_loading(&self, id: LoadingId) {
        self.update(|view| {
            view.items
                .retain(|item| !matches!(item, ViewItem::Loading { id: other, .. } if *other == id));
        });
    }

    fn input_value(&self) -> String {
        lock_view(&self.view).input.clone()
    }

    fn set_input_value(&self, value: &str) {
        let value = value.to_string();
        self.update(|view| {
            view.cursor = value.chars().count();
            view.input = value;
        });
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.update(|view| view.controls_enabled = enabled);
    }

    fn focus_input(&self) {
        self.update(|view| view.input_focused = true);
    }

    fn enter_active_layout(&self) {
        self.update(|view| view.active_layout = true);
    }
}

pub struct App {
    pub should_quit: bool,
    pub controller: ChatTurnController,
    pub view: Arc<Mutex<ChatView>>,
    pub endpoint: String,
    pub animation_frame: u8,

    // Layout info for mouse hit-testing and scrolling
    pub chat_area: Option<Rect>,
    pub chat_height: u16,
}

impl App {
    pub fn new(config: &Config, redraw: Option<UnboundedSender<AppEvent>>) -> Self {
        let client = AskClient::new(config.endpoint());
        Self::with_transport(
            Arc::new(client),
            config.controller_config(),
            config.endpoint(),
            redraw,
        )
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        controller_config: ControllerConfig,
        endpoint: &str,
        redraw: Option<UnboundedSender<AppEvent>>,
    ) -> Self {
        // Without the transition the transcript layout is used from the start
        let active = !controller_config.transition_to_active_layout_on_first_message;
        let view = Arc::new(Mutex::new(ChatView::new(active)));
        let surface = Arc::new(TuiSurface::new(view.clone(), redraw));
        let controller = ChatTurnController::new(transport, surface, controller_config);

        Self {
            should_quit: false,
            controller,
            view,
            endpoint: endpoint.to_string(),
            animation_frame: 0,
            chat_area: None,
            chat_height: 0,
        }
    }

    pub fn view(&self) -> MutexGuard<'_, ChatView> {
        lock_view(&self.view)
    }

    /// Send what is in the input box. Ignored by the controller when the box
    /// is blank or an answer is still pending.
    pub fn submit(&mut self) {
        // the turn reports back through the surface; the handle isn't needed
        let _ = self.controller.submit_from_input();
    }

    /// Advance the "Thinking..." animation (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.controller.is_processing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        } else {
            self.animation_frame = 0;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        let mut view = self.view();
        view.follow_bottom = false;
        view.scroll = view.scroll.saturating_sub(lines);
    }

    /// Scrolling past the end re-enables following new messages; the
    /// renderer clamps `scroll` and sets `follow_bottom` when it hits bottom.
    pub fn scroll_down(&mut self, lines: u16) {
        let mut view = self.view();
        view.scroll = view.scroll.saturating_add(lines);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askbox_core::mock::ScriptedTransport;
    use askbox_core::{ChatMessage, LoadingToken, Transcript};

    fn test_app(transport: ScriptedTransport, config: ControllerConfig) -> App {
        App::with_transport(Arc::new(transport), config, "http://test/ask", None)
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let mut view = ChatView::new(true);
        for c in "héllo".chars() {
            view.insert_char(c);
        }
        view.cursor_left();
        view.cursor_left();
        view.backspace();
        assert_eq!(view.input, "hélo");
        assert_eq!(view.cursor, 2);

        view.cursor_home();
        view.delete();
        assert_eq!(view.input, "élo");
        view.cursor_end();
        assert_eq!(view.cursor, 3);
    }

    #[test]
    fn test_cursor_line_col() {
        let mut view = ChatView::new(true);
        for c in "ab\ncde".chars() {
            view.insert_char(c);
        }
        assert_eq!(view.cursor_line_col(), (1, 3));
        view.cursor_home();
        assert_eq!(view.cursor_line_col(), (0, 0));
    }

    #[test]
    fn test_surface_tracks_loading_by_id() {
        let view = Arc::new(Mutex::new(ChatView::new(false)));
        let surface = TuiSurface::new(view.clone(), None);

        let mut transcript = Transcript::new();
        let first: LoadingToken = transcript.push_loading();
        let second = transcript.push_loading();
        let avatar = Avatar::Icon("🤖".to_string());
        surface.render_loading(first.id(), &avatar);
        surface.render_loading(second.id(), &avatar);
        surface.remove_loading(first.id());

        let view = lock_view(&view);
        assert_eq!(view.items.len(), 1);
        assert!(matches!(view.items[0], ViewItem::Loading { id, .. } if id == second.id()));
    }

    #[test]
    fn test_surface_set_input_moves_cursor() {
        let view = Arc::new(Mutex::new(ChatView::new(false)));
        let surface = TuiSurface::new(view.clone(), None);
        surface.set_input_value("abc");
        assert_eq!(lock_view(&view).cursor, 3);
        surface.set_input_value("");
        assert_eq!(lock_view(&view).cursor, 0);
    }

    #[test]
    fn test_layout_starts_active_without_transition() {
        let config = ControllerConfig {
            transition_to_active_layout_on_first_message: false,
            ..ControllerConfig::default()
        };
        let app = test_app(ScriptedTransport::answering("x"), config);
        assert!(app.view().active_layout);

        let app = test_app(ScriptedTransport::answering("x"), ControllerConfig::default());
        assert!(!app.view().active_layout);
    }

    #[tokio::test]
    async fn test_submit_round_trip_through_view() {
        let mut app = test_app(ScriptedTransport::answering("Hi there"), ControllerConfig::default());
        for c in "Hello".chars() {
            app.view().insert_char(c);
        }

        app.submit();
        {
            let view = app.view();
            assert!(view.active_layout);
            assert!(!view.controls_enabled);
            assert!(view.is_loading());
            assert_eq!(view.input, "");
        }

        // let the spawned turn finish
        while app.controller.is_processing() {
            tokio::task::yield_now().await;
        }

        let view = app.view();
        assert!(view.controls_enabled);
        assert!(!view.is_loading());
        let texts: Vec<ChatMessage> = view
            .items
            .iter()
            .filter_map(|item| match item {
                ViewItem::Message(r) => Some(r.message.clone()),
                ViewItem::Loading { .. } => None,
            })
            .collect();
        assert_eq!(
            texts,
            vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there")]
        );
    }

    #[test]
    fn test_scroll_up_stops_following() {
        let mut app = test_app(ScriptedTransport::answering("x"), ControllerConfig::default());
        app.view().scroll = 5;
        app.scroll_up(2);
        assert_eq!(app.view().scroll, 3);
        assert!(!app.view().follow_bottom);
        app.scroll_up(10);
        assert_eq!(app.view().scroll, 0);
    }
}
