use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::App;
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize | AppEvent::Redraw => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work whether or not the input is enabled
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return;
        }
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::PageUp => {
            let page = app.half_page();
            app.scroll_up(page);
            return;
        }
        KeyCode::PageDown => {
            let page = app.half_page();
            app.scroll_down(page);
            return;
        }
        KeyCode::Up if ctrl => {
            app.scroll_up(1);
            return;
        }
        KeyCode::Down if ctrl => {
            app.scroll_down(1);
            return;
        }
        // Enter submits, Shift+Enter (or Alt+Enter where the terminal can't
        // report Shift) inserts a newline
        KeyCode::Enter
            if !key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.submit();
            return;
        }
        _ => {}
    }

    let mut view = app.view();
    if !view.controls_enabled {
        // input is disabled while an answer is pending
        return;
    }

    match key.code {
        KeyCode::Enter => view.insert_char('\n'),
        KeyCode::Backspace => view.backspace(),
        KeyCode::Delete => view.delete(),
        KeyCode::Left => view.cursor_left(),
        KeyCode::Right => view.cursor_right(),
        KeyCode::Home => view.cursor_home(),
        KeyCode::End => view.cursor_end(),
        KeyCode::Char(c) if !ctrl => view.insert_char(c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}
