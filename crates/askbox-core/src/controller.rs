//! The chat turn lifecycle
//!
//! A turn goes: validate → clear input → show user message → show loading
//! placeholder → disable controls → one POST → answer or error message →
//! re-enable controls. The last step lives in [`BusyGuard`]'s `Drop` so it
//! runs on every exit path, including a dropped or panicking turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::{decode_answer, AskRequest, Transport};
use crate::error::AskError;
use crate::format::format_message;
use crate::state::{ChatMessage, ChatRole, LoadingId, LoadingToken, Transcript};

pub const USER_ICON: &str = "👤";
pub const ASSISTANT_ICON: &str = "🤖";

/// Portrait used for the assistant by [`AvatarStyle::graphic`].
pub const DEFAULT_ASSISTANT_GRAPHIC: &str = concat!(
    r##"<svg width="24" height="24" viewBox="0 0 32 32" fill="none" xmlns="http://www.w3.org/2000/svg">"##,
    r##"<circle cx="16" cy="14" r="10" fill="#FFDBAC" stroke="#D4A574" stroke-width="1"/>"##,
    r##"<rect x="6" y="10" width="8" height="6" rx="1" fill="none" stroke="currentColor" stroke-width="1.5"/>"##,
    r##"<rect x="18" y="10" width="8" height="6" rx="1" fill="none" stroke="currentColor" stroke-width="1.5"/>"##,
    r##"<line x1="14" y1="13" x2="18" y2="13" stroke="currentColor" stroke-width="1.5"/>"##,
    r##"<circle cx="10" cy="13" r="2" fill="currentColor"/>"##,
    r##"<circle cx="22" cy="13" r="2" fill="currentColor"/>"##,
    r##"<path d="M 6 8 Q 8 4, 12 6 Q 16 4, 20 6 Q 24 4, 26 8 Q 24 10, 22 9 Q 20 11, 18 10 Q 16 12, 14 10 Q 12 11, 10 9 Q 8 10, 6 8" fill="currentColor"/>"##,
    r##"<path d="M 10 18 Q 16 22, 22 18" stroke="currentColor" stroke-width="1.5" fill="none" stroke-linecap="round"/>"##,
    r##"</svg>"##,
);

/// What a surface should draw next to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Avatar {
    Icon(String),
    Graphic(String),
}

/// How assistant messages are decorated. User messages always get the icon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AvatarStyle {
    #[default]
    Icon,
    Graphic(String),
}

impl AvatarStyle {
    pub fn graphic() -> Self {
        AvatarStyle::Graphic(DEFAULT_ASSISTANT_GRAPHIC.to_string())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "icon" => Some(AvatarStyle::Icon),
            "graphic" => Some(AvatarStyle::graphic()),
            _ => None,
        }
    }

    pub fn avatar_for(&self, role: ChatRole) -> Avatar {
        match (role, self) {
            (ChatRole::User, _) => Avatar::Icon(USER_ICON.to_string()),
            (ChatRole::Assistant, AvatarStyle::Icon) => Avatar::Icon(ASSISTANT_ICON.to_string()),
            (ChatRole::Assistant, AvatarStyle::Graphic(markup)) => Avatar::Graphic(markup.clone()),
        }
    }
}

/// Presentation knobs that differ between hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub avatar: AvatarStyle,
    /// Switch the surface from its centered empty layout to the scrolling
    /// transcript layout when the first message arrives.
    pub transition_to_active_layout_on_first_message: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            avatar: AvatarStyle::Icon,
            transition_to_active_layout_on_first_message: true,
        }
    }
}

/// A message ready to draw: the message itself, its markup and avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub message: ChatMessage,
    pub markup: String,
    pub avatar: Avatar,
}

impl RenderedMessage {
    pub fn new(message: ChatMessage, style: &AvatarStyle) -> Self {
        let markup = format_message(message.text());
        let avatar = style.avatar_for(message.role());
        Self {
            message,
            markup,
            avatar,
        }
    }
}

/// Where the chat is displayed.
///
/// Calls arrive in transcript order from whichever task runs the turn, so
/// implementations use interior mutability and must be cheap.
pub trait RenderSurface: Send + Sync {
    /// Append a message to the transcript view.
    fn render_message(&self, message: &RenderedMessage);

    /// Append the loading placeholder for a pending answer.
    fn render_loading(&self, id: LoadingId, avatar: &Avatar);

    fn remove_loading(&self, id: LoadingId);

    fn input_value(&self) -> String;

    fn set_input_value(&self, value: &str);

    /// Enable or disable both the input field and the submit control.
    fn set_controls_enabled(&self, enabled: bool);

    fn focus_input(&self);

    /// Leave the centered empty layout. Called at most once.
    fn enter_active_layout(&self) {}
}

/// How a submission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty input, or a request was already in flight.
    Ignored,
    Answered(String),
    Failed(AskError),
}

struct Inner {
    transport: Arc<dyn Transport>,
    surface: Arc<dyn RenderSurface>,
    config: ControllerConfig,
    processing: AtomicBool,
    layout_active: AtomicBool,
    transcript: Mutex<Transcript>,
}

impl Inner {
    fn transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, message: ChatMessage) {
        if self.config.transition_to_active_layout_on_first_message
            && !self.layout_active.swap(true, Ordering::SeqCst)
        {
            self.surface.enter_active_layout();
        }

        let rendered = RenderedMessage::new(message.clone(), &self.config.avatar);
        self.transcript().push_message(message);
        self.surface.render_message(&rendered);
    }

    fn push_loading(&self) -> LoadingToken {
        let token = self.transcript().push_loading();
        let avatar = self.config.avatar.avatar_for(ChatRole::Assistant);
        self.surface.render_loading(token.id(), &avatar);
        token
    }

    fn remove_loading(&self, token: LoadingToken) {
        let id = token.id();
        if self.transcript().remove_loading(token) {
            self.surface.remove_loading(id);
        }
    }
}

/// Holds the busy flag for one turn and hands the controls back on drop.
struct BusyGuard {
    inner: Arc<Inner>,
}

impl BusyGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner.processing.store(false, Ordering::SeqCst);
        self.inner.surface.set_controls_enabled(true);
        self.inner.surface.focus_input();
    }
}

/// A turn that has been accepted and is waiting to send its request.
pub struct Turn {
    inner: Arc<Inner>,
    question: String,
    loading: Option<LoadingToken>,
    started: Instant,
    _busy: BusyGuard,
}

impl Turn {
    /// Send the request and render the result.
    pub async fn run(mut self) -> TurnOutcome {
        let request = AskRequest::new(&self.question);
        let result = match self.inner.transport.post(&request).await {
            Ok(reply) => decode_answer(reply),
            Err(err) => Err(err),
        };

        if let Some(token) = self.loading.take() {
            self.inner.remove_loading(token);
        }

        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match result {
            Ok(answer) => {
                info!(elapsed_ms, "answer received");
                self.inner.append(ChatMessage::assistant(answer.clone()));
                TurnOutcome::Answered(answer)
            }
            Err(err) => {
                error!(error = %err, elapsed_ms, "error sending message");
                self.inner.append(ChatMessage::error(format!(
                    "Sorry, I encountered an error: {}. Please try again.",
                    err
                )));
                TurnOutcome::Failed(err)
            }
        }
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        // Only reached with a token when the turn never finished.
        if let Some(token) = self.loading.take() {
            self.inner.remove_loading(token);
        }
    }
}

/// Owns the in-flight flag and the transcript for one chat widget.
#[derive(Clone)]
pub struct ChatTurnController {
    inner: Arc<Inner>,
}

impl ChatTurnController {
    pub fn new(
        transport: Arc<dyn Transport>,
        surface: Arc<dyn RenderSurface>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                surface,
                config,
                processing: AtomicBool::new(false),
                layout_active: AtomicBool::new(false),
                transcript: Mutex::new(Transcript::new()),
            }),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    /// Snapshot of the transcript.
    pub fn transcript(&self) -> Transcript {
        self.inner.transcript().clone()
    }

    /// Accept a submission and do everything up to sending the request.
    ///
    /// Returns `None` without touching anything when the trimmed input is
    /// empty or another turn is in flight.
    pub fn begin_turn(&self, raw_input: &str) -> Option<Turn> {
        let question = raw_input.trim();
        if question.is_empty() {
            debug!("ignoring empty submission");
            return None;
        }

        let Some(busy) = BusyGuard::acquire(&self.inner) else {
            debug!("ignoring submission while a request is in flight");
            return None;
        };

        self.inner.surface.set_input_value("");
        self.inner.append(ChatMessage::user(question));
        let loading = self.inner.push_loading();
        self.inner.surface.set_controls_enabled(false);

        info!(chars = question.chars().count(), "sending question");
        Some(Turn {
            inner: Arc::clone(&self.inner),
            question: question.to_string(),
            loading: Some(loading),
            started: Instant::now(),
            _busy: busy,
        })
    }

    /// Run a whole turn to completion.
    pub async fn submit(&self, raw_input: &str) -> TurnOutcome {
        match self.begin_turn(raw_input) {
            Some(turn) => turn.run().await,
            None => TurnOutcome::Ignored,
        }
    }

    /// Fire-and-forget submission. The turn is accepted (or rejected) before
    /// this returns; the exchange itself runs on a spawned task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_submit(&self, raw_input: &str) -> Option<JoinHandle<TurnOutcome>> {
        let turn = self.begin_turn(raw_input)?;
        Some(tokio::spawn(turn.run()))
    }

    /// Submit whatever is currently in the surface's input field.
    pub fn submit_from_input(&self) -> Option<JoinHandle<TurnOutcome>> {
        let value = self.inner.surface.input_value();
        self.spawn_submit(&value)
    }
}
