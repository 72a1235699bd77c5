//! In-memory transports and surfaces for tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::client::{AskRequest, HttpReply, Transport};
use crate::controller::{Avatar, RenderSurface, RenderedMessage};
use crate::error::AskError;
use crate::state::LoadingId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A transport that pops pre-scripted replies, one per call, and remembers
/// every request it saw.
pub struct ScriptedTransport {
    replies: Mutex<Vec<Result<HttpReply, AskError>>>,
    requests: Mutex<Vec<AskRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<HttpReply, AskError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: a single 200 reply of `{"answer": text}`.
    pub fn answering(text: &str) -> Self {
        let body = serde_json::json!({ "answer": text }).to_string();
        Self::new(vec![Ok(HttpReply::new(200, body))])
    }

    pub fn requests(&self) -> Vec<AskRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, request: &AskRequest) -> Result<HttpReply, AskError> {
        lock(&self.requests).push(request.clone());
        let mut replies = lock(&self.replies);
        if replies.is_empty() {
            return Err(AskError::Transport("no scripted reply left".to_string()));
        }
        replies.remove(0)
    }
}

/// A transport whose single reply is held back until the test releases it,
/// so a turn can be observed while it is in flight.
pub struct GatedTransport {
    gate: Mutex<Option<oneshot::Receiver<Result<HttpReply, AskError>>>>,
    calls: AtomicUsize,
}

impl GatedTransport {
    pub fn pair() -> (Self, oneshot::Sender<Result<HttpReply, AskError>>) {
        let (tx, rx) = oneshot::channel();
        let transport = Self {
            gate: Mutex::new(Some(rx)),
            calls: AtomicUsize::new(0),
        };
        (transport, tx)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn post(&self, _request: &AskRequest) -> Result<HttpReply, AskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.gate).take();
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(AskError::Transport("gate dropped".to_string()))),
            None => Err(AskError::Transport("gate already used".to_string())),
        }
    }
}

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Rendered(RenderedMessage),
    Loading(LoadingId),
    LoadingRemoved(LoadingId),
    InputSet(String),
    ControlsEnabled(bool),
    Focused,
    ActiveLayout,
}

/// A surface that records every call and keeps just enough state to answer
/// `input_value`.
pub struct RecordingSurface {
    events: Mutex<Vec<SurfaceEvent>>,
    input: Mutex<String>,
    enabled: Mutex<bool>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            input: Mutex::new(String::new()),
            enabled: Mutex::new(true),
        }
    }

    /// Put text in the input field the way a user would (not recorded).
    pub fn type_input(&self, text: &str) {
        *lock(&self.input) = text.to_string();
    }

    pub fn input(&self) -> String {
        lock(&self.input).clone()
    }

    pub fn controls_enabled(&self) -> bool {
        *lock(&self.enabled)
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        lock(&self.events).clone()
    }

    fn record(&self, event: SurfaceEvent) {
        lock(&self.events).push(event);
    }
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for RecordingSurface {
    fn render_message(&self, message: &RenderedMessage) {
        self.record(SurfaceEvent::Rendered(message.clone()));
    }

    fn render_loading(&self, id: LoadingId, _avatar: &Avatar) {
        self.record(SurfaceEvent::Loading(id));
    }

    fn remove_loading(&self, id: LoadingId) {
        self.record(SurfaceEvent::LoadingRemoved(id));
    }

    fn input_value(&self) -> String {
        self.input()
    }

    fn set_input_value(&self, value: &str) {
        *lock(&self.input) = value.to_string();
        self.record(SurfaceEvent::InputSet(value.to_string()));
    }

    fn set_controls_enabled(&self, enabled: bool) {
        *lock(&self.enabled) = enabled;
        self.record(SurfaceEvent::ControlsEnabled(enabled));
    }

    fn focus_input(&self) {
        self.record(SurfaceEvent::Focused);
    }

    fn enter_active_layout(&self) {
        self.record(SurfaceEvent::ActiveLayout);
    }
}
