//! UI-agnostic chat state types
//!
//! These are shared by every host (the terminal app, tests, anything else that
//! implements [`RenderSurface`](crate::RenderSurface)) and don't depend on any
//! UI framework.

use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A message in the transcript. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    text: String,
    role: ChatRole,
    is_error: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: ChatRole::User,
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: ChatRole::Assistant,
            is_error: false,
        }
    }

    /// An assistant message flagged as an error.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: ChatRole::Assistant,
            is_error: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }
}

/// Identity of a loading placeholder in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadingId(u64);

/// Proof that a loading placeholder is still in the transcript.
///
/// Not `Clone`: [`Transcript::remove_loading`] consumes it, so a placeholder
/// can only be taken out once.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadingToken(LoadingId);

impl LoadingToken {
    pub fn id(&self) -> LoadingId {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    Message(ChatMessage),
    Loading(LoadingId),
}

impl TranscriptEntry {
    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            TranscriptEntry::Message(msg) => Some(msg),
            TranscriptEntry::Loading(_) => None,
        }
    }
}

/// Ordered log of everything shown in the chat.
///
/// Messages are only ever appended. Loading placeholders are the one kind of
/// entry that leaves again.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    next_loading: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.entries.push(TranscriptEntry::Message(message));
    }

    pub fn push_loading(&mut self) -> LoadingToken {
        let id = LoadingId(self.next_loading);
        self.next_loading += 1;
        self.entries.push(TranscriptEntry::Loading(id));
        LoadingToken(id)
    }

    /// Remove the placeholder identified by `token`. Returns false if it was
    /// already gone.
    pub fn remove_loading(&mut self, token: LoadingToken) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !matches!(entry, TranscriptEntry::Loading(id) if *id == token.0));
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(TranscriptEntry::as_message)
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages().last()
    }

    pub fn has_loading(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, TranscriptEntry::Loading(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push_message(ChatMessage::user("one"));
        transcript.push_message(ChatMessage::assistant("two"));
        transcript.push_message(ChatMessage::error("three"));

        let texts: Vec<&str> = transcript.messages().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(transcript.last_message().unwrap().is_error());
    }

    #[test]
    fn test_loading_removed_by_identity() {
        let mut transcript = Transcript::new();
        transcript.push_message(ChatMessage::user("q1"));
        let first = transcript.push_loading();
        let second = transcript.push_loading();
        assert_ne!(first.id(), second.id());

        assert!(transcript.remove_loading(first));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[1], TranscriptEntry::Loading(second.id()));

        assert!(transcript.remove_loading(second));
        assert!(!transcript.has_loading());
    }

    #[test]
    fn test_remove_missing_loading_is_noop() {
        let mut a = Transcript::new();
        let mut b = Transcript::new();
        let token = a.push_loading();
        b.push_message(ChatMessage::user("hi"));

        // b never saw this placeholder
        assert!(!b.remove_loading(token));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
    }
}
