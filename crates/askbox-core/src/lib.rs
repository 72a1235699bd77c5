pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod mock;
pub mod state;

// Re-export main types for convenience
pub use client::{decode_answer, AnswerPayload, AskClient, AskRequest, HttpReply, Transport, NO_ANSWER};
pub use config::{Config, DEFAULT_ENDPOINT};
pub use controller::{
    Avatar, AvatarStyle, ChatTurnController, ControllerConfig, RenderSurface, RenderedMessage,
    Turn, TurnOutcome,
};
pub use error::AskError;
pub use format::{escape_html, format_message};
pub use state::{ChatMessage, ChatRole, LoadingId, LoadingToken, Transcript, TranscriptEntry};
