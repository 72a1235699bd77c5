use thiserror::Error;

/// Why a chat turn failed.
///
/// The `Display` text is what the user sees inside the
/// "Sorry, I encountered an error: ..." message, so keep it short.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AskError {
    /// The request never produced an HTTP response (DNS, connect, reset, ...).
    #[error("{0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// A 2xx response whose body was not valid JSON.
    #[error("{0}")]
    Decode(String),
}

impl From<reqwest::Error> for AskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AskError::Decode(err.to_string())
        } else {
            AskError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AskError {
    fn from(err: serde_json::Error) -> Self {
        AskError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_embeds_code() {
        assert_eq!(AskError::Status(503).to_string(), "HTTP error! status: 503");
    }

    #[test]
    fn test_transport_message_is_passed_through() {
        let err = AskError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "connection refused");
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err: AskError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AskError::Decode(_)));
    }
}
