use thiserror::Error;

/// Failures of the live connection. All of them end the current attempt; a
/// retry is a fresh call to [`crate::Negotiator::establish`].
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("could not obtain a session credential: {0}")]
    Credential(String),
    #[error("failed to access microphone: {0}")]
    MediaAccess(String),
    #[error("session negotiation failed: {0}")]
    Negotiation(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("message could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::Transport(e.to_string())
    }
}

pub type Result<T, E = RealtimeError> = std::result::Result<T, E>;
