use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to a data provider.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, timeout, 429 or 5xx. Worth retrying.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// The provider answered but refused the request (non-retryable 4xx).
    #[error("fetch rejected: {0}")]
    Rejected(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 429 || status.is_server_error() => {
                FetchError::Transient(err.to_string())
            }
            Some(_) => FetchError::Rejected(err.to_string()),
            None if err.is_decode() => FetchError::Rejected(err.to_string()),
            None => FetchError::Transient(err.to_string()),
        }
    }
}

/// A provider payload that does not satisfy the snapshot schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed payload for game {game_id}: {reason}")]
pub struct MalformedPayload {
    pub game_id: String,
    pub reason: String,
}

impl MalformedPayload {
    pub fn new(game_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            reason: reason.into(),
        }
    }
}

/// The dedup store could not be written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode dedup state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The notification channel did not accept a message.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("webhook transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("preview output failed: {0}")]
    Preview(#[from] std::io::Error),
}
