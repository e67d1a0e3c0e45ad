//! Error types for sitelens-core

use thiserror::Error;

use crate::types::{StageId, StageStatus};

/// Main error type for the sitelens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Candidate media rejected before any state change
    #[error("{0}")]
    Validation(String),

    /// Endpoint returned non-2xx or the network failed
    #[error("transport error: {message}")]
    Transport {
        /// HTTP status, `None` for network faults
        status: Option<u16>,
        message: String,
    },

    /// Media ingestion failed or returned no session id
    #[error("upload failed: {0}")]
    Upload(String),

    /// Missing or invalid session id
    #[error("session error: {0}")]
    Session(String),

    /// A single Q&A turn failed; recovered with a placeholder answer
    #[error("question {index} failed: {message}")]
    PartialAnswer { index: usize, message: String },

    /// Fatal stage-level failure that halted the run
    #[error("{stage} stage failed: {source}")]
    Pipeline {
        stage: StageId,
        #[source]
        source: Box<Error>,
    },

    /// Document rendering failed
    #[error("export failed: {0}")]
    Export(String),

    /// A run (or an upload/clear) is already in flight
    #[error("an analysis run is already in progress")]
    RunInProgress,

    /// A chat turn is still outstanding
    #[error("a chat turn is already in progress")]
    TurnInProgress,

    /// Stage status change not permitted by the stage state machine
    #[error("invalid transition for {stage} stage: {from} -> {to}")]
    InvalidTransition {
        stage: StageId,
        from: StageStatus,
        to: StageStatus,
    },

    /// Run aborted through its cancellation token
    #[error("analysis cancelled")]
    Cancelled,
}

impl Error {
    /// Build a transport error from an HTTP status and response body
    pub fn http(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Error::Transport {
            status: Some(status.as_u16()),
            message: format!("API error ({}): {}", status, body.into()),
        }
    }

    /// Check if the error is transient (network fault, 429, 5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { status: None, .. } => true,
            Error::Transport {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: format!("HTTP request failed: {}", e),
        }
    }
}

/// Result type alias for sitelens-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let network = Error::Transport {
            status: None,
            message: "connection reset".to_string(),
        };
        assert!(network.is_retryable());
        assert!(Error::http(reqwest::StatusCode::BAD_GATEWAY, "down").is_retryable());
        assert!(Error::http(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down").is_retryable());
        assert!(!Error::http(reqwest::StatusCode::BAD_REQUEST, "bad").is_retryable());
        assert!(!Error::Session("missing".to_string()).is_retryable());
    }

    #[test]
    fn test_pipeline_error_message() {
        let err = Error::Pipeline {
            stage: StageId::Questions,
            source: Box::new(Error::http(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom")),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("questions stage failed"));
        assert!(msg.contains("500"));
    }
}
