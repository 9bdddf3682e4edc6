//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronizing topics.
#[derive(Debug, Error)]
pub enum Error {
    /// Fetch or channel failure. Transient cases are retried with bounded
    /// backoff before this surfaces.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server sent something that would corrupt belief if applied:
    /// mismatched vector length, a topic violating its own invariants, or a
    /// response for the wrong topic. The offending payload is rejected and
    /// the prior belief kept.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Ledger storage error
    #[error("ledger error: {0}")]
    Storage(#[from] ballot_ledger::Error),

    /// Vote for a choice the topic does not have
    #[error("invalid choice index {index} for {count} choices")]
    InvalidChoice { index: usize, count: usize },

    /// The topic does not exist on the server
    #[error("topic {0} not found")]
    TopicNotFound(u64),

    /// Operation requires a live session
    #[error("session for topic {0} is not live")]
    NotLive(u64),

    /// The session has been closed
    #[error("session closed")]
    SessionClosed,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<ballot_tally::MergeError> for Error {
    fn from(e: ballot_tally::MergeError) -> Self {
        Error::Protocol(e.to_string())
    }
}
