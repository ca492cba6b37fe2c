//! Error types for relayq.

use thiserror::Error;

/// Failures surfaced by queue drivers and the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    /// Transient backend read failure. Drivers never retry these
    /// themselves; callers wrap the operation in bounded retry.
    #[error("read error: {0}")]
    Read(String),

    /// Transient backend write failure, same retry discipline as reads.
    #[error("write error: {0}")]
    Write(String),

    /// Fatal setup problem: duplicate channel registration, bad weight,
    /// unusable settings. Surfaced immediately, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Payload could not cross the codec boundary.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    /// Transient I/O errors are the only kind worth retrying.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Read(_) | Error::Write(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure raised by a payload handler during execution.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The input itself can never succeed. Not retried; the raw payload
    /// is parked in the failed channel for operator inspection.
    #[error("invalid payload: {0}")]
    Invalid(String),

    /// Recoverable execution failure. The payload is requeued with a
    /// bumped retry counter until the ceiling is crossed.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}
