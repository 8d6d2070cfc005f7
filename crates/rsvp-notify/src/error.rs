//! Error types for outbound notifications.

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("tls error: {0}")]
    Tls(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The remote answered with a non-2xx status.
    #[error("api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("encode error: {0}")]
    Encode(String),
}
