use std::time::Duration;
use thiserror::Error;

/// Crate-wide error type.
///
/// `Display` strings double as wire failure messages, so the fixed
/// diagnostics the protocol promises live here.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A connection (backend or client proxy) could not be constructed.
    #[error("{0}")]
    Construction(String),

    /// The wire request could not be parsed at all.
    #[error("malformed request")]
    MalformedRequest,

    /// A parseable message violated the protocol: bad argument shapes,
    /// framing problems, unexpected response forms.
    #[error("{0}")]
    Protocol(String),

    /// An operation arrived on a connection that holds no pool slot.
    #[error("no driver bound to this connection")]
    NoDriverBound,

    /// The request named an operation outside the driver contract.
    #[error("unsupported operation {0}")]
    UnsupportedOperation(String),

    /// The backend rejected or failed the operation; the message is the
    /// backend's own, passed through verbatim.
    #[error("{0}")]
    Backend(String),

    /// A frame exceeded the protocol's size cap.
    #[error("message too large")]
    MessageTooLarge,

    /// A backend call outran its configured deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PoolResult<T> = Result<T, PoolError>;
