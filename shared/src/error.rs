use std::num::ParseIntError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A caller-supplied value is unusable, e.g. a malformed URL or an
    /// unsupported scheme.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not permitted in the current lifecycle state,
    /// e.g. `open` on a socket that is not closed.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An outgoing payload exceeds the negotiated or local maximum.
    #[error("message size {size} exceeds limit {limit}")]
    Oversize { size: usize, limit: usize },

    /// A transport layer failed to construct or start.
    #[error("{0} transport initialization failed")]
    TransportInit(&'static str),

    /// A failure observed asynchronously on an established transport.
    /// Delivered through the error callback, never returned from a call.
    #[error("{0}")]
    RemoteFailure(String),

    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("mutex poison: {0}")]
    PoisonError(String),

    #[error("{0}")]
    Other(String),
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}
