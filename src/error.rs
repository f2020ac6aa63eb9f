//! Domain error types for the prompt store.
//!
//! Every store operation returns a [`StoreResult`]. The FFI layer converts
//! these into [`crate::app_response::AppResponse`] values before they cross
//! the C boundary.

use thiserror::Error;

/// Errors raised by the storage engine, the remote store adapter and the
/// client state container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No identity session exists; call `sign_in` first.
    #[error("not authenticated: no identity session")]
    NotAuthenticated,

    /// The backing store was never configured or could not be opened.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The record violates a model invariant (e.g. no variants).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// LMDB reported an error while reading or writing.
    #[error("database error: {0}")]
    Database(String),

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        StoreError::StoreUnavailable(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidRecord(msg.into())
    }
}

impl From<lmdb::Error> for StoreError {
    fn from(err: lmdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Database(format!("IO error: {err}"))
    }
}
