//! Protocol error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("reserved sentinel '{sentinel}' is not allowed in {field}")]
    ReservedByte { field: &'static str, sentinel: char },

    #[error("unknown dtype: {0}")]
    UnknownDType(String),

    #[error("tensor byte length mismatch: shape implies {expected} bytes, got {got}")]
    TensorLengthMismatch { expected: usize, got: usize },

    #[error("malformed chunk id: {0:?}")]
    MalformedChunkId(Vec<u8>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
