//! Ventilator-local error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VentilatorError>;

#[derive(Error, Debug)]
pub enum VentilatorError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to spawn {0}: {1}")]
    Spawn(&'static str, std::io::Error),
}
