//! Worker-local error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error(transparent)]
    Protocol(#[from] tensorbroker_protocol::ProtocolError),
}
