//! Worker process: connects to the Ventilator's backend and the Sink,
//! encodes chunks, and forwards results.

pub mod error;
pub mod worker;

pub use error::{Result, WorkerError};
pub use worker::{Worker, WorkerConfig};
