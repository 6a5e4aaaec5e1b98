//! Ventilator process: accepts client requests, assigns Job identifiers,
//! partitions batches, dispatches chunks to workers, and spawns the Sink
//! and Worker pool at startup.

pub mod devices;
pub mod error;
pub mod partition;
pub mod spawn;
pub mod ventilator;

pub use error::{Result, VentilatorError};
pub use ventilator::{Ventilator, VentilatorConfig};
