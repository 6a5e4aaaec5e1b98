//! Sink process: reassembles worker partials into completed Jobs and
//! publishes results to clients.

pub mod error;
pub mod jobs;
pub mod sink;

pub use error::{Result, SinkError};
pub use jobs::JobTable;
pub use sink::{Sink, SinkConfig};
