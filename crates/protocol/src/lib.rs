//! Wire protocol for the Ventilator / Sink / Worker broker.
//!
//! This crate is the leaf dependency of the whole broker: client/request/job
//! identifiers and their `#` / `@` framing, the tensor wire format (JSON
//! header + raw buffer), the reserved control sentinels, and the
//! `SHOW_CONFIG` snapshot shape. It has no opinion on transport (ZeroMQ
//! socket types live in the component crates) and no opinion on what an
//! "item" is — items are opaque bytes to everything in this crate.

pub mod config;
pub mod defaults;
pub mod error;
pub mod types;

pub use config::{BrokerParams, ConfigSnapshot, SERVER_VERSION};
pub use error::{ProtocolError, Result};
pub use types::{
    sentinel, validate_ingress_bytes, ChunkId, ClientAddr, DType, JobId, PartialId,
    PoolingStrategy, ReqId, Tensor, TensorHeader,
};
