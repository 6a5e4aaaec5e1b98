//! Declared broker parameters, and the `SHOW_CONFIG` snapshot built from
//! them plus runtime-discovered endpoints.

use crate::types::PoolingStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The broker's declared, user-facing parameters (CLI / environment in a
/// real deployment; here just a plain record the Ventilator is built
/// with).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerParams {
    pub port_in: u16,
    pub port_out: u16,
    pub num_worker: usize,
    pub max_batch_size: usize,
    pub max_item_length: usize,
    pub pooling_strategy: PoolingStrategy,
    pub pooling_layers: Vec<i32>,
    pub use_gpu: bool,
    pub gpu_memory_fraction: f32,
    pub xla_enabled: bool,
}

impl Default for BrokerParams {
    fn default() -> Self {
        Self {
            port_in: crate::defaults::DEFAULT_PORT_IN,
            port_out: crate::defaults::DEFAULT_PORT_OUT,
            num_worker: 1,
            max_batch_size: 256,
            max_item_length: 25,
            pooling_strategy: PoolingStrategy::ReduceMean,
            pooling_layers: vec![-2],
            use_gpu: false,
            gpu_memory_fraction: 0.5,
            xla_enabled: false,
        }
    }
}

/// Server version reported in the `SHOW_CONFIG` reply.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The snapshot returned for a `SHOW_CONFIG` request: the broker's
/// declared parameters plus everything only known after startup
/// (endpoints, request counters).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(flatten)]
    pub params: BrokerParams,
    pub client: String,
    pub num_subprocess: usize,
    #[serde(rename = "ventilator -> worker")]
    pub ventilator_to_worker: String,
    #[serde(rename = "worker -> sink")]
    pub worker_to_sink: String,
    #[serde(rename = "ventilator <-> sink")]
    pub ventilator_sink: String,
    pub server_current_time: DateTime<Utc>,
    pub num_request: u64,
    pub server_version: String,
}
