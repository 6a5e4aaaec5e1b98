//! Worker event loop: receive a chunk, invoke the encoder, emit a tensor.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tensorbroker_encoder::Encoder;
use tensorbroker_protocol::{defaults, ChunkId, Tensor};
use tracing::{debug, info, warn};

use crate::error::{Result, WorkerError};

/// Spawn-time configuration for a single Worker process.
pub struct WorkerConfig {
    /// PUSH->PULL backend endpoint the Ventilator dispatches chunks on.
    pub backend_addr: String,
    /// PUSH endpoint the Sink listens for worker output on.
    pub sink_addr: String,
    /// Device the encoder should bind to; -1 means CPU.
    pub device_id: i32,
    pub worker_index: usize,
    pub max_batch_size: usize,
    pub max_item_length: usize,
    /// Shared read-only path handed to every Worker at spawn (e.g. a model
    /// graph file); the core never interprets its contents.
    pub graph_path: Option<PathBuf>,
}

pub struct Worker {
    config: WorkerConfig,
    context: zmq::Context,
    receiver: zmq::Socket,
    sink: zmq::Socket,
    encoder: Arc<dyn Encoder>,
    running: bool,
}

impl Worker {
    pub fn connect(config: WorkerConfig, encoder: Arc<dyn Encoder>) -> Result<Self> {
        let context = zmq::Context::new();

        let receiver = context.socket(zmq::PULL)?;
        receiver.connect(&config.backend_addr)?;
        receiver.set_rcvtimeo(defaults::RECV_POLL_TIMEOUT_MS as i32)?;

        let sink = context.socket(zmq::PUSH)?;
        sink.connect(&config.sink_addr)?;

        info!(
            worker_index = config.worker_index,
            device_id = config.device_id,
            backend = %config.backend_addr,
            sink = %config.sink_addr,
            "worker connected"
        );

        Ok(Self {
            config,
            context,
            receiver,
            sink,
            encoder,
            running: true,
        })
    }

    pub fn context(&self) -> &zmq::Context {
        &self.context
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Drains the receive socket until shutdown, encoding every chunk that
    /// arrives. This always reads from `receiver` — it never manufactures
    /// synthetic input of its own.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            match self.recv_chunk()? {
                Some((chunk_id, items, is_tokenized)) => {
                    self.handle_chunk(chunk_id, items, is_tokenized);
                }
                None => continue,
            }
        }
        Ok(())
    }

    fn recv_chunk(&self) -> Result<Option<(Vec<u8>, Vec<Value>, bool)>> {
        let frames = match self.receiver.recv_multipart(0) {
            Ok(frames) => frames,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(zmq::Error::ETERM) => {
                info!("worker transport terminated");
                return Ok(None);
            }
            Err(e) => return Err(WorkerError::Zmq(e)),
        };

        if frames.len() != 2 {
            warn!(frame_count = frames.len(), "dropping malformed chunk envelope");
            return Ok(None);
        }

        let chunk_id = frames[0].clone();
        let payload: Value = match serde_json::from_slice(&frames[1]) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping chunk with unparseable payload");
                return Ok(None);
            }
        };

        let items = match payload {
            Value::Array(items) => items,
            other => {
                warn!(?other, "chunk payload is not a JSON array, dropping");
                return Ok(None);
            }
        };

        let is_tokenized = items.iter().all(|item| item.is_array());

        Ok(Some((chunk_id, items, is_tokenized)))
    }

    fn handle_chunk(&mut self, chunk_id: Vec<u8>, items: Vec<Value>, is_tokenized: bool) {
        let chunk_label = ChunkId::parse(&chunk_id).ok();
        let item_count = items.len();

        let tensor = match self.encoder.encode(&items, is_tokenized) {
            Ok(tensor) => tensor,
            Err(e) => {
                warn!(
                    chunk = ?chunk_label,
                    error = %e,
                    "encoder failed on chunk, dropping"
                );
                return;
            }
        };

        debug!(
            chunk = ?chunk_label,
            items = item_count,
            rows = tensor.rows(),
            "chunk encoded"
        );

        if let Err(e) = self.send_result(&chunk_id, &tensor) {
            warn!(chunk = ?chunk_label, error = %e, "failed to forward result to sink");
        }
    }

    fn send_result(&self, chunk_id: &[u8], tensor: &Tensor) -> Result<()> {
        let (header_json, raw_bytes) = tensor.pack()?;
        self.sink
            .send_multipart([chunk_id, header_json.as_slice(), raw_bytes.as_slice()], 0)?;
        Ok(())
    }
}
