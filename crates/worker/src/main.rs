//! Tensor broker Worker
//!
//! Usage:
//!     tensorbroker-worker --backend tcp://127.0.0.1:61000 --sink tcp://127.0.0.1:61001

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tensorbroker_encoder::IdentityEncoder;
use tensorbroker_logging::{init_logging, LogConfig};
use tensorbroker_worker::{Worker, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "tensorbroker-worker", about = "Tensor broker worker process")]
struct Args {
    /// Backend endpoint to pull chunks from (set by the Ventilator at spawn).
    #[arg(long)]
    backend: String,

    /// Sink endpoint to push results to (set by the Ventilator at spawn).
    #[arg(long)]
    sink: String,

    /// Device id bound for this worker; -1 means CPU.
    #[arg(long, default_value_t = -1)]
    device_id: i32,

    /// Index of this worker within the pool.
    #[arg(long, default_value_t = 0)]
    worker_index: usize,

    #[arg(long, default_value_t = 256)]
    max_batch_size: usize,

    #[arg(long, default_value_t = 25)]
    max_item_length: usize,

    /// Shared read-only path to a model graph file, if any.
    #[arg(long)]
    graph_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(LogConfig {
        app_name: "tensorbroker-worker",
        verbose: args.verbose,
        tui_mode: false,
    })?;

    tracing::info!(
        worker_index = args.worker_index,
        device_id = args.device_id,
        backend = %args.backend,
        sink = %args.sink,
        "starting tensorbroker worker"
    );

    let config = WorkerConfig {
        backend_addr: args.backend,
        sink_addr: args.sink,
        device_id: args.device_id,
        worker_index: args.worker_index,
        max_batch_size: args.max_batch_size,
        max_item_length: args.max_item_length,
        graph_path: args.graph_path,
    };

    // The core treats the encoder as an external collaborator; the
    // identity encoder is the dependency-free stand-in wired in here.
    let encoder = Arc::new(IdentityEncoder::default());

    let mut worker = Worker::connect(config, encoder)?;
    worker.run()?;

    Ok(())
}
