//! Tensor broker Ventilator
//!
//! Accepts client requests on `--port-in`, spawns the Sink and Worker pool,
//! and dispatches chunks to the pool for the lifetime of the process.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tensorbroker_logging::{init_logging, LogConfig};
use tensorbroker_protocol::{defaults, BrokerParams, PoolingStrategy};
use tensorbroker_ventilator::{Ventilator, VentilatorConfig};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PoolingArg {
    ReduceMean,
    ReduceMax,
    ReduceMeanMax,
    FirstToken,
    LastToken,
    None,
}

impl From<PoolingArg> for PoolingStrategy {
    fn from(arg: PoolingArg) -> Self {
        match arg {
            PoolingArg::ReduceMean => PoolingStrategy::ReduceMean,
            PoolingArg::ReduceMax => PoolingStrategy::ReduceMax,
            PoolingArg::ReduceMeanMax => PoolingStrategy::ReduceMeanMax,
            PoolingArg::FirstToken => PoolingStrategy::FirstToken,
            PoolingArg::LastToken => PoolingStrategy::LastToken,
            PoolingArg::None => PoolingStrategy::None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tensorbroker-ventilator", about = "Tensor broker ventilator process")]
struct Args {
    #[arg(long, default_value_t = defaults::DEFAULT_PORT_IN)]
    port_in: u16,

    #[arg(long, default_value_t = defaults::DEFAULT_PORT_OUT)]
    port_out: u16,

    #[arg(long, default_value_t = 1)]
    num_worker: usize,

    #[arg(long, default_value_t = 256)]
    max_batch_size: usize,

    #[arg(long, default_value_t = 25)]
    max_item_length: usize,

    #[arg(long, value_enum, default_value_t = PoolingArg::ReduceMean)]
    pooling_strategy: PoolingArg,

    #[arg(long, value_delimiter = ',', default_value = "-2")]
    pooling_layers: Vec<i32>,

    #[arg(long, default_value_t = false)]
    use_gpu: bool,

    #[arg(long, default_value_t = 0.5)]
    gpu_memory_fraction: f32,

    #[arg(long, default_value_t = false)]
    xla_enabled: bool,

    #[arg(long, default_value = "tensorbroker-sink")]
    sink_exe: String,

    #[arg(long, default_value = "tensorbroker-worker")]
    worker_exe: String,

    /// Shared read-only path to a model graph file, forwarded to every Worker.
    #[arg(long)]
    graph_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(LogConfig {
        app_name: "tensorbroker-ventilator",
        verbose: args.verbose,
        tui_mode: false,
    })?;

    let params = BrokerParams {
        port_in: args.port_in,
        port_out: args.port_out,
        num_worker: args.num_worker,
        max_batch_size: args.max_batch_size,
        max_item_length: args.max_item_length,
        pooling_strategy: args.pooling_strategy.into(),
        pooling_layers: args.pooling_layers,
        use_gpu: args.use_gpu,
        gpu_memory_fraction: args.gpu_memory_fraction,
        xla_enabled: args.xla_enabled,
    };

    tracing::info!(?params, "starting tensorbroker ventilator");

    let config = VentilatorConfig {
        params,
        sink_exe: args.sink_exe,
        worker_exe: args.worker_exe,
        graph_path: args.graph_path,
        verbose: args.verbose,
    };

    let mut ventilator = Ventilator::start(config)?;
    ventilator.run()?;

    Ok(())
}
