//! Tensor broker Sink
//!
//! Spawned by the Ventilator; reports its worker-facing endpoint back over
//! the pair socket immediately after binding.

use clap::Parser;
use tensorbroker_logging::{init_logging, LogConfig};
use tensorbroker_sink::{Sink, SinkConfig};

#[derive(Parser, Debug)]
#[command(name = "tensorbroker-sink", about = "Tensor broker sink process")]
struct Args {
    /// Pair endpoint to connect back to the Ventilator's control socket.
    #[arg(long)]
    ventilator_addr: String,

    /// Client-facing publish port.
    #[arg(long)]
    port_out: u16,

    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(LogConfig {
        app_name: "tensorbroker-sink",
        verbose: args.verbose,
        tui_mode: false,
    })?;

    let config = SinkConfig {
        ventilator_addr: args.ventilator_addr,
        port_out: args.port_out,
    };

    let mut sink = Sink::bind(config)?;
    sink.run()?;

    Ok(())
}
