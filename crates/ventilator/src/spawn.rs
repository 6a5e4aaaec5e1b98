//! Spawns the Sink and Worker processes at startup.

use std::path::PathBuf;
use std::process::{Child, Command};

use crate::error::{Result, VentilatorError};

pub struct SinkSpawnArgs<'a> {
    pub sink_exe: &'a str,
    pub ventilator_addr: &'a str,
    pub port_out: u16,
    pub verbose: bool,
}

pub fn spawn_sink(args: SinkSpawnArgs<'_>) -> Result<Child> {
    Command::new(args.sink_exe)
        .arg("--ventilator-addr")
        .arg(args.ventilator_addr)
        .arg("--port-out")
        .arg(args.port_out.to_string())
        .args(if args.verbose { vec!["--verbose"] } else { vec![] })
        .spawn()
        .map_err(|e| VentilatorError::Spawn("sink", e))
}

pub struct WorkerSpawnArgs<'a> {
    pub worker_exe: &'a str,
    pub backend_addr: &'a str,
    pub sink_addr: &'a str,
    pub device_id: i32,
    pub worker_index: usize,
    pub max_batch_size: usize,
    pub max_item_length: usize,
    pub graph_path: Option<&'a PathBuf>,
    pub verbose: bool,
}

pub fn spawn_worker(args: WorkerSpawnArgs<'_>) -> Result<Child> {
    let mut cmd = Command::new(args.worker_exe);
    cmd.arg("--backend")
        .arg(args.backend_addr)
        .arg("--sink")
        .arg(args.sink_addr)
        .arg("--device-id")
        .arg(args.device_id.to_string())
        .arg("--worker-index")
        .arg(args.worker_index.to_string())
        .arg("--max-batch-size")
        .arg(args.max_batch_size.to_string())
        .arg("--max-item-length")
        .arg(args.max_item_length.to_string());

    if let Some(path) = args.graph_path {
        cmd.arg("--graph-path").arg(path);
    }
    if args.verbose {
        cmd.arg("--verbose");
    }

    cmd.spawn().map_err(|e| VentilatorError::Spawn("worker", e))
}
