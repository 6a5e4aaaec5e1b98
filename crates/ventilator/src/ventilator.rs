//! Ventilator event loop: accepts client requests, registers and dispatches
//! Jobs, and passes `SHOW_CONFIG` queries through to the Sink.

use std::path::PathBuf;
use std::process::Child;

use chrono::Utc;
use serde_json::Value;
use tensorbroker_protocol::{
    defaults, sentinel, validate_ingress_bytes, BrokerParams, ChunkId, ClientAddr, ConfigSnapshot,
    JobId, ReqId, SERVER_VERSION,
};
use tracing::{debug, info, warn};

use crate::devices::discover_devices;
use crate::error::{Result, VentilatorError};
use crate::partition::{plan_batch, BatchPlan};
use crate::spawn::{spawn_sink, spawn_worker, SinkSpawnArgs, WorkerSpawnArgs};

pub struct VentilatorConfig {
    pub params: BrokerParams,
    pub sink_exe: String,
    pub worker_exe: String,
    pub graph_path: Option<PathBuf>,
    pub verbose: bool,
}

pub struct Ventilator {
    config: VentilatorConfig,
    context: zmq::Context,
    frontend: zmq::Socket,
    backend: zmq::Socket,
    backend_addr: String,
    sink_pair: zmq::Socket,
    sink_pair_addr: String,
    worker_to_sink_addr: String,
    _sink_child: Child,
    _worker_children: Vec<Child>,
    num_request: u64,
    running: bool,
}

impl Ventilator {
    /// Binds all three Ventilator-owned sockets, spawns the Sink, waits for
    /// its worker-facing endpoint, then spawns N Workers.
    pub fn start(config: VentilatorConfig) -> Result<Self> {
        let context = zmq::Context::new();

        let frontend = context.socket(zmq::PULL)?;
        frontend.bind(&format!("tcp://*:{}", config.params.port_in))?;
        frontend.set_rcvtimeo(defaults::RECV_POLL_TIMEOUT_MS as i32)?;

        let backend = context.socket(zmq::PUSH)?;
        backend.bind("tcp://127.0.0.1:*")?;
        let backend_addr = bind_endpoint(&backend)?;

        let sink_pair = context.socket(zmq::PAIR)?;
        sink_pair.bind("tcp://127.0.0.1:*")?;
        let sink_pair_addr = bind_endpoint(&sink_pair)?;

        info!(
            port_in = config.params.port_in,
            backend = %backend_addr,
            sink_pair = %sink_pair_addr,
            "ventilator bound, spawning sink"
        );

        let sink_child = spawn_sink(SinkSpawnArgs {
            sink_exe: &config.sink_exe,
            ventilator_addr: &sink_pair_addr,
            port_out: config.params.port_out,
            verbose: config.verbose,
        })?;

        let worker_to_sink_addr = wait_for_sink_endpoint(&sink_pair)?;
        info!(worker_to_sink = %worker_to_sink_addr, "sink reported worker-facing endpoint");

        let devices = discover_devices(config.params.num_worker, config.params.use_gpu);
        let mut worker_children = Vec::with_capacity(config.params.num_worker);
        for (idx, device_id) in devices.into_iter().enumerate() {
            let child = spawn_worker(WorkerSpawnArgs {
                worker_exe: &config.worker_exe,
                backend_addr: &backend_addr,
                sink_addr: &worker_to_sink_addr,
                device_id,
                worker_index: idx,
                max_batch_size: config.params.max_batch_size,
                max_item_length: config.params.max_item_length,
                graph_path: config.graph_path.as_ref(),
                verbose: config.verbose,
            })?;
            worker_children.push(child);
        }

        Ok(Self {
            config,
            context,
            frontend,
            backend,
            backend_addr,
            sink_pair,
            sink_pair_addr,
            worker_to_sink_addr,
            _sink_child: sink_child,
            _worker_children: worker_children,
            num_request: 0,
            running: true,
        })
    }

    pub fn context(&self) -> &zmq::Context {
        &self.context
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn run(&mut self) -> Result<()> {
        while self.running {
            match self.recv_envelope()? {
                Some((client_addr, payload, req_id)) => {
                    self.dispatch(client_addr, payload, req_id)?;
                }
                None => continue,
            }
        }
        Ok(())
    }

    fn recv_envelope(&self) -> Result<Option<(Vec<u8>, Vec<u8>, Vec<u8>)>> {
        let frames = match self.frontend.recv_multipart(0) {
            Ok(f) => f,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(zmq::Error::ETERM) => {
                info!("ventilator transport terminated");
                return Ok(None);
            }
            Err(e) => return Err(VentilatorError::Zmq(e)),
        };

        if frames.len() != 3 {
            warn!(frame_count = frames.len(), "dropping malformed client envelope");
            return Ok(None);
        }

        Ok(Some((frames[0].clone(), frames[1].clone(), frames[2].clone())))
    }

    fn dispatch(&mut self, client_addr: Vec<u8>, payload: Vec<u8>, req_id: Vec<u8>) -> Result<()> {
        if payload == sentinel::SHOW_CONFIG {
            return self.handle_show_config(client_addr, req_id);
        }
        if payload == sentinel::TERMINATION {
            info!("termination requested, shutting down dispatch loop");
            self.running = false;
            return Ok(());
        }

        let (client, req) = match self.validate_addresses(&client_addr, &req_id) {
            Some(pair) => pair,
            None => return Ok(()),
        };

        let items: Vec<Value> = match serde_json::from_slice(&payload) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!("dropping request whose payload is not a JSON array");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "dropping request with unparseable payload");
                return Ok(());
            }
        };

        self.num_request += 1;
        let expected_count = items.len() as u64;
        let job = JobId::new(client, req);

        self.announce_job(&job, expected_count)?;

        match plan_batch(items, self.config.params.max_batch_size) {
            BatchPlan::Whole(batch) => {
                let chunk_id = ChunkId::whole(job.clone()).encode();
                let encoded = serde_json::to_vec(&batch)?;
                self.push_chunk(&chunk_id, &encoded)?;
            }
            BatchPlan::Partitioned(chunks) => {
                let chunk_count = chunks.len();
                for (offset, chunk) in chunks {
                    let chunk_id = ChunkId::part(job.clone(), offset).encode();
                    let encoded = serde_json::to_vec(&chunk)?;
                    self.push_chunk(&chunk_id, &encoded)?;
                }
                debug!(job = %job, chunk_count, "batch partitioned across chunks");
            }
        }

        Ok(())
    }

    fn validate_addresses(&self, client_addr: &[u8], req_id: &[u8]) -> Option<(ClientAddr, ReqId)> {
        let client = match ClientAddr::new(client_addr.to_vec()) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "rejecting request with reserved byte in client address");
                return None;
            }
        };
        let req = match ReqId::new(req_id.to_vec()) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "rejecting request with reserved byte in request id");
                return None;
            }
        };
        Some((client, req))
    }

    fn announce_job(&mut self, job: &JobId, expected_count: u64) -> Result<()> {
        self.sink_pair.send_multipart(
            [
                job.client.as_bytes(),
                sentinel::REGISTER,
                expected_count.to_string().as_bytes(),
                job.req.as_bytes(),
            ],
            0,
        )?;
        Ok(())
    }

    fn push_chunk(&mut self, chunk_id: &[u8], payload: &[u8]) -> Result<()> {
        self.backend.send_multipart([chunk_id, payload], 0)?;
        Ok(())
    }

    fn handle_show_config(&mut self, client_addr: Vec<u8>, req_id: Vec<u8>) -> Result<()> {
        let snapshot = self.build_config_snapshot(&client_addr);
        let config_json = serde_json::to_vec(&snapshot)?;
        self.sink_pair.send_multipart(
            [
                client_addr.as_slice(),
                sentinel::SHOW_CONFIG,
                config_json.as_slice(),
                req_id.as_slice(),
            ],
            0,
        )?;
        Ok(())
    }

    fn build_config_snapshot(&self, client_addr: &[u8]) -> ConfigSnapshot {
        ConfigSnapshot {
            params: self.config.params.clone(),
            client: String::from_utf8_lossy(client_addr).into_owned(),
            num_subprocess: self.config.params.num_worker,
            ventilator_to_worker: self.backend_addr.clone(),
            worker_to_sink: self.worker_to_sink_addr.clone(),
            ventilator_sink: self.sink_pair_addr.clone(),
            server_current_time: Utc::now(),
            num_request: self.num_request,
            server_version: SERVER_VERSION.to_string(),
        }
    }
}

fn bind_endpoint(socket: &zmq::Socket) -> Result<String> {
    socket
        .get_last_endpoint()?
        .map_err(|_| VentilatorError::Zmq(zmq::Error::EINVAL))
}

fn wait_for_sink_endpoint(sink_pair: &zmq::Socket) -> Result<String> {
    let frames = sink_pair.recv_multipart(0)?;
    let addr = frames
        .first()
        .map(|f| String::from_utf8_lossy(f).into_owned())
        .ok_or(VentilatorError::Zmq(zmq::Error::EINVAL))?;
    Ok(addr)
}
