//! Sink event loop: collects worker output, reassembles completed Jobs in
//! order, and publishes results to clients.

use tensorbroker_protocol::{defaults, sentinel, ChunkId, JobId, Tensor};
use tracing::{debug, info, warn};

use crate::error::{Result, SinkError};
use crate::jobs::JobTable;

pub struct SinkConfig {
    /// PAIR endpoint to connect back to the Ventilator's control socket.
    pub ventilator_addr: String,
    /// Client-facing publish port.
    pub port_out: u16,
}

pub struct Sink {
    context: zmq::Context,
    frontend: zmq::Socket,
    receiver: zmq::Socket,
    sender: zmq::Socket,
    jobs: JobTable,
    running: bool,
}

impl Sink {
    /// Binds the worker-facing pull socket and the client-facing publisher,
    /// connects the control pair socket to the Ventilator, and immediately
    /// reports the worker-facing endpoint back over the pair socket.
    pub fn bind(config: SinkConfig) -> Result<Self> {
        let context = zmq::Context::new();

        let frontend = context.socket(zmq::PAIR)?;
        frontend.connect(&config.ventilator_addr)?;

        let receiver = context.socket(zmq::PULL)?;
        let receiver_addr = bind_ephemeral(&receiver)?;
        receiver.set_rcvtimeo(defaults::RECV_POLL_TIMEOUT_MS as i32)?;

        let sender = context.socket(zmq::PUB)?;
        sender.bind(&format!("tcp://*:{}", config.port_out))?;

        frontend.send(receiver_addr.as_bytes(), 0)?;

        info!(
            receiver = %receiver_addr,
            port_out = config.port_out,
            "sink bound"
        );

        Ok(Self {
            context,
            frontend,
            receiver,
            sender,
            jobs: JobTable::new(),
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
            let (frontend_ready, receiver_ready) = {
                let mut items = [
                    self.frontend.as_poll_item(zmq::POLLIN),
                    self.receiver.as_poll_item(zmq::POLLIN),
                ];
                let rc = zmq::poll(&mut items, defaults::RECV_POLL_TIMEOUT_MS)?;
                if rc == 0 {
                    (false, false)
                } else {
                    (items[0].is_readable(), items[1].is_readable())
                }
            };

            if frontend_ready {
                self.handle_control()?;
            }
            if receiver_ready {
                self.handle_worker_output()?;
            }
        }
        Ok(())
    }

    fn handle_control(&mut self) -> Result<()> {
        let frames = match self.frontend.recv_multipart(0) {
            Ok(f) => f,
            Err(zmq::Error::ETERM) => {
                info!("sink control transport terminated");
                self.running = false;
                return Ok(());
            }
            Err(e) => return Err(SinkError::Zmq(e)),
        };

        if frames.len() != 4 {
            warn!(frame_count = frames.len(), "dropping malformed control message");
            return Ok(());
        }

        let client_addr = &frames[0];
        let msg_type = &frames[1];
        let info = &frames[2];
        let req_id = &frames[3];

        if msg_type.as_slice() == sentinel::REGISTER {
            let expected: u64 = match std::str::from_utf8(info).ok().and_then(|s| s.parse().ok()) {
                Some(n) => n,
                None => {
                    warn!("dropping REGISTER with unparseable expected count");
                    return Ok(());
                }
            };

            let job_bytes: Vec<u8> = client_addr
                .iter()
                .copied()
                .chain(std::iter::once(b'#'))
                .chain(req_id.iter().copied())
                .collect();

            let job = match JobId::parse(&job_bytes) {
                Ok(job) => job,
                Err(e) => {
                    warn!(error = %e, "dropping REGISTER with malformed job id");
                    return Ok(());
                }
            };

            if let Some((job, tensor)) = self.jobs.register(job, expected) {
                self.publish_result(job, tensor)?;
            }
        } else if msg_type.as_slice() == sentinel::SHOW_CONFIG {
            std::thread::sleep(std::time::Duration::from_millis(defaults::SLOW_JOINER_DELAY_MS));
            self.sender
                .send_multipart([client_addr.as_slice(), info.as_slice(), req_id.as_slice()], 0)?;
        } else {
            warn!(?msg_type, "dropping control message with unknown type");
        }

        Ok(())
    }

    fn handle_worker_output(&mut self) -> Result<()> {
        let frames = match self.receiver.recv_multipart(0) {
            Ok(f) => f,
            Err(zmq::Error::EAGAIN) => return Ok(()),
            Err(zmq::Error::ETERM) => {
                info!("sink receiver transport terminated");
                self.running = false;
                return Ok(());
            }
            Err(e) => return Err(SinkError::Zmq(e)),
        };

        if frames.len() != 3 {
            warn!(frame_count = frames.len(), "dropping malformed worker output");
            return Ok(());
        }

        let chunk = match ChunkId::parse(&frames[0]) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "dropping worker output with malformed chunk id");
                return Ok(());
            }
        };

        let tensor = match Tensor::unpack(&frames[1], &frames[2]) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "dropping worker output with malformed tensor");
                return Ok(());
            }
        };

        let (received_so_far, expected) = self.jobs.progress(&chunk.job).unwrap_or((0, None));
        debug!(
            chunk = %chunk,
            received = received_so_far + tensor.rows(),
            expected = ?expected,
            "partial result received"
        );

        if let Some((job, tensor)) = self.jobs.accept_partial(chunk, tensor) {
            self.publish_result(job, tensor)?;
        }

        Ok(())
    }

    fn publish_result(&mut self, job: JobId, tensor: Tensor) -> Result<()> {
        let (header_json, raw_bytes) = tensor.pack()?;
        self.sender.send_multipart(
            [
                job.client.as_bytes(),
                header_json.as_slice(),
                raw_bytes.as_slice(),
                job.req.as_bytes(),
            ],
            0,
        )?;
        info!(job = %job, rows = tensor.rows(), "job delivered");
        Ok(())
    }
}

fn bind_ephemeral(socket: &zmq::Socket) -> Result<String> {
    socket.bind("tcp://127.0.0.1:*")?;
    let endpoint = socket
        .get_last_endpoint()?
        .map_err(|_| SinkError::Zmq(zmq::Error::EINVAL))?;
    Ok(endpoint)
}
