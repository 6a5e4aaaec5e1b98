//! Canonical default values shared across Ventilator, Sink, and Worker.

/// Client-facing submit port (PUSH -> PULL).
pub const DEFAULT_PORT_IN: u16 = 5555;
/// Client-facing publish port (PUB -> SUB).
pub const DEFAULT_PORT_OUT: u16 = 5556;

/// Default executable names the Ventilator spawns at startup, assumed to
/// be on `PATH`. Override via [`crate::config::BrokerParams`] callers or
/// CLI flags when binaries live elsewhere.
pub const DEFAULT_SINK_EXE: &str = "tensorbroker-sink";
pub const DEFAULT_WORKER_EXE: &str = "tensorbroker-worker";

/// How long the Sink sleeps after a `SHOW_CONFIG` control message before
/// publishing the reply, to dodge the PUB/SUB slow-joiner race.
pub const SLOW_JOINER_DELAY_MS: u64 = 100;

/// Socket receive timeout used by every event loop's poll, so loops can
/// check their shutdown flag between messages instead of blocking forever.
pub const RECV_POLL_TIMEOUT_MS: i64 = 100;
