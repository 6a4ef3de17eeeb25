//! System configuration parameters.
//!
//! Fixed capacities (slot counts, channel depths, buffer sizes) are
//! compile-time constants; everything an installer may tune (addresses,
//! timeouts, retry ceilings, trigger thresholds) lives in [`SystemConfig`]
//! and can be overridden from a JSON file at startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Fixed capacities ─────────────────────────────────────────

/// Number of binary output channels on the device.
pub const NUM_OUTPUTS: usize = 4;

/// Bitmask covering every output channel.
pub const ALL_OUTPUTS_MASK: u8 = (1 << NUM_OUTPUTS) - 1;

/// Maximum number of concurrently connected clients.
pub const MAX_CLIENTS: usize = 3;

/// Depth of the shared session→router command channel.
pub const CMD_CHANNEL_DEPTH: usize = 8;

/// Depth of each session's private router→session response channel.
pub const RESP_CHANNEL_DEPTH: usize = 8;

/// Depth of the classifier→router detection channel.
pub const DETECT_CHANNEL_DEPTH: usize = 8;

/// Capacity of a session's outbound response ring buffer.
pub const RESPONSE_RING_CAP: usize = 8;

/// Socket receive buffer size in bytes.
pub const RECV_BUF_SIZE: usize = 256;

/// Longest accepted command line (matches the wire vocabulary with room
/// to spare for garbage that will answer as unrecognized).
pub const CMD_LINE_MAX: usize = 64;

/// Longest response text, excluding the wire newline.
pub const RESPONSE_MAX: usize = 96;

/// A response plus its terminating newline.
pub const WIRE_MAX: usize = RESPONSE_MAX + 1;

/// Classifier label table. Index 1 is the wake command the trigger
/// policy watches by default.
pub const DETECTION_LABELS: [&str; 2] = ["fondo", "activar"];

// ── Tunable configuration ────────────────────────────────────

/// Runtime-tunable parameters, loadable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Network ---
    /// Listen address for the command server.
    pub listen_addr: String,
    /// Per-client inactivity timeout (milliseconds).
    pub client_timeout_ms: u64,
    /// Socket receive window per session iteration (milliseconds).
    pub socket_recv_timeout_ms: u64,

    // --- Channels ---
    /// Send timeout on the critical session→router path (milliseconds).
    pub fast_send_timeout_ms: u64,
    /// Send timeout on response delivery paths (milliseconds).
    pub normal_send_timeout_ms: u64,
    /// Router inbound receive window; bounds shutdown latency (milliseconds).
    pub router_recv_timeout_ms: u64,

    // --- Acceptor ---
    /// Accept poll tick (milliseconds).
    pub accept_poll_ms: u64,
    /// Interval between cleanup passes / status lines (milliseconds).
    pub maintenance_interval_ms: u64,
    /// Session loop iterations between inactivity checks.
    pub activity_check_every: u64,

    // --- Backoff ceilings ---
    /// Network faults tolerated on a critical path before giving up.
    pub max_network_retries: u32,
    /// Resource faults tolerated before giving up.
    pub max_resource_retries: u32,
    /// Critical faults tolerated on a critical path before the process halts.
    pub max_critical_errors: u32,

    // --- Detection trigger ---
    /// Label index that fires the detection side effect.
    pub trigger_label_index: u32,
    /// Minimum confidence for the detection side effect.
    pub trigger_threshold: f32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Network
            listen_addr: "0.0.0.0:50007".into(),
            client_timeout_ms: 80_000,
            socket_recv_timeout_ms: 500,

            // Channels
            fast_send_timeout_ms: 25,
            normal_send_timeout_ms: 100,
            router_recv_timeout_ms: 100,

            // Acceptor
            accept_poll_ms: 10,
            maintenance_interval_ms: 5_000,
            activity_check_every: 5,

            // Backoff
            max_network_retries: 5,
            max_resource_retries: 10,
            max_critical_errors: 3,

            // Detection
            trigger_label_index: 1,
            trigger_threshold: 0.95,
        }
    }
}

impl SystemConfig {
    /// Reject configurations that would wedge a loop or defeat the
    /// admission/backoff design. Invalid values are errors, not clamps.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty");
        }
        if self.client_timeout_ms == 0 {
            return Err("client_timeout_ms must be positive");
        }
        if self.socket_recv_timeout_ms == 0 || self.router_recv_timeout_ms == 0 {
            return Err("receive timeouts must be positive");
        }
        if self.socket_recv_timeout_ms >= self.client_timeout_ms {
            return Err("socket_recv_timeout_ms must be below client_timeout_ms");
        }
        if self.fast_send_timeout_ms == 0 || self.normal_send_timeout_ms == 0 {
            return Err("send timeouts must be positive");
        }
        if self.activity_check_every == 0 {
            return Err("activity_check_every must be positive");
        }
        if !(0.0..=1.0).contains(&self.trigger_threshold) {
            return Err("trigger_threshold must be within 0.0..=1.0");
        }
        Ok(())
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    pub fn socket_recv_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_recv_timeout_ms)
    }

    pub fn fast_send_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_send_timeout_ms)
    }

    pub fn normal_send_timeout(&self) -> Duration {
        Duration::from_millis(self.normal_send_timeout_ms)
    }

    pub fn router_recv_timeout(&self) -> Duration {
        Duration::from_millis(self.router_recv_timeout_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }
}
