//! Port traits — the boundary between the control plane and its
//! collaborators.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ server core (sessions, router)
//! ```
//!
//! The network link and the physical pins are driven adapters: the core
//! never opens sockets or toggles GPIOs directly, it talks to these
//! traits. The classification source needs no trait — it is handed the
//! sending half of the detection channel.

use std::time::Duration;

use crate::error::{HwError, NetError};

// ───────────────────────────────────────────────────────────────
// Socket ports (driven adapter: network → sessions)
// ───────────────────────────────────────────────────────────────

/// One connected client's byte stream, owned exclusively by its session.
pub trait ClientSocket: Send {
    /// Read into `buf`, waiting at most `timeout`.
    ///
    /// `Ok(n)` delivers `n > 0` bytes; an empty window is
    /// `Err(NetError::Timeout)` (not a fault), a clean remote close is
    /// `Err(NetError::PeerClosed)`.
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError>;

    /// Write `buf`, returning the number of bytes accepted.
    fn send(&mut self, buf: &[u8]) -> Result<usize, NetError>;

    /// Release the underlying handle. Idempotent.
    fn close(&mut self);
}

/// Factory of connected sockets (the link layer is out of scope).
pub trait SocketAcceptor: Send {
    type Socket: ClientSocket + 'static;

    /// Poll for one inbound connection without blocking.
    fn accept_nonblocking(&mut self) -> Result<Option<Self::Socket>, NetError>;
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: router → hardware)
// ───────────────────────────────────────────────────────────────

/// Physical write side of the output bank.
///
/// Implementations must be idempotent per (index, state): the controller
/// coalesces, but a repeated write must not glitch the output.
pub trait OutputBank: Send {
    fn write_channel(&mut self, index: usize, state: bool) -> Result<(), HwError>;
}
