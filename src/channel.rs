//! Bounded inter-unit message channels.
//!
//! Thin wrapper over `crossbeam`'s bounded channels pinning down the
//! contract every link in the system relies on:
//!
//! - capacity is fixed at creation; a full channel is back-pressure,
//!   surfaced as [`SendError::Full`] after at most the caller's timeout,
//!   never a fatal condition and never an unbounded block;
//! - delivery is FIFO per channel;
//! - each logical link (sessions→router, router→session, detector→router)
//!   is a distinct channel instance.

use std::time::Duration;

use crossbeam::channel as cb;

/// Create a bounded FIFO channel with `capacity` slots.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = cb::bounded(capacity);
    (Sender(tx), Receiver(rx))
}

// ── Errors ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The channel stayed full for the whole timeout window.
    Full,
    /// The receiving end is gone; the link is dead.
    Closed,
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "channel full"),
            Self::Closed => write!(f, "channel closed"),
        }
    }
}

// ── Sender ───────────────────────────────────────────────────

/// Producer half. Cloneable for multi-producer links (sessions→router).
pub struct Sender<T>(cb::Sender<T>);

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Sender<T> {
    /// Block up to `timeout` for a free slot.
    pub fn send(&self, msg: T, timeout: Duration) -> Result<(), SendError> {
        match self.0.send_timeout(msg, timeout) {
            Ok(()) => Ok(()),
            Err(cb::SendTimeoutError::Timeout(_)) => Err(SendError::Full),
            Err(cb::SendTimeoutError::Disconnected(_)) => Err(SendError::Closed),
        }
    }

    /// Enqueue only if a slot is free right now.
    pub fn try_send(&self, msg: T) -> Result<(), SendError> {
        match self.0.try_send(msg) {
            Ok(()) => Ok(()),
            Err(cb::TrySendError::Full(_)) => Err(SendError::Full),
            Err(cb::TrySendError::Disconnected(_)) => Err(SendError::Closed),
        }
    }
}

// ── Receiver ─────────────────────────────────────────────────

/// Consumer half. Single consumer per link by convention.
pub struct Receiver<T>(cb::Receiver<T>);

impl<T> Receiver<T> {
    /// Block up to `timeout` for the next message. `None` covers both an
    /// empty window and a closed channel; consumers distinguish shutdown
    /// via the fault monitor's fatal flag, not the channel.
    pub fn recv(&self, timeout: Duration) -> Option<T> {
        self.0.recv_timeout(timeout).ok()
    }

    /// Dequeue only if a message is already waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.0.try_recv().ok()
    }
}
