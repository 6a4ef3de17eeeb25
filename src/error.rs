//! Unified error types for the VoxRelay control plane.
//!
//! Follows embedded practice: a single `Error` enum that every subsystem
//! can convert into, keeping the server loops' error handling uniform.
//! All variants are `Copy` so they can be cheaply passed through the fault
//! monitor and session state machine without allocation.
//!
//! [`classify`] is the pure severity mapping consumed by the fault
//! monitor: a fixed table from known failure codes to an [`ErrorClass`],
//! with unmatched transport faults defaulting to `Recoverable`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the control plane funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transport operation failed.
    Net(NetError),
    /// A physical output write failed.
    Hw(HwError),
    /// Subsystem initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Net(e) => write!(f, "net: {e}"),
            Self::Hw(e) => write!(f, "hw: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// No data within the requested window. Not a fault on receive paths.
    Timeout,
    /// Peer closed the connection (clean EOF).
    PeerClosed,
    /// Connection reset or broken pipe.
    ConnectionReset,
    /// Connection refused by the peer.
    Refused,
    /// Call interrupted before completion.
    Interrupted,
    /// Listen address already bound.
    AddrInUse,
    /// Socket-table or buffer exhaustion.
    BufferExhausted,
    /// Unclassified transport fault.
    Io,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::PeerClosed => write!(f, "peer closed"),
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::Refused => write!(f, "connection refused"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::AddrInUse => write!(f, "address in use"),
            Self::BufferExhausted => write!(f, "buffers exhausted"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// The physical write for this channel failed.
    WriteFailed { channel: u8 },
    /// Channel index outside the configured output bank.
    InvalidChannel { channel: u8 },
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed { channel } => write!(f, "write failed on channel {channel}"),
            Self::InvalidChannel { channel } => write!(f, "invalid channel {channel}"),
        }
    }
}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        Self::Hw(e)
    }
}

// ---------------------------------------------------------------------------
// Severity classification
// ---------------------------------------------------------------------------

/// Severity class driving the retry/backoff policy in
/// [`faults::FaultMonitor`](crate::faults::FaultMonitor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorClass {
    /// Transient transport fault. Bounded retry, critical paths only.
    Network = 0,
    /// Exhaustion (memory, socket table). Longer backoff, higher ceiling.
    Resource = 1,
    /// Default for unknown transient faults. Always retried.
    Recoverable = 2,
    /// Protocol or invariant violation. Never retried.
    Critical = 3,
}

impl ErrorClass {
    /// Number of classes, used to size counter arrays.
    pub const COUNT: usize = 4;

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Resource => "resource",
            Self::Recoverable => "recoverable",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a failure onto its severity class.
///
/// Pure and total: every error value has a class, and transport faults
/// without a dedicated row fall back to `Recoverable`.
pub const fn classify(err: &Error) -> ErrorClass {
    match err {
        Error::Net(e) => match e {
            NetError::PeerClosed | NetError::ConnectionReset | NetError::Refused => {
                ErrorClass::Network
            }
            NetError::AddrInUse | NetError::BufferExhausted => ErrorClass::Resource,
            NetError::Timeout | NetError::Interrupted | NetError::Io => ErrorClass::Recoverable,
        },
        Error::Hw(e) => match e {
            HwError::WriteFailed { .. } => ErrorClass::Recoverable,
            HwError::InvalidChannel { .. } => ErrorClass::Critical,
        },
        Error::Init(_) | Error::Config(_) => ErrorClass::Critical,
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
