//! VoxRelay control plane.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  TcpAcceptor / TcpClientSocket        PinBank / MemoryBank   │
//! │  (SocketAcceptor, ClientSocket)       (OutputBank)           │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ───────────────        │
//! │                                                              │
//! │  acceptor ─▶ registry ─▶ session ══cmd══▶ router ─▶ actuator │
//! │                 ▲            ▲◀════resp════╝  ▲              │
//! │                 └── faults ──┘      detect ───┘              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Execution units are plain threads: one acceptor, one router, one per
//! connected client. Every link between them is a bounded FIFO channel
//! with timeout-bounded blocking; the session registry is the only
//! lock-guarded shared state. The external audio classifier feeds the
//! detection channel; the router merges those events into the same
//! response flow as client commands.

#![deny(unused_must_use)]

pub mod acceptor;
pub mod actuator;
pub mod adapters;
pub mod channel;
pub mod command;
pub mod config;
pub mod detect;
pub mod error;
pub mod faults;
pub mod message;
pub mod ports;
pub mod registry;
pub mod router;
pub mod session;
