//! Per-client session execution unit.
//!
//! One thread per connected client, owning the socket exclusively.
//!
//! ```text
//!  Connected ──banner──▶ Active ──inactivity──▶ TimedOut ─┐
//!                          │                              ├─▶ Disconnected
//!                          └──unrecoverable recv──▶ Errored ┘
//! ```
//!
//! Transitions are monotone toward `Disconnected`; no state is ever
//! revisited. Each loop iteration drains the private response channel
//! into a bounded ring, flushes the ring to the socket, then polls the
//! socket with a timeout and forwards normalized lines to the router.
//! Inactivity is only evaluated every Nth iteration to bound overhead.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, info, warn};

use crate::channel::{Receiver, SendError, Sender};
use crate::command::{BANNER, BUSY_RESPONSE};
use crate::config::{RECV_BUF_SIZE, RESPONSE_RING_CAP, SystemConfig, WIRE_MAX};
use crate::error::{Error, NetError, classify};
use crate::faults::FaultMonitor;
use crate::message::{CommandMsg, ResponseMsg, ResponseText, SessionId, bounded_str};
use crate::ports::ClientSocket;
use crate::registry::{SessionRegistry, SlotIndex};

// ── State machine ────────────────────────────────────────────

/// Lifecycle of one client session. Free slots also read `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, banner not yet on the wire.
    Connected,
    /// Serving traffic.
    Active,
    /// Inactivity limit exceeded; heading for teardown.
    TimedOut,
    /// Unrecoverable receive fault; heading for teardown.
    Errored,
    /// Terminal. Slot becomes reusable after reclamation.
    Disconnected,
}

impl SessionState {
    /// Explicit monotone transition table.
    pub fn may_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connected, Self::Active)
                | (Self::Connected, Self::Errored)
                | (Self::Active, Self::TimedOut)
                | (Self::Active, Self::Errored)
                | (Self::TimedOut, Self::Disconnected)
                | (Self::Errored, Self::Disconnected)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}

// ── Session ──────────────────────────────────────────────────

pub struct ClientSession<S: ClientSocket> {
    id: SessionId,
    slot: SlotIndex,
    socket: S,
    state: SessionState,
    last_activity: Instant,
    ring: heapless::Deque<ResponseText, RESPONSE_RING_CAP>,
    resp_rx: Receiver<ResponseMsg>,
    cmd_tx: Sender<CommandMsg>,
    registry: Arc<SessionRegistry>,
    faults: Arc<FaultMonitor>,
    config: Arc<SystemConfig>,
    iterations: u64,
}

impl<S: ClientSocket> ClientSession<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SessionId,
        slot: SlotIndex,
        socket: S,
        resp_rx: Receiver<ResponseMsg>,
        cmd_tx: Sender<CommandMsg>,
        registry: Arc<SessionRegistry>,
        faults: Arc<FaultMonitor>,
        config: Arc<SystemConfig>,
    ) -> Self {
        Self {
            id,
            slot,
            socket,
            state: SessionState::Connected,
            last_activity: Instant::now(),
            ring: heapless::Deque::new(),
            resp_rx,
            cmd_tx,
            registry,
            faults,
            config,
            iterations: 0,
        }
    }

    /// Run the session to completion. Consumes the session; the socket is
    /// released before the terminal transition.
    pub fn run(mut self) {
        if self.send_line(BANNER) {
            self.transition(SessionState::Active);
        } else {
            warn!("session {}: banner send failed", self.id);
            self.transition(SessionState::Errored);
        }

        while self.state == SessionState::Active && !self.faults.fatal() {
            self.iterations += 1;
            self.drain_responses();
            self.flush_ring();
            self.poll_socket();

            if self.state == SessionState::Active
                && self.iterations % self.config.activity_check_every == 0
                && self.last_activity.elapsed() > self.config.client_timeout()
            {
                info!("session {}: inactive past limit", self.id);
                self.transition(SessionState::TimedOut);
            }
        }

        // Fatal shutdown while still serving counts as an error path.
        if self.state == SessionState::Active {
            self.transition(SessionState::Errored);
        }

        self.socket.close();
        self.transition(SessionState::Disconnected);
        debug!("session {}: terminated", self.id);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state.may_transition(next) {
            debug!("session {}: {:?} -> {next:?}", self.id, self.state);
            self.state = next;
            self.registry.set_state(self.slot, next);
        }
    }

    /// Move queued responses into the ring. A full ring logs the oldest
    /// undelivered entry and rejects the new one (bounded loss).
    fn drain_responses(&mut self) {
        while let Some(msg) = self.resp_rx.try_recv() {
            self.enqueue(msg.text);
        }
    }

    fn enqueue(&mut self, text: ResponseText) {
        if self.ring.is_full() {
            if let Some(oldest) = self.ring.front() {
                warn!(
                    "session {}: response ring full, oldest undelivered: {:?}, rejecting: {:?}",
                    self.id,
                    oldest.as_str(),
                    text.as_str()
                );
            }
            return;
        }
        // Capacity checked above.
        let _ = self.ring.push_back(text);
    }

    /// Flush front-to-back. A send failure stops this cycle; the entry
    /// stays queued and is retried next iteration.
    fn flush_ring(&mut self) {
        while let Some(front) = self.ring.front() {
            let mut wire = heapless::Vec::<u8, WIRE_MAX>::new();
            let _ = wire.extend_from_slice(front.as_bytes());
            let _ = wire.push(b'\n');
            match self.socket.send(&wire) {
                Ok(_) => {
                    let _ = self.ring.pop_front();
                }
                Err(e) => {
                    debug!("session {}: flush deferred ({e})", self.id);
                    break;
                }
            }
        }
    }

    fn poll_socket(&mut self) {
        let mut buf = [0u8; RECV_BUF_SIZE];
        match self
            .socket
            .recv_timeout(&mut buf, self.config.socket_recv_timeout())
        {
            Ok(0) => {}
            Ok(n) => {
                self.last_activity = Instant::now();
                self.forward(&buf[..n]);
            }
            Err(NetError::Timeout) => {}
            Err(e) => {
                let class = classify(&Error::Net(e));
                if !self.faults.handle("session recv", class, false) {
                    info!("session {}: receive failed ({e}), closing", self.id);
                    self.transition(SessionState::Errored);
                }
            }
        }
    }

    /// Normalize raw bytes and hand the line to the router. Back-pressure
    /// answers locally with the busy response, without involving the
    /// router.
    fn forward(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim_matches(|c: char| c.is_ascii_control() || c.is_whitespace());
        if trimmed.is_empty() {
            return;
        }

        let msg = CommandMsg {
            session: self.id,
            line: bounded_str(trimmed),
        };
        match self.cmd_tx.send(msg, self.config.fast_send_timeout()) {
            Ok(()) => {}
            Err(SendError::Full) => {
                debug!("session {}: router saturated, answering busy", self.id);
                self.enqueue(bounded_str(BUSY_RESPONSE));
            }
            Err(SendError::Closed) => {
                warn!("session {}: command channel closed", self.id);
                self.transition(SessionState::Errored);
            }
        }
    }

    fn send_line(&mut self, text: &str) -> bool {
        let mut wire = heapless::Vec::<u8, WIRE_MAX>::new();
        let _ = wire.extend_from_slice(text.as_bytes());
        let _ = wire.push(b'\n');
        self.socket.send(&wire).is_ok()
    }
}

/// Spawn the session's thread. A spawn failure is resource pressure and
/// is reported to the caller for admission rollback.
pub fn spawn<S: ClientSocket + 'static>(
    session: ClientSession<S>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("session-{}", session.id))
        .spawn(move || session.run())
}
