//! Connection acceptor — admission control and slot maintenance.
//!
//! Single thread: polls for inbound connections, claims a registry slot
//! for each, and spawns the client session bound to it. Capacity is
//! hard — with every slot taken the newcomer gets the fixed rejection
//! text and its socket is closed immediately; nothing is queued.
//!
//! The same thread runs the periodic maintenance pass: joining finished
//! session threads, reclaiming their slots, and emitting an aggregate
//! status line (active count, total served, per-class fault counters).
//! The status line is observational only.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, info, warn};

use crate::channel::{self, Sender};
use crate::command::REJECT_RESPONSE;
use crate::config::{MAX_CLIENTS, RESP_CHANNEL_DEPTH, SystemConfig};
use crate::error::{Error, ErrorClass, classify};
use crate::faults::FaultMonitor;
use crate::message::CommandMsg;
use crate::ports::{ClientSocket, SocketAcceptor};
use crate::registry::SessionRegistry;
use crate::session::{self, ClientSession, SessionState};

pub struct ConnectionAcceptor<A: SocketAcceptor> {
    acceptor: A,
    registry: Arc<SessionRegistry>,
    cmd_tx: Sender<CommandMsg>,
    faults: Arc<FaultMonitor>,
    config: Arc<SystemConfig>,
    handles: [Option<JoinHandle<()>>; MAX_CLIENTS],
    last_maintenance: Instant,
}

impl<A: SocketAcceptor> ConnectionAcceptor<A> {
    pub fn new(
        acceptor: A,
        registry: Arc<SessionRegistry>,
        cmd_tx: Sender<CommandMsg>,
        faults: Arc<FaultMonitor>,
        config: Arc<SystemConfig>,
    ) -> Self {
        Self {
            acceptor,
            registry,
            cmd_tx,
            faults,
            config,
            handles: core::array::from_fn(|_| None),
            last_maintenance: Instant::now(),
        }
    }

    pub fn run(mut self) {
        info!("acceptor started ({MAX_CLIENTS} session slots)");
        loop {
            if self.faults.fatal() {
                break;
            }

            match self.acceptor.accept_nonblocking() {
                Ok(Some(socket)) => self.admit(socket),
                Ok(None) => {}
                Err(e) => {
                    let class = classify(&Error::Net(e));
                    if !self.faults.handle("accept", class, true) {
                        self.faults.halt("accept path exhausted");
                        break;
                    }
                }
            }

            if self.last_maintenance.elapsed() >= self.config.maintenance_interval() {
                self.maintenance();
                self.last_maintenance = Instant::now();
            }

            // Cooperative pacing under low load; correctness never
            // depends on this delay.
            std::thread::sleep(self.config.accept_poll());
        }

        // Sessions observe the fatal flag themselves; collect them.
        for handle in self.handles.iter_mut().filter_map(Option::take) {
            let _ = handle.join();
        }
        info!("acceptor stopped");
    }

    fn admit(&mut self, mut socket: A::Socket) {
        let (resp_tx, resp_rx) = channel::bounded(RESP_CHANNEL_DEPTH);
        let Some((slot, id)) = self.registry.allocate(resp_tx) else {
            info!("at capacity, rejecting connection");
            let mut wire: heapless::Vec<u8, 32> = heapless::Vec::new();
            let _ = wire.extend_from_slice(REJECT_RESPONSE.as_bytes());
            let _ = wire.push(b'\n');
            let _ = socket.send(&wire);
            socket.close();
            return;
        };

        let session = ClientSession::new(
            id,
            slot,
            socket,
            resp_rx,
            self.cmd_tx.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.faults),
            Arc::clone(&self.config),
        );
        match session::spawn(session) {
            Ok(handle) => {
                info!("session {id} admitted (slot {slot})");
                self.handles[slot] = Some(handle);
            }
            Err(e) => {
                warn!("session thread spawn failed: {e}");
                // Roll the claim back so the slot is not leaked. The
                // socket was moved into the dropped session and closes
                // with it.
                self.registry.set_state(slot, SessionState::Errored);
                self.registry.set_state(slot, SessionState::Disconnected);
                let _ = self.registry.reclaim(slot);
                let _ = self.faults.handle("session spawn", ErrorClass::Resource, true);
            }
        }
    }

    /// Join finished session threads, reclaim their slots, and log the
    /// aggregate status line.
    fn maintenance(&mut self) {
        for slot in 0..MAX_CLIENTS {
            let finished = self
                .handles[slot]
                .as_ref()
                .is_some_and(JoinHandle::is_finished);
            if finished && self.registry.state(slot) == SessionState::Disconnected {
                if let Some(handle) = self.handles[slot].take() {
                    let _ = handle.join();
                }
                if self.registry.reclaim(slot) {
                    debug!("slot {slot} reclaimed");
                }
            }
        }

        let [net, res, rec, crit] = self.faults.snapshot();
        info!(
            "status: {} active, {} served, faults net={net} res={res} rec={rec} crit={crit}",
            self.registry.active_count(),
            self.registry.total_served(),
        );
    }
}

/// Spawn the acceptor's thread.
pub fn spawn<A: SocketAcceptor + 'static>(acceptor: ConnectionAcceptor<A>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("acceptor".into())
        .spawn(move || acceptor.run())
        .expect("acceptor thread spawn")
}
