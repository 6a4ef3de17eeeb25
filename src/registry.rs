//! Fixed-capacity session registry.
//!
//! The only resource shared by more than one execution unit. A single
//! mutex guards the slot array; the lock is held for the scan/claim or a
//! field update only, never across socket I/O or a channel send (senders
//! are cloned out under the lock and used after release).
//!
//! A slot is free when it is `Disconnected` with no registered response
//! sender. A finished session leaves its slot `Disconnected` with the
//! sender still attached; the acceptor's cleanup pass joins the thread
//! and calls [`SessionRegistry::reclaim`] to complete the cycle.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::channel::Sender;
use crate::config::{MAX_CLIENTS, SystemConfig};
use crate::message::{Origin, ResponseMsg, SessionId};
use crate::session::SessionState;

/// Stable index into the slot array.
pub type SlotIndex = usize;

struct Slot {
    state: SessionState,
    session_id: SessionId,
    resp_tx: Option<Sender<ResponseMsg>>,
}

impl Slot {
    fn free() -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: 0,
            resp_tx: None,
        }
    }

    fn is_free(&self) -> bool {
        self.state == SessionState::Disconnected && self.resp_tx.is_none()
    }

    fn is_live(&self) -> bool {
        matches!(
            self.state,
            SessionState::Connected | SessionState::Active
        ) && self.resp_tx.is_some()
    }
}

pub struct SessionRegistry {
    slots: Mutex<[Slot; MAX_CLIENTS]>,
    /// Also the session-id allocator: ids are 1-based and never reused.
    total_served: AtomicU32,
    normal_send_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            slots: Mutex::new(core::array::from_fn(|_| Slot::free())),
            total_served: AtomicU32::new(0),
            normal_send_timeout: config.normal_send_timeout(),
        }
    }

    /// Claim the first free slot, registering the session's private
    /// response sender. `None` means the server is at capacity.
    pub fn allocate(&self, resp_tx: Sender<ResponseMsg>) -> Option<(SlotIndex, SessionId)> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(Slot::is_free)?;
        let id = self.total_served.fetch_add(1, Ordering::Relaxed) + 1;
        slots[index] = Slot {
            state: SessionState::Connected,
            session_id: id,
            resp_tx: Some(resp_tx),
        };
        Some((index, id))
    }

    /// Record a session state change; regressions are ignored (the
    /// machine is monotone) and flagged in debug builds.
    pub fn set_state(&self, index: SlotIndex, next: SessionState) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(index) else {
            debug_assert!(false, "slot index {index} out of range");
            return;
        };
        if slot.state.may_transition(next) {
            slot.state = next;
        } else if slot.state != next {
            warn!(
                "ignored session state regression {:?} -> {next:?} (slot {index})",
                slot.state
            );
        }
    }

    pub fn state(&self, index: SlotIndex) -> SessionState {
        self.slots.lock()[index].state
    }

    /// Free a `Disconnected` slot after its thread has terminated.
    /// Returns whether anything was reclaimed.
    pub fn reclaim(&self, index: SlotIndex) -> bool {
        let mut slots = self.slots.lock();
        let slot = &mut slots[index];
        if slot.state == SessionState::Disconnected && slot.resp_tx.is_some() {
            *slot = Slot::free();
            true
        } else {
            false
        }
    }

    /// Route a response: to its originating session, or to every live
    /// session for [`Origin::System`]. A saturated or vanished session
    /// drops the message with a log line; delivery never blocks past the
    /// configured timeout and never holds the registry lock.
    pub fn deliver(&self, msg: ResponseMsg) {
        match msg.origin {
            Origin::Session(id) => {
                let tx = {
                    let slots = self.slots.lock();
                    slots
                        .iter()
                        .find(|s| s.session_id == id && s.is_live())
                        .and_then(|s| s.resp_tx.clone())
                };
                match tx {
                    Some(tx) => {
                        if let Err(e) = tx.send(msg, self.normal_send_timeout) {
                            warn!("response to session {id} dropped: {e}");
                        }
                    }
                    None => debug!("session {id} gone, response dropped"),
                }
            }
            Origin::System => {
                let targets: heapless::Vec<(SessionId, Sender<ResponseMsg>), MAX_CLIENTS> = {
                    let slots = self.slots.lock();
                    let mut out = heapless::Vec::new();
                    for slot in slots.iter().filter(|s| s.is_live()) {
                        if let Some(tx) = slot.resp_tx.clone() {
                            let _ = out.push((slot.session_id, tx));
                        }
                    }
                    out
                };
                for (id, tx) in targets {
                    if let Err(e) = tx.send(msg.clone(), self.normal_send_timeout) {
                        warn!("broadcast to session {id} dropped: {e}");
                    }
                }
            }
        }
    }

    /// Sessions currently in `Connected` or `Active`.
    pub fn active_count(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|s| matches!(s.state, SessionState::Connected | SessionState::Active))
            .count()
    }

    /// Total sessions ever admitted since process start.
    pub fn total_served(&self) -> u32 {
        self.total_served.load(Ordering::Relaxed)
    }
}
