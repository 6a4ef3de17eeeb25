//! Actuator controller — authoritative state of the binary outputs.
//!
//! A single instance lives inside the command router (single writer, so
//! no lock). `apply` walks the requested mask in ascending channel order
//! and coalesces: a channel already in the requested state is skipped
//! rather than re-written, so repeated commands are hardware no-ops.
//! The first physical failure aborts the walk; cached state is only
//! updated after an observed-successful write, so a failed channel's
//! entry is never left guessing.

use std::time::Instant;

use crate::config::{ALL_OUTPUTS_MASK, NUM_OUTPUTS};
use crate::error::HwError;
use crate::ports::OutputBank;

/// Copy of the controller state, handed out by [`ActuatorController::status`].
#[derive(Debug, Clone, Copy)]
pub struct ActuatorSnapshot {
    pub channel_states: [bool; NUM_OUTPUTS],
    pub last_change: [Instant; NUM_OUTPUTS],
}

/// A physical write failed partway through an `apply`.
#[derive(Debug, Clone, Copy)]
pub struct ApplyFailure {
    /// Channel whose write failed; its cached state is untouched.
    pub channel: usize,
    /// Channels successfully written before the abort.
    pub applied: u8,
    pub source: HwError,
}

pub struct ActuatorController<B: OutputBank> {
    bank: B,
    states: [bool; NUM_OUTPUTS],
    last_change: [Instant; NUM_OUTPUTS],
}

impl<B: OutputBank> ActuatorController<B> {
    /// All channels start logically OFF; the physical bank is expected to
    /// match (power-on default).
    pub fn new(bank: B) -> Self {
        let now = Instant::now();
        Self {
            bank,
            states: [false; NUM_OUTPUTS],
            last_change: [now; NUM_OUTPUTS],
        }
    }

    /// Drive every channel selected by `mask` to `state`.
    ///
    /// Returns the mask of channels actually written (coalesced no-ops
    /// excluded). On failure the walk stops at the offending channel and
    /// the partial mask travels in the error.
    pub fn apply(&mut self, mask: u8, state: bool) -> Result<u8, ApplyFailure> {
        let mut written: u8 = 0;
        for channel in 0..NUM_OUTPUTS {
            let bit = 1u8 << channel;
            if mask & bit == 0 || self.states[channel] == state {
                continue;
            }
            if let Err(source) = self.bank.write_channel(channel, state) {
                return Err(ApplyFailure {
                    channel,
                    applied: written,
                    source,
                });
            }
            self.states[channel] = state;
            self.last_change[channel] = Instant::now();
            written |= bit;
        }
        Ok(written)
    }

    /// Snapshot copy; never blocks, never touches hardware.
    pub fn status(&self) -> ActuatorSnapshot {
        ActuatorSnapshot {
            channel_states: self.states,
            last_change: self.last_change,
        }
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }
}

/// Convenience for tests and logs: mask of channels currently ON.
pub fn state_mask(states: &[bool; NUM_OUTPUTS]) -> u8 {
    let mut mask = 0u8;
    for (i, on) in states.iter().enumerate() {
        if *on {
            mask |= 1 << i;
        }
    }
    mask & ALL_OUTPUTS_MASK
}
