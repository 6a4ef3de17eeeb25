//! Output-bank adapters.
//!
//! [`PinBank`] drives real pins through `embedded-hal` 1.0
//! [`OutputPin`]s — whatever HAL the deployment target provides plugs in
//! here. [`MemoryBank`] is the host/test stand-in: it records writes so
//! callers can assert on the full command history.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::config::NUM_OUTPUTS;
use crate::error::HwError;
use crate::ports::OutputBank;

// ── Real pins ────────────────────────────────────────────────

/// Four GPIO outputs behind the [`OutputBank`] port.
pub struct PinBank<P: OutputPin> {
    pins: [P; NUM_OUTPUTS],
}

impl<P: OutputPin> PinBank<P> {
    pub fn new(pins: [P; NUM_OUTPUTS]) -> Self {
        Self { pins }
    }
}

impl<P: OutputPin + Send> OutputBank for PinBank<P> {
    fn write_channel(&mut self, index: usize, state: bool) -> Result<(), HwError> {
        let Some(pin) = self.pins.get_mut(index) else {
            return Err(HwError::InvalidChannel {
                channel: index as u8,
            });
        };
        let result = if state { pin.set_high() } else { pin.set_low() };
        result.map_err(|_| {
            warn!("GPIO write failed on channel {index}");
            HwError::WriteFailed {
                channel: index as u8,
            }
        })
    }
}

// ── In-memory bank ───────────────────────────────────────────

/// Records writes instead of toggling hardware.
#[derive(Debug, Default)]
pub struct MemoryBank {
    states: [bool; NUM_OUTPUTS],
    writes: u32,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> [bool; NUM_OUTPUTS] {
        self.states
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl OutputBank for MemoryBank {
    fn write_channel(&mut self, index: usize, state: bool) -> Result<(), HwError> {
        let Some(slot) = self.states.get_mut(index) else {
            return Err(HwError::InvalidChannel {
                channel: index as u8,
            });
        };
        *slot = state;
        self.writes += 1;
        debug!("output {index} <- {}", if state { "ON" } else { "OFF" });
        Ok(())
    }
}
