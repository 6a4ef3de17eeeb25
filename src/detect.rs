//! Detection-event trigger policy.
//!
//! The audio classifier (external collaborator) pushes
//! [`DetectionEvent`]s onto a dedicated bounded channel; the router
//! drains it and consults [`TriggerPolicy`]. An event fires only on an
//! exact label match at or above the confidence threshold.
//!
//! The upstream firmware also carried a "stable detection" smoothing pass
//! (latching a previous best label and decaying it against a second
//! threshold). Its intent is ambiguous and it is deliberately not
//! reproduced here; the plain threshold trigger is the contract.

use core::fmt::Write as _;

use crate::config::DETECTION_LABELS;
use crate::message::ResponseText;

/// One asynchronous classification result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionEvent {
    pub label_index: u32,
    pub confidence: f32,
}

/// Fires the "command detected" side effect for matching events.
#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
    label_index: u32,
    threshold: f32,
}

impl TriggerPolicy {
    pub fn new(label_index: u32, threshold: f32) -> Self {
        Self {
            label_index,
            threshold,
        }
    }

    /// Exact label match at or above the threshold.
    pub fn fires(&self, event: &DetectionEvent) -> bool {
        event.label_index == self.label_index && event.confidence >= self.threshold
    }
}

/// Human-readable label for an index, for logs and broadcasts.
pub fn label_name(index: u32) -> &'static str {
    DETECTION_LABELS
        .get(index as usize)
        .copied()
        .unwrap_or("desconocido")
}

/// Broadcast text for a fired event: `COMANDO DETECTADO: <label> (<conf>)`.
pub fn announcement(event: &DetectionEvent) -> ResponseText {
    let mut out = ResponseText::new();
    let _ = write!(
        out,
        "COMANDO DETECTADO: {} ({:.2})",
        label_name(event.label_index),
        event.confidence
    );
    out
}
