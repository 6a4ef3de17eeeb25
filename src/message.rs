//! Inter-unit message envelopes.
//!
//! Sessions forward normalized command lines tagged with their id; the
//! router answers with response texts tagged with the originating session
//! (or [`Origin::System`] for a broadcast to every active session).
//! Payloads are fixed-capacity `heapless` strings so no allocation
//! happens on the hot path.

use crate::config::{CMD_LINE_MAX, RESPONSE_MAX};

/// Unique per-connection identifier, allocated by the session registry.
pub type SessionId = u32;

/// Where a message came from, and therefore where its reply goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// System-wide push: delivered to every active session.
    System,
    /// A single client's session.
    Session(SessionId),
}

/// A normalized command line on its way to the router.
pub type CommandLine = heapless::String<CMD_LINE_MAX>;

/// Response text, excluding the wire newline.
pub type ResponseText = heapless::String<RESPONSE_MAX>;

/// Session → router: one command, tagged with the issuing session.
#[derive(Debug, Clone)]
pub struct CommandMsg {
    pub session: SessionId,
    pub line: CommandLine,
}

/// Router → session(s): one response text.
#[derive(Debug, Clone)]
pub struct ResponseMsg {
    pub origin: Origin,
    pub text: ResponseText,
}

impl ResponseMsg {
    /// Reply addressed to one session.
    pub fn to_session(session: SessionId, text: &str) -> Self {
        Self {
            origin: Origin::Session(session),
            text: bounded_str(text),
        }
    }

    /// System-wide broadcast.
    pub fn broadcast(text: &str) -> Self {
        Self {
            origin: Origin::System,
            text: bounded_str(text),
        }
    }
}

/// Copy `s` into a fixed-capacity string, truncating at a char boundary.
pub fn bounded_str<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
