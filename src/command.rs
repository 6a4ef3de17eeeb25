//! Wire command vocabulary and lookup table.
//!
//! Classic table-driven dispatch: an ordered, immutable array of
//! `(literal, mask, state, is_status)` rows. Lookup is a full-length,
//! case-sensitive exact match after trimming leading whitespace and one
//! trailing CR/LF pair; insertion order only breaks ties, it is not a
//! prefix match. Parsing is pure and never touches actuator state.

use core::fmt::Write as _;

use crate::config::{ALL_OUTPUTS_MASK, NUM_OUTPUTS};
use crate::message::{ResponseText, bounded_str};

// ── Fixed wire texts ─────────────────────────────────────────

/// Welcome banner sent once per accepted connection.
pub const BANNER: &str = "Accesado";

/// Fixed rejection sent when every session slot is taken.
pub const REJECT_RESPONSE: &str = "Acceso_DENEGADO";

/// Reply for input that matches no table row.
pub const UNRECOGNIZED_RESPONSE: &str = "COMANDO NO RECONOCIDO";

/// Session-synthesized reply when the router channel is saturated.
pub const BUSY_RESPONSE: &str = "SERVIDOR OCUPADO";

// ── Command model ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Drive the channels selected by `channel_mask` to `desired_state`.
    SetOutputs,
    /// Report the authoritative output snapshot.
    QueryStatus,
    /// No table row matched; answered without touching actuator state.
    Unrecognized,
}

/// A parsed command. `channel_mask` bit i selects output channel i.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub channel_mask: u8,
    pub desired_state: bool,
}

/// One row of the lookup table.
pub struct CommandEntry {
    pub literal: &'static str,
    pub mask: u8,
    pub state: bool,
    pub is_status: bool,
}

const fn output(literal: &'static str, channel: usize, state: bool) -> CommandEntry {
    CommandEntry {
        literal,
        mask: 1 << channel,
        state,
        is_status: false,
    }
}

/// The wire vocabulary: `{i}_ON` / `{i}_OFF` per channel, `ALL_ON`,
/// `ALL_OFF`, `STATUS`.
pub const COMMAND_TABLE: [CommandEntry; 11] = [
    output("1_ON", 0, true),
    output("1_OFF", 0, false),
    output("2_ON", 1, true),
    output("2_OFF", 1, false),
    output("3_ON", 2, true),
    output("3_OFF", 2, false),
    output("4_ON", 3, true),
    output("4_OFF", 3, false),
    CommandEntry {
        literal: "ALL_ON",
        mask: ALL_OUTPUTS_MASK,
        state: true,
        is_status: false,
    },
    CommandEntry {
        literal: "ALL_OFF",
        mask: ALL_OUTPUTS_MASK,
        state: false,
        is_status: false,
    },
    CommandEntry {
        literal: "STATUS",
        mask: 0,
        state: false,
        is_status: true,
    },
];

// ── Parsing ──────────────────────────────────────────────────

/// Trim leading whitespace and at most one trailing CR/LF pair.
pub fn normalize(raw: &str) -> &str {
    let s = raw.trim_start();
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .or_else(|| s.strip_suffix('\r'))
        .unwrap_or(s)
}

/// Resolve a raw line against the table.
///
/// Returns the parsed command plus the matched row index (for the
/// router's usage counters); `None` index means unrecognized.
pub fn parse(raw: &str) -> (Command, Option<usize>) {
    let line = normalize(raw);
    for (idx, entry) in COMMAND_TABLE.iter().enumerate() {
        if entry.literal == line {
            let kind = if entry.is_status {
                CommandKind::QueryStatus
            } else {
                CommandKind::SetOutputs
            };
            return (
                Command {
                    kind,
                    channel_mask: entry.mask,
                    desired_state: entry.state,
                },
                Some(idx),
            );
        }
    }
    (
        Command {
            kind: CommandKind::Unrecognized,
            channel_mask: 0,
            desired_state: false,
        },
        None,
    )
}

// ── Response formatting ──────────────────────────────────────

const fn on_off(state: bool) -> &'static str {
    if state { "ON" } else { "OFF" }
}

/// `SALIDA <i>: <ON|OFF>` for a single channel, `TODAS LAS SALIDAS:
/// <ON|OFF>` for the full mask.
pub fn format_set_response(cmd: &Command) -> ResponseText {
    let mut out = ResponseText::new();
    if cmd.channel_mask == ALL_OUTPUTS_MASK {
        let _ = write!(out, "TODAS LAS SALIDAS: {}", on_off(cmd.desired_state));
    } else {
        let channel = cmd.channel_mask.trailing_zeros() + 1;
        let _ = write!(out, "SALIDA {}: {}", channel, on_off(cmd.desired_state));
    }
    out
}

/// `S1:<ON|OFF> S2:... S3:... S4:...`
pub fn format_status(states: &[bool; NUM_OUTPUTS]) -> ResponseText {
    let mut out = ResponseText::new();
    for (i, state) in states.iter().enumerate() {
        if i > 0 {
            let _ = out.push(' ');
        }
        let _ = write!(out, "S{}:{}", i + 1, on_off(*state));
    }
    out
}

/// `ERROR EN SALIDA <i>` when a physical write fails mid-apply.
pub fn format_apply_error(channel: usize) -> ResponseText {
    let mut out = ResponseText::new();
    let _ = write!(out, "ERROR EN SALIDA {}", channel + 1);
    out
}

/// Unrecognized-command reply as a bounded response text.
pub fn unrecognized_response() -> ResponseText {
    bounded_str(UNRECOGNIZED_RESPONSE)
}
