//! Command router — the single consumer of the command flow.
//!
//! ```text
//!  sessions ──CommandMsg──▶ ┌────────────┐ ──ResponseMsg──▶ registry
//!                           │   Router   │
//!  classifier ─Detection──▶ └────────────┘ ──apply/status──▶ actuator
//! ```
//!
//! Exactly one response per received command, tagged with the originating
//! session, processed in arrival order across all producers. The inbound
//! receive is timeout-bounded so the loop stays responsive to the fatal
//! flag. Detection events are drained after every wait; a firing event
//! broadcasts to all live sessions. Per-command usage counters are
//! observability only.

use std::sync::Arc;

use log::{debug, info, trace};

use crate::actuator::ActuatorController;
use crate::channel::Receiver;
use crate::command::{
    self, COMMAND_TABLE, Command, CommandKind,
};
use crate::detect::{self, DetectionEvent, TriggerPolicy};
use crate::error::{Error, classify};
use crate::faults::FaultMonitor;
use crate::message::{CommandMsg, ResponseMsg, ResponseText};
use crate::ports::OutputBank;
use crate::registry::SessionRegistry;

/// How many commands between usage-counter log lines.
const USAGE_LOG_EVERY: u64 = 50;

pub struct CommandRouter<B: OutputBank> {
    cmd_rx: Receiver<CommandMsg>,
    detect_rx: Receiver<DetectionEvent>,
    registry: Arc<SessionRegistry>,
    actuator: ActuatorController<B>,
    trigger: TriggerPolicy,
    faults: Arc<FaultMonitor>,
    recv_timeout: std::time::Duration,
    usage: [u32; COMMAND_TABLE.len()],
    unrecognized: u32,
    commands_seen: u64,
}

impl<B: OutputBank> CommandRouter<B> {
    pub fn new(
        cmd_rx: Receiver<CommandMsg>,
        detect_rx: Receiver<DetectionEvent>,
        registry: Arc<SessionRegistry>,
        actuator: ActuatorController<B>,
        faults: Arc<FaultMonitor>,
        config: &crate::config::SystemConfig,
    ) -> Self {
        Self {
            cmd_rx,
            detect_rx,
            registry,
            actuator,
            trigger: TriggerPolicy::new(config.trigger_label_index, config.trigger_threshold),
            faults,
            recv_timeout: config.router_recv_timeout(),
            usage: [0; COMMAND_TABLE.len()],
            unrecognized: 0,
            commands_seen: 0,
        }
    }

    pub fn run(mut self) {
        info!("command router started");
        loop {
            if self.faults.fatal() {
                break;
            }
            if let Some(msg) = self.cmd_rx.recv(self.recv_timeout) {
                self.dispatch(msg);
            }
            self.drain_detections();
        }
        info!(
            "command router stopped ({} commands, {} unrecognized)",
            self.commands_seen, self.unrecognized
        );
    }

    /// Resolve, act, and answer. Never leaves a command without exactly
    /// one response to its originating session.
    fn dispatch(&mut self, msg: CommandMsg) {
        let (cmd, entry) = command::parse(&msg.line);
        match entry {
            Some(idx) => self.usage[idx] += 1,
            None => self.unrecognized += 1,
        }

        let text = match cmd.kind {
            CommandKind::Unrecognized => {
                debug!(
                    "session {}: unrecognized command {:?}",
                    msg.session,
                    msg.line.as_str()
                );
                command::unrecognized_response()
            }
            CommandKind::QueryStatus => {
                command::format_status(&self.actuator.status().channel_states)
            }
            CommandKind::SetOutputs => self.apply(&cmd),
        };

        self.registry.deliver(ResponseMsg {
            origin: crate::message::Origin::Session(msg.session),
            text,
        });

        self.commands_seen += 1;
        if self.commands_seen % USAGE_LOG_EVERY == 0 {
            self.log_usage();
        }
    }

    fn apply(&mut self, cmd: &Command) -> ResponseText {
        match self.actuator.apply(cmd.channel_mask, cmd.desired_state) {
            Ok(written) => {
                if written != 0 {
                    debug!("outputs changed: mask {written:#06b}");
                }
                command::format_set_response(cmd)
            }
            Err(failure) => {
                let class = classify(&Error::Hw(failure.source));
                let _ = self.faults.handle("actuator apply", class, false);
                command::format_apply_error(failure.channel)
            }
        }
    }

    fn drain_detections(&mut self) {
        while let Some(event) = self.detect_rx.try_recv() {
            if self.trigger.fires(&event) {
                info!(
                    "detection fired: label {} confidence {:.3}",
                    event.label_index, event.confidence
                );
                self.registry
                    .deliver(ResponseMsg::broadcast(&detect::announcement(&event)));
            } else {
                trace!(
                    "detection ignored: label {} confidence {:.3}",
                    event.label_index, event.confidence
                );
            }
        }
    }

    fn log_usage(&self) {
        for (entry, count) in COMMAND_TABLE.iter().zip(self.usage.iter()) {
            if *count > 0 {
                debug!("usage {}: {count}", entry.literal);
            }
        }
        if self.unrecognized > 0 {
            debug!("usage <unrecognized>: {}", self.unrecognized);
        }
    }

    #[cfg(test)]
    fn usage_of(&self, literal: &str) -> u32 {
        COMMAND_TABLE
            .iter()
            .position(|e| e.literal == literal)
            .map(|i| self.usage[i])
            .unwrap_or(0)
    }
}

/// Spawn the router's thread.
pub fn spawn<B: OutputBank + 'static>(router: CommandRouter<B>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("router".into())
        .spawn(move || router.run())
        .expect("router thread spawn")
}
