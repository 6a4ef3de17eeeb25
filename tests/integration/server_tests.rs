//! Full-stack server scenarios over mock sockets.
//!
//! Each test boots the real acceptor/router/session threads against the
//! in-memory network from `mock_net` and asserts on the wire history,
//! the registry, and the recorded hardware writes.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::mock_net::{MockConn, NetHandle, SharedBank, listener_pair};

use voxrelay::acceptor::{self, ConnectionAcceptor};
use voxrelay::actuator::ActuatorController;
use voxrelay::channel::{self, Receiver, Sender};
use voxrelay::config::{
    CMD_CHANNEL_DEPTH, DETECT_CHANNEL_DEPTH, MAX_CLIENTS, RESPONSE_RING_CAP, SystemConfig,
};
use voxrelay::detect::DetectionEvent;
use voxrelay::faults::FaultMonitor;
use voxrelay::message::CommandMsg;
use voxrelay::registry::SessionRegistry;
use voxrelay::router::{self, CommandRouter};

const WAIT: Duration = Duration::from_secs(2);

fn test_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.socket_recv_timeout_ms = 10;
    config.router_recv_timeout_ms = 10;
    config.accept_poll_ms = 2;
    config.maintenance_interval_ms = 30;
    config.client_timeout_ms = 60_000;
    config
}

struct TestServer {
    net: NetHandle,
    registry: Arc<SessionRegistry>,
    faults: Arc<FaultMonitor>,
    detect_tx: Sender<DetectionEvent>,
    bank: SharedBank,
    accept_handle: Option<JoinHandle<()>>,
    router_handle: Option<JoinHandle<()>>,
    /// Held when the router is suppressed so the command channel stays
    /// open and sessions see back-pressure instead of a closed link.
    _cmd_rx: Option<Receiver<CommandMsg>>,
}

fn start(config: SystemConfig, with_router: bool) -> TestServer {
    config.validate().expect("test config");
    let config = Arc::new(config);
    let faults = Arc::new(FaultMonitor::new(&config));
    let registry = Arc::new(SessionRegistry::new(&config));
    let bank = SharedBank::new();

    let (cmd_tx, cmd_rx) = channel::bounded(CMD_CHANNEL_DEPTH);
    let (detect_tx, detect_rx) = channel::bounded(DETECT_CHANNEL_DEPTH);

    let (router_handle, cmd_rx) = if with_router {
        let router = CommandRouter::new(
            cmd_rx,
            detect_rx,
            Arc::clone(&registry),
            ActuatorController::new(bank.clone()),
            Arc::clone(&faults),
            &config,
        );
        (Some(router::spawn(router)), None)
    } else {
        drop(detect_rx);
        (None, Some(cmd_rx))
    };

    let (listener, net) = listener_pair();
    let accept_handle = acceptor::spawn(ConnectionAcceptor::new(
        listener,
        Arc::clone(&registry),
        cmd_tx,
        Arc::clone(&faults),
        Arc::clone(&config),
    ));

    TestServer {
        net,
        registry,
        faults,
        detect_tx,
        bank,
        accept_handle: Some(accept_handle),
        router_handle,
        _cmd_rx: cmd_rx,
    }
}

impl TestServer {
    /// Open a connection and wait for the welcome banner.
    fn connect(&self) -> MockConn {
        let conn = self.net.connect();
        assert!(conn.wait_for("Accesado\n", WAIT), "banner not received");
        conn
    }

    fn wait_active_count(&self, expected: usize) {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.registry.active_count() == expected {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!(
            "active count stuck at {} (wanted {expected})",
            self.registry.active_count()
        );
    }

    fn shutdown(mut self) {
        self.faults.halt("test shutdown");
        if let Some(h) = self.accept_handle.take() {
            let _ = h.join();
        }
        if let Some(h) = self.router_handle.take() {
            let _ = h.join();
        }
    }
}

/// Send one command and wait for its reply in the wire history.
fn roundtrip(conn: &MockConn, command: &str, expect: &str) {
    conn.send(command);
    assert!(
        conn.wait_for(expect, WAIT),
        "no {expect:?} after {command:?}; wire so far: {:?}",
        conn.output()
    );
}

// ── Round trips ───────────────────────────────────────────────

#[test]
fn banner_then_command_round_trip() {
    let server = start(test_config(), true);
    let conn = server.connect();

    roundtrip(&conn, "1_ON\n", "SALIDA 1: ON\n");
    roundtrip(&conn, "STATUS\n", "S1:ON S2:OFF S3:OFF S4:OFF\n");

    assert_eq!(server.bank.states(), [true, false, false, false]);
    server.shutdown();
}

#[test]
fn all_on_then_single_off_scenario() {
    let server = start(test_config(), true);
    let conn = server.connect();

    roundtrip(&conn, "ALL_ON\n", "TODAS LAS SALIDAS: ON\n");
    roundtrip(&conn, "3_OFF\n", "SALIDA 3: OFF\n");
    roundtrip(&conn, "STATUS\n", "S1:ON S2:ON S3:OFF S4:ON\n");

    assert_eq!(server.bank.states(), [true, true, false, true]);
    server.shutdown();
}

#[test]
fn unrecognized_command_leaves_outputs_untouched() {
    let server = start(test_config(), true);
    let conn = server.connect();

    roundtrip(&conn, "FOO\n", "COMANDO NO RECONOCIDO\n");

    assert!(server.bank.writes().is_empty(), "no hardware writes");
    server.shutdown();
}

#[test]
fn leading_whitespace_and_crlf_are_accepted() {
    let server = start(test_config(), true);
    let conn = server.connect();

    roundtrip(&conn, "  2_ON\r\n", "SALIDA 2: ON\n");
    assert_eq!(server.bank.states(), [false, true, false, false]);
    server.shutdown();
}

#[test]
fn hardware_failure_is_reported_to_the_client() {
    let server = start(test_config(), true);
    server.bank.set_fail_channel(Some(1));
    let conn = server.connect();

    roundtrip(&conn, "2_ON\n", "ERROR EN SALIDA 2\n");
    roundtrip(&conn, "STATUS\n", "S1:OFF S2:OFF S3:OFF S4:OFF\n");
    server.shutdown();
}

// ── Admission control ─────────────────────────────────────────

#[test]
fn connection_past_capacity_is_rejected() {
    let server = start(test_config(), true);
    let conns: Vec<MockConn> = (0..MAX_CLIENTS).map(|_| server.connect()).collect();
    assert_eq!(server.registry.active_count(), MAX_CLIENTS);

    let extra = server.net.connect();
    assert!(
        extra.wait_for("Acceso_DENEGADO\n", WAIT),
        "rejection text missing"
    );
    let deadline = Instant::now() + WAIT;
    while !extra.server_closed() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(extra.server_closed(), "rejected socket must be closed");
    assert!(!extra.output().contains("Accesado"));

    // No session was created for it.
    assert_eq!(server.registry.active_count(), MAX_CLIENTS);
    assert_eq!(server.registry.total_served() as usize, MAX_CLIENTS);

    drop(conns);
    server.shutdown();
}

#[test]
fn reclaimed_slot_admits_a_new_client() {
    let server = start(test_config(), true);
    let conns: Vec<MockConn> = (0..MAX_CLIENTS).map(|_| server.connect()).collect();

    conns[0].hangup();
    server.wait_active_count(MAX_CLIENTS - 1);

    // Wait for the cleanup pass to reclaim the slot, then reconnect.
    let deadline = Instant::now() + WAIT;
    let replacement = loop {
        let conn = server.net.connect();
        if conn.wait_for("Accesado\n", Duration::from_millis(200)) {
            break conn;
        }
        assert!(Instant::now() < deadline, "slot never became available");
    };
    assert_eq!(server.registry.active_count(), MAX_CLIENTS);

    drop(replacement);
    server.shutdown();
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn idle_session_times_out_and_is_reclaimed() {
    let mut config = test_config();
    config.client_timeout_ms = 80;
    let server = start(config, true);

    let conn = server.connect();
    server.wait_active_count(0);

    // Slot must be reusable after the next cleanup pass.
    let deadline = Instant::now() + WAIT;
    let replacement = loop {
        let candidate = server.net.connect();
        if candidate.wait_for("Accesado\n", Duration::from_millis(200)) {
            break candidate;
        }
        assert!(Instant::now() < deadline, "slot was never reclaimed");
    };
    assert_eq!(server.registry.active_count(), 1);

    drop((conn, replacement));
    server.shutdown();
}

#[test]
fn peer_close_tears_the_session_down() {
    let server = start(test_config(), true);
    let conn = server.connect();
    assert_eq!(server.registry.active_count(), 1);

    conn.hangup();
    server.wait_active_count(0);
    server.shutdown();
}

// ── Detection events ──────────────────────────────────────────

#[test]
fn firing_detection_broadcasts_to_every_session() {
    let server = start(test_config(), true);
    let a = server.connect();
    let b = server.connect();

    server
        .detect_tx
        .try_send(DetectionEvent {
            label_index: 1,
            confidence: 0.99,
        })
        .unwrap();

    assert!(a.wait_for("COMANDO DETECTADO: activar", WAIT));
    assert!(b.wait_for("COMANDO DETECTADO: activar", WAIT));
    server.shutdown();
}

#[test]
fn non_firing_detection_stays_silent() {
    let server = start(test_config(), true);
    let conn = server.connect();

    server
        .detect_tx
        .try_send(DetectionEvent {
            label_index: 0,
            confidence: 0.99,
        })
        .unwrap();
    server
        .detect_tx
        .try_send(DetectionEvent {
            label_index: 1,
            confidence: 0.50,
        })
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(conn.occurrences("COMANDO DETECTADO"), 0);
    server.shutdown();
}

// ── Back-pressure ─────────────────────────────────────────────

#[test]
fn saturated_router_channel_answers_busy() {
    // No router: the command channel fills up after CMD_CHANNEL_DEPTH
    // commands and the session must synthesize the busy reply itself.
    let server = start(test_config(), false);
    let conn = server.connect();

    for _ in 0..CMD_CHANNEL_DEPTH {
        conn.send("STATUS\n");
        // Pace so each message is forwarded individually.
        std::thread::sleep(Duration::from_millis(15));
    }
    conn.send("STATUS\n");
    assert!(
        conn.wait_for("SERVIDOR OCUPADO\n", WAIT),
        "busy reply missing; wire: {:?}",
        conn.output()
    );
    server.shutdown();
}

#[test]
fn response_ring_overflow_is_bounded_loss() {
    let server = start(test_config(), true);
    let conn = server.connect();
    conn.set_fail_sends(true);

    // More broadcasts than the ring can hold while the socket is down.
    let flood = RESPONSE_RING_CAP + 4;
    for _ in 0..flood {
        server
            .detect_tx
            .send(
                DetectionEvent {
                    label_index: 1,
                    confidence: 0.99,
                },
                WAIT,
            )
            .unwrap();
    }
    // Let the session drain the channel into the (stalled) ring.
    std::thread::sleep(Duration::from_millis(300));

    conn.set_fail_sends(false);
    let deadline = Instant::now() + WAIT;
    while conn.occurrences("COMANDO DETECTADO") < RESPONSE_RING_CAP
        && Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(100));

    let delivered = conn.occurrences("COMANDO DETECTADO");
    assert_eq!(
        delivered, RESPONSE_RING_CAP,
        "ring must cap undelivered responses at its capacity"
    );
    server.shutdown();
}
