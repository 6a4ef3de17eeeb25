//! Mock network and hardware adapters for integration tests.
//!
//! The socket mock delivers each test-side `send` as one receive, so
//! scenarios stay deterministic, and records everything the server
//! writes so tests can assert on the full wire history without a real
//! TCP stack.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use voxrelay::error::{HwError, NetError};
use voxrelay::ports::{ClientSocket, OutputBank, SocketAcceptor};

// ── Socket pair ───────────────────────────────────────────────

struct SocketShared {
    /// Test → server, one entry per `MockConn::send`.
    inbound: Mutex<VecDeque<Vec<u8>>>,
    /// Server → test, append-only wire history.
    outbound: Mutex<Vec<u8>>,
    peer_closed: AtomicBool,
    server_closed: AtomicBool,
    fail_sends: AtomicBool,
}

/// Server-side half, handed to the acceptor/session.
pub struct MockSocket {
    shared: Arc<SocketShared>,
}

/// Test-side half.
pub struct MockConn {
    shared: Arc<SocketShared>,
}

pub fn socket_pair() -> (MockSocket, MockConn) {
    let shared = Arc::new(SocketShared {
        inbound: Mutex::new(VecDeque::new()),
        outbound: Mutex::new(Vec::new()),
        peer_closed: AtomicBool::new(false),
        server_closed: AtomicBool::new(false),
        fail_sends: AtomicBool::new(false),
    });
    (
        MockSocket {
            shared: Arc::clone(&shared),
        },
        MockConn { shared },
    )
}

impl ClientSocket for MockSocket {
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut inbound = self.shared.inbound.lock().unwrap();
                if let Some(msg) = inbound.pop_front() {
                    let n = msg.len().min(buf.len());
                    buf[..n].copy_from_slice(&msg[..n]);
                    return Ok(n);
                }
            }
            if self.shared.peer_closed.load(Ordering::SeqCst) {
                return Err(NetError::PeerClosed);
            }
            if Instant::now() >= deadline {
                return Err(NetError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, NetError> {
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(NetError::Io);
        }
        self.shared.outbound.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self) {
        self.shared.server_closed.store(true, Ordering::SeqCst);
    }
}

#[allow(dead_code)]
impl MockConn {
    /// Queue one client message; arrives as a single receive.
    pub fn send(&self, text: &str) {
        self.shared
            .inbound
            .lock()
            .unwrap()
            .push_back(text.as_bytes().to_vec());
    }

    /// Everything the server has written so far.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.shared.outbound.lock().unwrap()).into_owned()
    }

    /// Poll until `needle` shows up in the wire history.
    pub fn wait_for(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.output().contains(needle) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    pub fn occurrences(&self, needle: &str) -> usize {
        self.output().matches(needle).count()
    }

    /// Simulate the client hanging up.
    pub fn hangup(&self) {
        self.shared.peer_closed.store(true, Ordering::SeqCst);
    }

    pub fn server_closed(&self) -> bool {
        self.shared.server_closed.load(Ordering::SeqCst)
    }

    /// Inject transient write failures on the server side.
    pub fn set_fail_sends(&self, fail: bool) {
        self.shared.fail_sends.store(fail, Ordering::SeqCst);
    }
}

// ── Listener pair ─────────────────────────────────────────────

struct ListenerShared {
    pending: Mutex<VecDeque<MockSocket>>,
}

/// Server-side acceptor port.
pub struct MockAcceptor {
    shared: Arc<ListenerShared>,
}

/// Test-side handle for opening connections.
#[derive(Clone)]
pub struct NetHandle {
    shared: Arc<ListenerShared>,
}

pub fn listener_pair() -> (MockAcceptor, NetHandle) {
    let shared = Arc::new(ListenerShared {
        pending: Mutex::new(VecDeque::new()),
    });
    (
        MockAcceptor {
            shared: Arc::clone(&shared),
        },
        NetHandle { shared },
    )
}

impl NetHandle {
    pub fn connect(&self) -> MockConn {
        let (socket, conn) = socket_pair();
        self.shared.pending.lock().unwrap().push_back(socket);
        conn
    }
}

impl SocketAcceptor for MockAcceptor {
    type Socket = MockSocket;

    fn accept_nonblocking(&mut self) -> Result<Option<MockSocket>, NetError> {
        Ok(self.shared.pending.lock().unwrap().pop_front())
    }
}

// ── Output bank ───────────────────────────────────────────────

#[derive(Default)]
struct BankState {
    states: [bool; voxrelay::config::NUM_OUTPUTS],
    writes: Vec<(usize, bool)>,
    fail_channel: Option<usize>,
}

/// Shareable recording bank: the test keeps a clone while the router
/// owns the other.
#[derive(Clone, Default)]
pub struct SharedBank {
    state: Arc<Mutex<BankState>>,
}

#[allow(dead_code)]
impl SharedBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> [bool; voxrelay::config::NUM_OUTPUTS] {
        self.state.lock().unwrap().states
    }

    pub fn writes(&self) -> Vec<(usize, bool)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn set_fail_channel(&self, channel: Option<usize>) {
        self.state.lock().unwrap().fail_channel = channel;
    }
}

impl OutputBank for SharedBank {
    fn write_channel(&mut self, index: usize, state: bool) -> Result<(), HwError> {
        let mut bank = self.state.lock().unwrap();
        if bank.fail_channel == Some(index) {
            return Err(HwError::WriteFailed {
                channel: index as u8,
            });
        }
        let Some(slot) = bank.states.get_mut(index) else {
            return Err(HwError::InvalidChannel {
                channel: index as u8,
            });
        };
        *slot = state;
        bank.writes.push((index, state));
        Ok(())
    }
}
