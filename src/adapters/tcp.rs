//! TCP implementation of the socket ports.
//!
//! The listener runs nonblocking so the acceptor thread can interleave
//! admission, cleanup, and the status line. Client streams use per-call
//! read timeouts; the timeout value is cached so the setsockopt only
//! happens when it changes.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{debug, info};

use crate::error::NetError;
use crate::ports::{ClientSocket, SocketAcceptor};

fn map_io(e: &std::io::Error) -> NetError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => NetError::Timeout,
        ErrorKind::UnexpectedEof => NetError::PeerClosed,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            NetError::ConnectionReset
        }
        ErrorKind::ConnectionRefused | ErrorKind::PermissionDenied => NetError::Refused,
        ErrorKind::Interrupted => NetError::Interrupted,
        ErrorKind::AddrInUse => NetError::AddrInUse,
        ErrorKind::OutOfMemory => NetError::BufferExhausted,
        _ => NetError::Io,
    }
}

// ── Acceptor ─────────────────────────────────────────────────

pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(addr: &str) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).map_err(|e| map_io(&e))?;
        listener.set_nonblocking(true).map_err(|e| map_io(&e))?;
        info!("listening on {addr}");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

impl SocketAcceptor for TcpAcceptor {
    type Socket = TcpClientSocket;

    fn accept_nonblocking(&mut self) -> Result<Option<Self::Socket>, NetError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!("connection from {peer}");
                Ok(Some(TcpClientSocket::new(stream, peer)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(map_io(&e)),
        }
    }
}

// ── Client socket ────────────────────────────────────────────

pub struct TcpClientSocket {
    stream: TcpStream,
    peer: SocketAddr,
    read_timeout: Option<Duration>,
}

impl TcpClientSocket {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            read_timeout: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl ClientSocket for TcpClientSocket {
    fn recv_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, NetError> {
        if self.read_timeout != Some(timeout) {
            self.stream
                .set_read_timeout(Some(timeout))
                .map_err(|e| map_io(&e))?;
            self.read_timeout = Some(timeout);
        }
        match self.stream.read(buf) {
            Ok(0) => Err(NetError::PeerClosed),
            Ok(n) => Ok(n),
            Err(e) => Err(map_io(&e)),
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, NetError> {
        self.stream.write(buf).map_err(|e| map_io(&e))
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
