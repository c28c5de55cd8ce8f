//! TCP transport for serial-over-network bridges.
//!
//! This module provides [`TcpTransport`], which implements the
//! [`Transport`] trait over a TCP connection. Useful when the modem's UART
//! is exposed through a bridge such as ser2net, or when exercising the
//! engine against a scripted endpoint on the bench.
//!
//! The stream runs in non-blocking mode to honor the engine's polling
//! contract; `available` is approximated with a bounded `peek`.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use atlink_core::error::{Error, Result};
use atlink_core::transport::Transport;

/// TCP transport for modem communication.
pub struct TcpTransport {
    stream: TcpStream,
    /// Peer address for logging/debugging
    peer: String,
    connected: bool,
    peek_buf: Box<[u8]>,
}

impl TcpTransport {
    /// Connect to `addr` (e.g., "bench-bridge:4001").
    pub fn connect<A: ToSocketAddrs + std::fmt::Display>(addr: A) -> Result<Self> {
        tracing::debug!(peer = %addr, "Connecting TCP transport");

        let stream = TcpStream::connect(&addr)
            .map_err(|e| Error::Transport(format!("failed to connect to {}: {}", addr, e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| Error::Transport(format!("failed to set TCP_NODELAY: {}", e)))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| Error::Transport(format!("failed to set non-blocking: {}", e)))?;

        tracing::info!(peer = %addr, "TCP transport connected");

        Ok(Self {
            stream,
            peer: addr.to_string(),
            connected: true,
            peek_buf: vec![0u8; 4096].into_boxed_slice(),
        })
    }

    /// The peer address this transport is connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    fn map_io(&mut self, e: std::io::Error) -> Error {
        match e.kind() {
            ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::ConnectionReset => {
                self.connected = false;
                Error::ConnectionLost
            }
            _ => Error::Io(e),
        }
    }
}

impl Transport for TcpTransport {
    /// Readable byte count, capped at the peek window (4 KiB).
    fn available(&mut self) -> Result<usize> {
        let Self {
            stream, peek_buf, ..
        } = self;
        match stream.peek(peek_buf) {
            Ok(0) => {
                // Orderly shutdown by the peer.
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(self.map_io(e)),
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(0) => {
                self.connected = false;
                Ok(None)
            }
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(self.map_io(e)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(self.map_io(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            match self.stream.write(&data[offset..]) {
                Ok(0) => {
                    self.connected = false;
                    return Err(Error::ConnectionLost);
                }
                Ok(n) => offset += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => std::thread::yield_now(),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.map_io(e)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.stream.flush() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(self.map_io(e)),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
