//! Transport trait for modem communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a radio
//! module. Implementations exist for serial ports and TCP sockets (in the
//! `atlink-transport` crate), and for mock transports used in tests
//! (`atlink-test-harness`).
//!
//! The session engine operates on a `Transport` rather than directly on a
//! serial port, enabling both real hardware control and deterministic unit
//! testing.
//!
//! The contract is deliberately byte-oriented and non-blocking: the command
//! channel owns all waiting, as bounded polling loops with a cooperative
//! yield hook. A `Transport` never blocks beyond the latency of a single
//! read or write syscall.

use crate::error::Result;

/// Synchronous byte-level transport to a modem.
pub trait Transport {
    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> Result<usize>;

    /// Read a single byte if one is available, without blocking.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Read up to `buf.len()` already-available bytes into `buf`.
    ///
    /// Returns the number of bytes read, which may be zero.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `data` to the transport's output buffer.
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flush buffered output to the wire.
    fn flush(&mut self) -> Result<()>;

    /// Check whether the transport is currently usable.
    fn is_connected(&self) -> bool;
}
