//! Mock transport for deterministic testing of session engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. This lets you test command formatting,
//! terminator scanning, and notification routing without real hardware.
//!
//! # Example
//!
//! ```
//! use atlink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // Pre-load: when the engine sends this command, feed back this reply.
//! mock.expect(b"AT\r\n", b"\r\nOK\r\n");
//! // Unsolicited bytes can be injected at any point in the script.
//! mock.inject(b"\r\n+IPCLOSE: 0,1\r\n");
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use atlink_core::error::{Error, Result};
use atlink_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be written.
    request: Vec<u8>,
    /// The bytes to make readable once the matching request arrives.
    response: Vec<u8>,
}

/// A mock [`Transport`] for testing session engines without hardware.
///
/// Expectations are consumed in order. Each `write_all` call is matched
/// against the next expectation; on a match, the expectation's response
/// bytes are appended to the readable stream. Payload writes (the bytes
/// after a send prompt) are expectations like any command line.
///
/// [`inject`](MockTransport::inject) appends bytes to the readable stream
/// directly, modelling unsolicited notifications arriving between
/// exchanges.
///
/// If a write matches no expectation or the queue is exhausted, an error is
/// returned.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Bytes currently readable by the engine.
    readable: VecDeque<u8>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes written through this transport.
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            readable: VecDeque::new(),
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// When `write_all` is called with data matching `request`, `response`
    /// becomes readable.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Make `bytes` readable immediately, ahead of any scripted responses
    /// still pending. Models an unsolicited notification.
    pub fn inject(&mut self, bytes: &[u8]) {
        self.readable.extend(bytes.iter().copied());
    }

    /// Return a reference to all data written through this transport.
    ///
    /// Each element is the byte slice from one `write_all` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent reads and writes return
    /// [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn available(&mut self) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        Ok(self.readable.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        Ok(self.readable.pop_front())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        let mut n = 0;
        while n < buf.len() {
            match self.readable.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        // Record what was written.
        self.sent_log.push(data.to_vec());

        // Match against the next expectation.
        if let Some(expectation) = self.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Protocol(format!(
                    "unexpected write: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                )));
            }
            self.readable.extend(expectation.response.iter().copied());
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "no more expectations in mock transport, got {:?}",
                String::from_utf8_lossy(data)
            )))
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Shared handle to a [`MockTransport`].
///
/// A session takes ownership of its boxed transport, which would otherwise
/// cut the test off from the script. Clone a handle, box one clone into
/// the session, and keep the other for scripting further expectations,
/// injecting notifications mid-test, and inspecting what was sent.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    inner: Rc<RefCell<MockTransport>>,
}

impl MockHandle {
    pub fn new() -> Self {
        MockHandle {
            inner: Rc::new(RefCell::new(MockTransport::new())),
        }
    }

    /// See [`MockTransport::expect`].
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.inner.borrow_mut().expect(request, response);
    }

    /// See [`MockTransport::inject`].
    pub fn inject(&self, bytes: &[u8]) {
        self.inner.borrow_mut().inject(bytes);
    }

    /// Snapshot of all data written so far, one element per `write_all`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.inner.borrow().sent_data().to_vec()
    }

    pub fn remaining_expectations(&self) -> usize {
        self.inner.borrow().remaining_expectations()
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.borrow_mut().set_connected(connected);
    }
}

impl Transport for MockHandle {
    fn available(&mut self) -> Result<usize> {
        self.inner.borrow_mut().available()
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.inner.borrow_mut().read_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.borrow_mut().read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.inner.borrow_mut().write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.borrow_mut().flush()
    }

    fn is_connected(&self) -> bool {
        self.inner.borrow().is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_write_then_read() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"\r\nOK\r\n");

        mock.write_all(b"AT\r\n").unwrap();

        assert_eq!(mock.available().unwrap(), 6);
        let mut buf = [0u8; 16];
        let n = mock.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\r\nOK\r\n");
    }

    #[test]
    fn tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect(b"ATE0\r\n", b"\r\nOK\r\n");
        mock.expect(b"AT+CSQ\r\n", b"\r\n+CSQ: 17,99\r\n\r\nOK\r\n");

        mock.write_all(b"ATE0\r\n").unwrap();
        mock.write_all(b"AT+CSQ\r\n").unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_data()[0], b"ATE0\r\n");
        assert_eq!(mock.sent_data()[1], b"AT+CSQ\r\n");
    }

    #[test]
    fn wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"\r\nOK\r\n");

        let result = mock.write_all(b"AT+NOPE\r\n");
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[test]
    fn no_expectations_errors() {
        let mut mock = MockTransport::new();

        let result = mock.write_all(b"AT\r\n");
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[test]
    fn injected_bytes_read_before_scripted_response() {
        let mut mock = MockTransport::new();
        mock.inject(b"\r\n+RECEIVE:1,40\r\n");
        mock.expect(b"AT\r\n", b"\r\nOK\r\n");

        mock.write_all(b"AT\r\n").unwrap();

        let mut buf = [0u8; 64];
        let n = mock.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"\r\n+RECEIVE:1,40\r\n\r\nOK\r\n");
    }

    #[test]
    fn read_byte_drains_incrementally() {
        let mut mock = MockTransport::new();
        mock.inject(b"OK");

        assert_eq!(mock.read_byte().unwrap(), Some(b'O'));
        assert_eq!(mock.read_byte().unwrap(), Some(b'K'));
        assert_eq!(mock.read_byte().unwrap(), None);
    }

    #[test]
    fn disconnected_operations_fail() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());

        assert!(matches!(
            mock.write_all(b"AT\r\n").unwrap_err(),
            Error::NotConnected
        ));
        assert!(matches!(mock.read_byte().unwrap_err(), Error::NotConnected));
    }

    #[test]
    fn remaining_expectations_counts_down() {
        let mut mock = MockTransport::new();
        mock.expect(b"AT\r\n", b"\r\nOK\r\n");
        mock.expect(b"ATE0\r\n", b"\r\nOK\r\n");
        assert_eq!(mock.remaining_expectations(), 2);

        mock.write_all(b"AT\r\n").unwrap();
        assert_eq!(mock.remaining_expectations(), 1);

        mock.write_all(b"ATE0\r\n").unwrap();
        assert_eq!(mock.remaining_expectations(), 0);
    }
}
