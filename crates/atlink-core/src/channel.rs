//! The AT command channel: line formatting, terminator scanning, and
//! asynchronous-notification interception.
//!
//! Command replies and unsolicited notifications (URCs) share one byte
//! stream. [`CommandChannel::await_response`] is the single scanning loop
//! that separates them without desynchronizing stream position: every
//! inbound byte is appended to an accumulation buffer, the buffer's tail is
//! tested against up to five prioritized terminator literals, and -- when no
//! terminator matches -- against the dialect's URC markers. A matched URC is
//! consumed inline (including any fixed-format payload) and routed through
//! the [`SocketRegistry`], after which scanning for the original terminators
//! resumes without ending the wait.
//!
//! # Terminator matching
//!
//! Matching is tail-equality over the whole accumulated buffer, not per-line
//! tokenizing. Terminators therefore need enough leading context (usually a
//! preceding line break) to avoid matching inside an unrelated larger token:
//! `b"OK\r\n"` will not match a buffer ending in `OKAY`, but a bare `b"K"`
//! would fire on almost anything.
//!
//! Only one wait may be outstanding at a time; reentrant calls are undefined
//! by contract (the session enforces this by funnelling all traffic through
//! one control thread).

use std::time::{Duration, Instant};

use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use crate::error::Result;
use crate::registry::SocketRegistry;
use crate::transport::Transport;

/// Cooperative-yield hook invoked once per poll iteration.
///
/// A host scheduler can interleave other work here; the default no-op
/// degrades the wait to plain busy-polling.
pub type YieldHook = fn();

/// The default yield hook: do nothing.
pub fn noop_yield() {}

/// One fragment of a command line.
///
/// Commands are assembled from an ordered list of heterogeneous fragments
/// passed through a single formatter, rather than ad hoc concatenation at
/// each call site.
#[derive(Debug, Clone, Copy)]
pub enum Fragment<'a> {
    Text(&'a str),
    Uint(u64),
}

impl<'a> From<&'a str> for Fragment<'a> {
    fn from(s: &'a str) -> Self {
        Fragment::Text(s)
    }
}

impl From<u64> for Fragment<'_> {
    fn from(v: u64) -> Self {
        Fragment::Uint(v)
    }
}

impl From<u16> for Fragment<'_> {
    fn from(v: u16) -> Self {
        Fragment::Uint(v as u64)
    }
}

impl From<u8> for Fragment<'_> {
    fn from(v: u8) -> Self {
        Fragment::Uint(v as u64)
    }
}

/// Result of a terminator wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A terminator matched; the index is 1-based in priority order.
    Matched(usize),
    /// No terminator (and no notification) matched within the budget.
    Timeout,
}

impl WaitOutcome {
    /// True if the first (success) terminator matched.
    pub fn is_success(self) -> bool {
        self == WaitOutcome::Matched(1)
    }
}

/// Dialect hook for intercepting unsolicited notifications mid-wait.
///
/// `try_consume` is called after each appended byte that did not complete a
/// terminator. Implementations inspect the accumulation buffer's tail; on a
/// match they perform the synchronous sub-read of the event's fixed-format
/// payload through `io`, route it via `registry`, and return `Ok(true)` so
/// the scanner clears its buffer and keeps waiting. A partial consume (a
/// marker that turned out to be an ordinary reply header) may push the
/// already-read text back onto `buf` and return `Ok(false)`.
pub trait UrcHandler {
    fn try_consume(
        &self,
        buf: &mut Vec<u8>,
        io: &mut SubReader<'_>,
        registry: &mut SocketRegistry,
    ) -> Result<bool>;
}

/// A handler for dialects with no asynchronous notifications.
pub struct NoUrc;

impl UrcHandler for NoUrc {
    fn try_consume(
        &self,
        _buf: &mut Vec<u8>,
        _io: &mut SubReader<'_>,
        _registry: &mut SocketRegistry,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Upper bound on a single sub-read field. Header fields are a handful of
/// digits; anything longer means the stream is not what the caller thinks
/// it is, and collecting more of it helps nobody.
pub const MAX_FIELD_LEN: usize = 512;

/// Bounded polling reader for fixed-format payloads that follow a matched
/// response header or notification marker.
pub struct SubReader<'a> {
    transport: &'a mut dyn Transport,
    yield_hook: YieldHook,
}

impl<'a> SubReader<'a> {
    pub fn new(transport: &'a mut dyn Transport, yield_hook: YieldHook) -> Self {
        SubReader {
            transport,
            yield_hook,
        }
    }

    /// Poll for one byte until `timeout` elapses.
    pub fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(b) = self.transport.read_byte()? {
                return Ok(Some(b));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            (self.yield_hook)();
        }
    }

    /// Collect bytes until `delim` (exclusive), returning them as trimmed
    /// text. Stops early on timeout, or at [`MAX_FIELD_LEN`] bytes, with
    /// whatever arrived.
    pub fn read_until(&mut self, delim: u8, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut field = Vec::new();
        loop {
            match self.transport.read_byte()? {
                Some(b) if b == delim => break,
                Some(b) => {
                    field.push(b);
                    if field.len() >= MAX_FIELD_LEN || Instant::now() >= deadline {
                        break;
                    }
                }
                None => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    (self.yield_hook)();
                }
            }
        }
        Ok(String::from_utf8_lossy(&field).trim().to_string())
    }

    /// Read a numeric field terminated by `delim`; unparsable text is 0.
    pub fn read_uint_until(&mut self, delim: u8, timeout: Duration) -> Result<usize> {
        let field = self.read_until(delim, timeout)?;
        Ok(field.parse().unwrap_or(0))
    }

    /// Discard bytes up to and including `delim`.
    pub fn skip_until(&mut self, delim: u8, timeout: Duration) -> Result<()> {
        self.read_until(delim, timeout)?;
        Ok(())
    }
}

/// Formats and sends command lines; scans replies under a timeout.
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    line_ending: &'static str,
    yield_hook: YieldHook,
    buf: Vec<u8>,
}

/// Field timeout for sub-reads of a notification's fixed-format payload.
const SUBREAD_TIMEOUT: Duration = Duration::from_secs(1);

impl CommandChannel {
    pub fn new(
        transport: Box<dyn Transport>,
        line_ending: &'static str,
        yield_hook: YieldHook,
    ) -> Self {
        CommandChannel {
            transport,
            line_ending,
            yield_hook,
            buf: Vec::with_capacity(64),
        }
    }

    /// Format and send one command line: `"AT"` + fragments + line ending.
    pub fn send_command(&mut self, fragments: &[Fragment<'_>]) -> Result<()> {
        let mut line = BytesMut::with_capacity(32);
        line.put_slice(b"AT");
        for frag in fragments {
            match frag {
                Fragment::Text(s) => line.put_slice(s.as_bytes()),
                Fragment::Uint(v) => line.put_slice(v.to_string().as_bytes()),
            }
        }
        line.put_slice(self.line_ending.as_bytes());
        trace!(cmd = %String::from_utf8_lossy(&line).trim(), "sending command");
        self.transport.write_all(&line)?;
        self.transport.flush()
    }

    /// Write raw bytes (payload data, escape sequences) without framing.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write_all(data)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.transport.flush()
    }

    /// Bytes currently readable from the transport.
    pub fn available(&mut self) -> Result<usize> {
        self.transport.available()
    }

    /// A bounded reader for payload bytes that follow a matched header.
    pub fn sub_reader(&mut self) -> SubReader<'_> {
        SubReader::new(self.transport.as_mut(), self.yield_hook)
    }

    /// Scan inbound bytes for one of up to five terminators, intercepting
    /// dialect notifications along the way.
    ///
    /// Returns [`WaitOutcome::Matched`] with the 1-based index of the first
    /// terminator whose literal equals the accumulation buffer's tail, or
    /// [`WaitOutcome::Timeout`] if the budget elapses first. Zero bytes on
    /// the wire are noise and are discarded.
    ///
    /// If `captured` is given, it receives the accumulated text (lossy
    /// UTF-8, trimmed) on both outcomes: on a match it includes the
    /// terminator itself, mirroring what arrived on the wire.
    pub fn await_response(
        &mut self,
        timeout: Duration,
        terminators: &[&[u8]],
        urc: &dyn UrcHandler,
        registry: &mut SocketRegistry,
        captured: Option<&mut String>,
    ) -> Result<WaitOutcome> {
        debug_assert!(terminators.len() <= 5, "at most five terminators");

        let Self {
            transport,
            yield_hook,
            buf,
            ..
        } = self;
        buf.clear();

        let deadline = Instant::now() + timeout;
        let outcome = 'scan: loop {
            while let Some(byte) = transport.read_byte()? {
                if byte == 0 {
                    continue;
                }
                buf.push(byte);

                for (i, term) in terminators.iter().enumerate() {
                    if buf.ends_with(term) {
                        break 'scan WaitOutcome::Matched(i + 1);
                    }
                }

                let mut io = SubReader::new(transport.as_mut(), *yield_hook);
                if urc.try_consume(buf, &mut io, registry)? {
                    buf.clear();
                }
            }
            if Instant::now() >= deadline {
                break WaitOutcome::Timeout;
            }
            (yield_hook)();
        };

        if let Some(out) = captured {
            *out = String::from_utf8_lossy(buf).trim().to_string();
        }
        if outcome == WaitOutcome::Timeout && !buf.is_empty() {
            debug!(
                text = %String::from_utf8_lossy(buf).trim(),
                "unhandled response text at timeout"
            );
        }
        buf.clear();
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Instant;

    use crate::error::Result;

    /// Minimal scripted transport for scanner tests. The full-featured mock
    /// lives in `atlink-test-harness`; this one avoids a dev-dependency
    /// cycle.
    struct TestPort {
        inbound: VecDeque<u8>,
        sent: Rc<RefCell<Vec<u8>>>,
    }

    impl TestPort {
        fn with_inbound(data: &[u8]) -> Self {
            TestPort {
                inbound: data.iter().copied().collect(),
                sent: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Transport for TestPort {
        fn available(&mut self) -> Result<usize> {
            Ok(self.inbound.len())
        }

        fn read_byte(&mut self) -> Result<Option<u8>> {
            Ok(self.inbound.pop_front())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.inbound.pop_front() {
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
            self.sent.borrow_mut().extend_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn channel(data: &[u8]) -> CommandChannel {
        CommandChannel::new(Box::new(TestPort::with_inbound(data)), "\r\n", noop_yield)
    }

    const OK: &[u8] = b"OK\r\n";
    const ERR: &[u8] = b"ERROR\r\n";

    #[test]
    fn send_command_formats_prefix_fragments_and_ending() {
        let port = TestPort::with_inbound(b"");
        let sent = Rc::clone(&port.sent);
        let mut chan = CommandChannel::new(Box::new(port), "\r\n", noop_yield);

        chan.send_command(&["+CIPSEND=".into(), 3u8.into(), ",".into(), 128u64.into()])
            .unwrap();

        assert_eq!(sent.borrow().as_slice(), b"AT+CIPSEND=3,128\r\n");
    }

    #[test]
    fn send_command_honors_dialect_line_ending() {
        let port = TestPort::with_inbound(b"");
        let sent = Rc::clone(&port.sent);
        let mut chan = CommandChannel::new(Box::new(port), "\r", noop_yield);

        chan.send_command(&["CN".into()]).unwrap();

        assert_eq!(sent.borrow().as_slice(), b"ATCN\r");
    }

    #[test]
    fn matches_first_terminator() {
        let mut chan = channel(b"\r\nOK\r\n");
        let mut reg = SocketRegistry::new(1, 8);
        let outcome = chan
            .await_response(Duration::from_millis(50), &[OK, ERR], &NoUrc, &mut reg, None)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Matched(1));
        assert!(outcome.is_success());
    }

    #[test]
    fn matches_second_terminator() {
        let mut chan = channel(b"\r\nERROR\r\n");
        let mut reg = SocketRegistry::new(1, 8);
        let outcome = chan
            .await_response(Duration::from_millis(50), &[OK, ERR], &NoUrc, &mut reg, None)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Matched(2));
        assert!(!outcome.is_success());
    }

    #[test]
    fn priority_order_short_circuits() {
        // "OK" (as a bare literal) completes before the longer "OKAY\r\n"
        // alternative would; the scanner must return index 1 and stop.
        let mut chan = channel(b"OKAY\r\n");
        let mut reg = SocketRegistry::new(1, 8);
        let outcome = chan
            .await_response(
                Duration::from_millis(50),
                &[b"OK".as_slice(), b"OKAY\r\n".as_slice()],
                &NoUrc,
                &mut reg,
                None,
            )
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Matched(1));
    }

    #[test]
    fn tail_match_is_exact_suffix() {
        // Matching is per-byte over the accumulation, so a terminator that
        // is a prefix of the stream fires as soon as it completes. Suffix
        // precision therefore only holds for terminators with trailing
        // context: "OKAY\r\n" satisfies "OK\r\n" at no point.
        let mut chan = channel(b"OKAY\r\n");
        let mut reg = SocketRegistry::new(1, 8);
        let outcome = chan
            .await_response(Duration::from_millis(20), &[OK], &NoUrc, &mut reg, None)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Timeout);

        // Nor does the longer terminator ever complete on the short stream.
        let mut chan = channel(b"OK\r\n");
        let outcome = chan
            .await_response(
                Duration::from_millis(20),
                &[b"OKAY".as_slice()],
                &NoUrc,
                &mut reg,
                None,
            )
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Timeout);
    }

    #[test]
    fn zero_bytes_are_discarded() {
        // NUL noise interleaved in the terminator must not break matching.
        let mut chan = channel(b"\x00O\x00K\r\n\x00");
        let mut reg = SocketRegistry::new(1, 8);
        let outcome = chan
            .await_response(Duration::from_millis(50), &[OK], &NoUrc, &mut reg, None)
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Matched(1));
    }

    #[test]
    fn timeout_returns_within_budget() {
        let mut chan = channel(b"");
        let mut reg = SocketRegistry::new(1, 8);
        let budget = Duration::from_millis(40);
        let start = Instant::now();
        let outcome = chan
            .await_response(budget, &[OK], &NoUrc, &mut reg, None)
            .unwrap();
        let elapsed = start.elapsed();
        assert_eq!(outcome, WaitOutcome::Timeout);
        // One poll iteration of slack beyond the budget.
        assert!(elapsed >= budget);
        assert!(elapsed < budget + Duration::from_millis(100));
    }

    /// A transport that never runs dry and never delivers the delimiter.
    struct FloodPort;

    impl Transport for FloodPort {
        fn available(&mut self) -> Result<usize> {
            Ok(usize::MAX)
        }

        fn read_byte(&mut self) -> Result<Option<u8>> {
            Ok(Some(b'x'))
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            buf.fill(b'x');
            Ok(buf.len())
        }

        fn write_all(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn read_until_bails_out_on_endless_input() {
        // A stream that keeps producing bytes without the delimiter must not
        // pin the control thread or grow the field without bound.
        let mut port = FloodPort;
        let mut io = SubReader::new(&mut port, noop_yield);
        let budget = Duration::from_millis(50);
        let start = Instant::now();
        let field = io.read_until(b',', budget).unwrap();
        assert!(start.elapsed() < budget + Duration::from_millis(100));
        assert!(field.len() <= MAX_FIELD_LEN);
    }

    #[test]
    fn captured_text_surfaces_accumulation() {
        let mut chan = channel(b"\r\nSIMCOM 7600\r\n\r\nOK\r\n");
        let mut reg = SocketRegistry::new(1, 8);
        let mut text = String::new();
        let outcome = chan
            .await_response(
                Duration::from_millis(50),
                &[OK],
                &NoUrc,
                &mut reg,
                Some(&mut text),
            )
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Matched(1));
        assert!(text.starts_with("SIMCOM 7600"));
        assert!(text.ends_with("OK"));
    }

    #[test]
    fn captured_text_on_timeout_is_trimmed_garbage() {
        let mut chan = channel(b"  +XWEIRD: 1\r\n");
        let mut reg = SocketRegistry::new(1, 8);
        let mut text = String::new();
        let outcome = chan
            .await_response(
                Duration::from_millis(20),
                &[OK],
                &NoUrc,
                &mut reg,
                Some(&mut text),
            )
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Timeout);
        assert_eq!(text, "+XWEIRD: 1");
    }

    /// A URC handler that consumes `"+EVT:<mux>\n"` markers and notes data
    /// pending, mimicking a dialect's data-ready notification.
    struct EvtUrc;

    impl UrcHandler for EvtUrc {
        fn try_consume(
            &self,
            buf: &mut Vec<u8>,
            io: &mut SubReader<'_>,
            registry: &mut SocketRegistry,
        ) -> Result<bool> {
            if buf.ends_with(b"+EVT:") {
                let mux = io.read_uint_until(b'\n', Duration::from_millis(50))? as u8;
                registry.note_data_pending(mux);
                return Ok(true);
            }
            Ok(false)
        }
    }

    #[test]
    fn urc_is_consumed_without_ending_the_wait() {
        let mut chan = channel(b"+EVT:2\nstill waiting\r\nOK\r\n");
        let mut reg = SocketRegistry::new(4, 8);
        reg.bind(2).unwrap();

        let outcome = chan
            .await_response(Duration::from_millis(50), &[OK], &EvtUrc, &mut reg, None)
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Matched(1));
        assert_eq!(reg.take_data_pending(), vec![2]);
    }

    #[test]
    fn urc_for_unknown_mux_still_consumed_quietly() {
        let mut chan = channel(b"+EVT:9\nOK\r\n");
        let mut reg = SocketRegistry::new(4, 8);

        let outcome = chan
            .await_response(Duration::from_millis(50), &[OK], &EvtUrc, &mut reg, None)
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Matched(1));
        assert!(reg.take_data_pending().is_empty());
    }
}
