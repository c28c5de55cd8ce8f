//! Unsolicited notification handling for the XBee.
//!
//! In data mode the module interleaves two notifications with pass-through
//! payload:
//!
//! - `+IPD,<mux>,<len>:<bytes>` -- inbound payload, delivered inline
//! - `<mux>,CLOSED` -- the peer closed the link
//!
//! Unlike the SIMCom grammar there is no retrieval step; `+IPD` carries
//! the payload bytes directly and they go straight into the receive FIFO.

use std::time::Duration;

use tracing::debug;

use atlink_core::channel::{SubReader, UrcHandler};
use atlink_core::error::Result;
use atlink_core::registry::SocketRegistry;

const FIELD_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct XBeeUrc;

impl UrcHandler for XBeeUrc {
    fn try_consume(
        &self,
        buf: &mut Vec<u8>,
        io: &mut SubReader<'_>,
        registry: &mut SocketRegistry,
    ) -> Result<bool> {
        if buf.ends_with(b"\r+IPD,") {
            let mux = io.read_uint_until(b',', FIELD_TIMEOUT)? as u8;
            let len = io.read_uint_until(b':', FIELD_TIMEOUT)?;
            let mut payload = Vec::with_capacity(len);
            for _ in 0..len {
                match io.read_byte(FIELD_TIMEOUT)? {
                    Some(b) => payload.push(b),
                    None => break,
                }
            }
            registry.push_bytes(mux, &payload);
            debug!(mux, len = payload.len(), "inbound payload");
            return Ok(true);
        }

        if buf.ends_with(b",CLOSED\r") {
            // The digit before the comma names the link.
            let comma = buf.len() - b",CLOSED\r".len();
            let mux = comma
                .checked_sub(1)
                .and_then(|i| buf.get(i))
                .filter(|b| b.is_ascii_digit())
                .map(|b| b - b'0');
            if let Some(mux) = mux {
                registry.mark_closed(mux);
                debug!(mux, "closed by peer");
            }
            return Ok(true);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use atlink_core::channel::{CommandChannel, WaitOutcome};
    use atlink_test_harness::MockHandle;

    const OK: &[u8] = b"OK\r";

    fn channel(mock: &MockHandle) -> CommandChannel {
        CommandChannel::new(Box::new(mock.clone()), "\r", atlink_core::noop_yield)
    }

    #[test]
    fn ipd_payload_lands_in_the_fifo() {
        let mock = MockHandle::new();
        mock.inject(b"\r+IPD,0,5:helloOK\r");
        let mut chan = channel(&mock);
        let mut reg = SocketRegistry::new(1, 64);
        reg.bind(0).unwrap();

        let outcome = chan
            .await_response(Duration::from_millis(100), &[OK], &XBeeUrc, &mut reg, None)
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Matched(1));
        let mut out = [0u8; 8];
        let n = reg.read_buffered(0, &mut out);
        assert_eq!(&out[..n], b"hello");
    }

    #[test]
    fn closed_line_clears_the_connected_flag() {
        let mock = MockHandle::new();
        mock.inject(b"\r0,CLOSED\rOK\r");
        let mut chan = channel(&mock);
        let mut reg = SocketRegistry::new(1, 64);
        reg.bind(0).unwrap();
        reg.set_connected(0, true);

        chan.await_response(Duration::from_millis(100), &[OK], &XBeeUrc, &mut reg, None)
            .unwrap();

        assert!(!reg.is_connected(0));
    }

    #[test]
    fn closed_line_for_unknown_link_is_ignored() {
        let mock = MockHandle::new();
        mock.inject(b"\r7,CLOSED\rOK\r");
        let mut chan = channel(&mock);
        let mut reg = SocketRegistry::new(1, 64);
        reg.bind(0).unwrap();
        reg.set_connected(0, true);

        let outcome = chan
            .await_response(Duration::from_millis(100), &[OK], &XBeeUrc, &mut reg, None)
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Matched(1));
        assert!(reg.is_connected(0));
    }
}
