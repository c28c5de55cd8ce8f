//! Unsolicited notification handling for the SIM7600.
//!
//! Three notifications matter to socket state and can arrive in the middle
//! of any wait:
//!
//! - `+CIPRXGET: 1,<mux>` -- data ready for manual retrieval
//! - `+RECEIVE:<mux>,<len>` -- inbound data length report
//! - `+IPCLOSE: <mux>,<reason>` -- peer or network closed the link
//!
//! `+CIPRXGET` needs care: the same token heads the replies to retrieval
//! commands (modes 2 through 4). Only mode 1 is a notification; for any
//! other mode the consumed bytes are pushed back verbatim so the
//! outstanding wait sees the reply unaltered.

use std::time::Duration;

use tracing::debug;

use atlink_core::channel::{SubReader, UrcHandler};
use atlink_core::error::Result;
use atlink_core::registry::SocketRegistry;

/// Field timeout for a notification's fixed-format payload.
const FIELD_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) struct Sim7600Urc;

impl UrcHandler for Sim7600Urc {
    fn try_consume(
        &self,
        buf: &mut Vec<u8>,
        io: &mut SubReader<'_>,
        registry: &mut SocketRegistry,
    ) -> Result<bool> {
        if buf.ends_with(b"\r\n+CIPRXGET:") {
            // Sniff the mode byte-for-byte so a fall-through can push back
            // exactly what was consumed, spacing and comma included.
            let mut sniffed = Vec::new();
            while let Some(b) = io.read_byte(FIELD_TIMEOUT)? {
                sniffed.push(b);
                if b == b',' || sniffed.len() >= 16 {
                    break;
                }
            }
            let mode = String::from_utf8_lossy(&sniffed);
            if mode.trim().trim_end_matches(',').trim().parse::<u32>().unwrap_or(0) == 1 {
                let mux = io.read_uint_until(b'\n', FIELD_TIMEOUT)? as u8;
                registry.note_data_pending(mux);
                debug!(mux, "data ready");
                return Ok(true);
            }
            // Reply header for a retrieval command, not a notification.
            buf.extend_from_slice(&sniffed);
            return Ok(false);
        }

        if buf.ends_with(b"\r\n+RECEIVE:") {
            let mux = io.read_uint_until(b',', FIELD_TIMEOUT)? as u8;
            let len = io.read_uint_until(b'\n', FIELD_TIMEOUT)?;
            registry.note_data_pending(mux);
            registry.set_available(mux, len);
            debug!(mux, len, "inbound data reported");
            return Ok(true);
        }

        if buf.ends_with(b"+IPCLOSE:") {
            let mux = io.read_uint_until(b',', FIELD_TIMEOUT)? as u8;
            io.skip_until(b'\n', FIELD_TIMEOUT)?; // reason code
            registry.mark_closed(mux);
            debug!(mux, "closed by peer");
            return Ok(true);
        }

        Ok(false)
    }
}
