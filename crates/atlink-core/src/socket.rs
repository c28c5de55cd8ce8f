//! Stream-style socket handle over one mux of a session.
//!
//! A [`Socket`] is a thin handle: all state lives in the session's
//! registry, all traffic goes through the session's command channel. The
//! handle borrows the session, so the borrow checker rules out a socket
//! outliving its engine.
//!
//! Reads never block on the network. `read` drains the local FIFO, then
//! fetches whatever the modem already holds; it returns short (or zero)
//! when nothing more is buffered anywhere. Writes hand data to the modem in
//! dialect-sized chunks and report how much was accepted.

use tracing::debug;

use crate::error::Result;
use crate::session::{pump, Session};

/// Handle to one multiplexed TCP connection.
pub struct Socket<'a> {
    session: &'a Session,
    mux: u8,
}

impl<'a> Socket<'a> {
    pub(crate) fn new(session: &'a Session, mux: u8) -> Self {
        Socket { session, mux }
    }

    /// The mux id this socket is bound to.
    pub fn mux(&self) -> u8 {
        self.mux
    }

    /// Open a TCP connection to `host:port`.
    ///
    /// Any prior connection on this mux is closed first and its buffered
    /// bytes discarded; connecting is always a fresh start.
    pub fn connect(&self, host: &str, port: u16) -> Result<bool> {
        let mux = self.mux;
        self.session.with_parts(|chan, registry, variant| {
            if registry.is_connected(mux) {
                if let Err(err) = variant.close(chan, registry, mux) {
                    debug!(mux, %err, "close before reconnect failed, continuing");
                }
            }
            registry.bind(mux)?;
            let ok = variant.connect(chan, registry, host, port, mux)?;
            registry.set_connected(mux, ok);
            Ok(ok)
        })
    }

    /// Send `data`, chunked to the dialect's per-command limit.
    ///
    /// Returns the number of bytes the modem accepted. A short count means
    /// the modem took less than offered on some chunk; the caller decides
    /// whether to retry the remainder.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mux = self.mux;
        self.session.with_parts(|chan, registry, variant| {
            pump(chan, registry, variant)?;
            let max = variant.max_send_len();
            let mut sent = 0;
            while sent < data.len() {
                let end = (sent + max).min(data.len());
                let accepted = variant.send(chan, registry, mux, &data[sent..end])?;
                if accepted == 0 {
                    break;
                }
                sent += accepted;
            }
            Ok(sent)
        })
    }

    /// Read up to `out.len()` bytes: FIFO first, then bytes the modem
    /// reports as already received.
    ///
    /// Returns the byte count, possibly zero. Never waits for new data to
    /// arrive from the peer.
    pub fn read(&self, out: &mut [u8]) -> Result<usize> {
        let mux = self.mux;
        self.session.with_parts(|chan, registry, variant| {
            let mut n = registry.read_buffered(mux, out);
            pump(chan, registry, variant)?;
            while n < out.len() {
                let outstanding = registry.available_on_modem(mux);
                if outstanding == 0 {
                    break;
                }
                let want = registry.fifo_free(mux).min(outstanding);
                if want == 0 {
                    break;
                }
                let fetched = variant.fetch_data(chan, registry, mux, want)?;
                if fetched == 0 {
                    break;
                }
                n += registry.read_buffered(mux, &mut out[n..]);
            }
            Ok(n)
        })
    }

    /// Bytes readable right now: local FIFO plus the modem-side count.
    ///
    /// When both are zero this polls the modem once, which also refreshes
    /// the connection state.
    pub fn available(&self) -> Result<usize> {
        let mux = self.mux;
        self.session.with_parts(|chan, registry, variant| {
            pump(chan, registry, variant)?;
            let mut total = registry.fifo_len(mux) + registry.available_on_modem(mux);
            if total == 0 {
                variant.query_available(chan, registry, mux)?;
                total = registry.fifo_len(mux) + registry.available_on_modem(mux);
            }
            Ok(total)
        })
    }

    /// True while data remains readable or the link is up.
    ///
    /// A peer close only surfaces as `false` after every received byte has
    /// been drained; until then the socket stays "connected" so the
    /// application cannot lose the tail of the stream.
    pub fn connected(&self) -> Result<bool> {
        if self.available()? > 0 {
            return Ok(true);
        }
        let mux = self.mux;
        self.session
            .with_parts(|_, registry, _| Ok(registry.is_connected(mux)))
    }

    /// Close the connection. Idempotent; buffered bytes stay readable.
    pub fn stop(&self) -> Result<()> {
        let mux = self.mux;
        self.session.with_parts(|chan, registry, variant| {
            variant.close(chan, registry, mux)?;
            registry.set_connected(mux, false);
            Ok(())
        })
    }
}
