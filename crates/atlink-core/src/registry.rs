//! Mux-indexed socket state table.
//!
//! A modem multiplexes several TCP connections over one command channel,
//! identifying each by a small integer mux id. The [`SocketRegistry`] holds
//! the per-mux state the engine mutates out of band: the receive FIFO, the
//! modem-reported outstanding byte count, the connected flag, and a
//! "data pending" marker set by data-ready notifications.
//!
//! The registry is the sole routing mechanism for asynchronous events.
//! Routing to a mux that is out of range or not bound is a silent no-op:
//! modems occasionally emit notifications for links the application never
//! opened, and dropping those must not disturb an unrelated wait.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::fifo::ReceiveFifo;

#[derive(Debug)]
struct SocketState {
    connected: bool,
    available: usize,
    data_pending: bool,
    fifo: ReceiveFifo,
}

/// Fixed-size table of per-mux socket state, owned by the session.
#[derive(Debug)]
pub struct SocketRegistry {
    slots: Vec<Option<SocketState>>,
    rx_capacity: usize,
}

impl SocketRegistry {
    /// Create a registry for `mux_count` sockets, each with a receive FIFO
    /// of `rx_capacity` bytes.
    pub fn new(mux_count: usize, rx_capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(mux_count);
        slots.resize_with(mux_count, || None);
        SocketRegistry { slots, rx_capacity }
    }

    pub fn mux_count(&self) -> usize {
        self.slots.len()
    }

    /// Bind (or re-bind) a socket at `mux` with fresh state.
    ///
    /// Re-binding a mux after a prior socket's `stop()` is permitted and
    /// requires no ceremony beyond this call.
    pub fn bind(&mut self, mux: u8) -> Result<()> {
        let slot = self
            .slots
            .get_mut(mux as usize)
            .ok_or_else(|| Error::InvalidParameter(format!("mux {mux} out of range")))?;
        *slot = Some(SocketState {
            connected: false,
            available: 0,
            data_pending: false,
            fifo: ReceiveFifo::new(self.rx_capacity),
        });
        Ok(())
    }

    fn state(&self, mux: u8) -> Option<&SocketState> {
        self.slots.get(mux as usize).and_then(|s| s.as_ref())
    }

    fn state_mut(&mut self, mux: u8) -> Option<&mut SocketState> {
        self.slots.get_mut(mux as usize).and_then(|s| s.as_mut())
    }

    // -----------------------------------------------------------------
    // Queries used by sockets and dialects
    // -----------------------------------------------------------------

    pub fn is_bound(&self, mux: u8) -> bool {
        self.state(mux).is_some()
    }

    pub fn is_connected(&self, mux: u8) -> bool {
        self.state(mux).map(|s| s.connected).unwrap_or(false)
    }

    /// Modem-reported bytes outstanding beyond what the FIFO holds.
    pub fn available_on_modem(&self, mux: u8) -> usize {
        self.state(mux).map(|s| s.available).unwrap_or(0)
    }

    pub fn fifo_len(&self, mux: u8) -> usize {
        self.state(mux).map(|s| s.fifo.len()).unwrap_or(0)
    }

    pub fn fifo_free(&self, mux: u8) -> usize {
        self.state(mux).map(|s| s.fifo.free()).unwrap_or(0)
    }

    /// Drain up to `out.len()` buffered bytes for `mux` into `out`.
    pub fn read_buffered(&mut self, mux: u8, out: &mut [u8]) -> usize {
        match self.state_mut(mux) {
            Some(s) => s.fifo.get(out),
            None => 0,
        }
    }

    pub fn clear_fifo(&mut self, mux: u8) {
        if let Some(s) = self.state_mut(mux) {
            s.fifo.clear();
        }
    }

    /// Muxes whose data-pending marker is set, clearing the markers.
    pub fn take_data_pending(&mut self) -> Vec<u8> {
        let mut pending = Vec::new();
        for (mux, slot) in self.slots.iter_mut().enumerate() {
            if let Some(s) = slot {
                if s.data_pending {
                    s.data_pending = false;
                    pending.push(mux as u8);
                }
            }
        }
        pending
    }

    // -----------------------------------------------------------------
    // Event routing (no-op on unknown mux)
    // -----------------------------------------------------------------

    /// A data-ready notification arrived without a byte count.
    pub fn note_data_pending(&mut self, mux: u8) {
        match self.state_mut(mux) {
            Some(s) => s.data_pending = true,
            None => debug!(mux, "data-ready for unknown mux, ignoring"),
        }
    }

    /// The modem reported `count` bytes outstanding for `mux`.
    pub fn set_available(&mut self, mux: u8, count: usize) {
        match self.state_mut(mux) {
            Some(s) => s.available = count,
            None => debug!(mux, count, "byte count for unknown mux, ignoring"),
        }
    }

    pub fn set_connected(&mut self, mux: u8, connected: bool) {
        if let Some(s) = self.state_mut(mux) {
            s.connected = connected;
        }
    }

    /// The peer (or the modem) closed the connection on `mux`.
    ///
    /// Clears the connected flag and the outstanding count; bytes already
    /// staged in the FIFO remain readable.
    pub fn mark_closed(&mut self, mux: u8) {
        match self.state_mut(mux) {
            Some(s) => {
                debug!(mux, "socket closed by peer");
                s.connected = false;
                s.available = 0;
            }
            None => debug!(mux, "close event for unknown mux, ignoring"),
        }
    }

    /// Stage inbound payload bytes for `mux`, dropping any overflow.
    ///
    /// Returns the number of bytes accepted.
    pub fn push_bytes(&mut self, mux: u8, data: &[u8]) -> usize {
        match self.state_mut(mux) {
            Some(s) => {
                let accepted = s.fifo.put_slice(data);
                if accepted < data.len() {
                    warn!(
                        mux,
                        dropped = data.len() - accepted,
                        capacity = s.fifo.capacity(),
                        "receive FIFO overflow, dropping excess bytes"
                    );
                }
                accepted
            }
            None => {
                debug!(mux, bytes = data.len(), "payload for unknown mux, ignoring");
                0
            }
        }
    }
}
