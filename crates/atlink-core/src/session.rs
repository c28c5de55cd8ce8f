//! The modem session: one control thread, one command channel, many
//! multiplexed sockets.
//!
//! A [`Session`] owns the [`CommandChannel`], the [`SocketRegistry`], and
//! the selected [`ModemVariant`]. All operations run on the caller's thread
//! as synchronous bounded polls; there is no background reader. Interior
//! mutability is a single [`RefCell`], which is safe because the session is
//! `!Sync` by construction and every public operation borrows the cell for
//! its full duration.
//!
//! Sockets are handed out as [`Socket`] values borrowing the session, so a
//! socket can never outlive the engine that services it.

use std::cell::RefCell;

use tracing::debug;

use crate::channel::{CommandChannel, YieldHook};
use crate::error::Result;
use crate::registry::SocketRegistry;
use crate::socket::Socket;
use crate::transport::Transport;
use crate::variant::{ModemVariant, NetworkConfig, SimStatus};

use std::time::Duration;

/// Sizing and scheduling knobs fixed at session construction.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Number of mux slots the registry allocates. Must cover the highest
    /// mux id the dialect supports.
    pub mux_count: usize,
    /// Receive FIFO capacity per socket, in bytes.
    pub rx_capacity: usize,
    /// Cooperative-yield hook invoked inside every polling loop.
    pub yield_hook: YieldHook,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            mux_count: 10,
            rx_capacity: 1024,
            yield_hook: crate::channel::noop_yield,
        }
    }
}

pub(crate) struct Inner {
    pub(crate) chan: CommandChannel,
    pub(crate) registry: SocketRegistry,
    pub(crate) variant: Box<dyn ModemVariant>,
}

/// A live modem session over one transport.
pub struct Session {
    inner: RefCell<Inner>,
}

impl Session {
    /// Build a session from a transport and a dialect.
    ///
    /// The command channel picks up the dialect's line ending; the registry
    /// is sized from `config`.
    pub fn new(
        transport: Box<dyn Transport>,
        variant: Box<dyn ModemVariant>,
        config: SessionConfig,
    ) -> Self {
        let chan = CommandChannel::new(transport, variant.line_ending(), config.yield_hook);
        let registry = SocketRegistry::new(config.mux_count, config.rx_capacity);
        Session {
            inner: RefCell::new(Inner {
                chan,
                registry,
                variant,
            }),
        }
    }

    /// Run `f` with disjoint borrows of the channel, registry and dialect.
    pub(crate) fn with_parts<R>(
        &self,
        f: impl FnOnce(&mut CommandChannel, &mut SocketRegistry, &dyn ModemVariant) -> Result<R>,
    ) -> Result<R> {
        let mut inner = self.inner.borrow_mut();
        let Inner {
            chan,
            registry,
            variant,
        } = &mut *inner;
        f(chan, registry, variant.as_ref())
    }

    /// Synchronize with the modem and run the dialect's initialization
    /// sequence (baud probing, echo off, status checks).
    ///
    /// Returns `false` if the modem never acknowledged.
    pub fn begin(&self) -> Result<bool> {
        self.with_parts(|chan, registry, variant| {
            debug!(dialect = variant.name(), "initializing session");
            variant.init(chan, registry)
        })
    }

    /// Soft-reset the modem, then re-initialize.
    pub fn restart(&self) -> Result<bool> {
        self.with_parts(|chan, registry, variant| {
            if !variant.reset(chan, registry)? {
                return Ok(false);
            }
            variant.init(chan, registry)
        })
    }

    /// Attach to the data network described by `config`.
    pub fn attach_network(&self, config: &NetworkConfig<'_>) -> Result<bool> {
        self.with_parts(|chan, registry, variant| variant.attach_network(chan, registry, config))
    }

    /// Detach from the data network.
    pub fn detach_network(&self) -> Result<bool> {
        self.with_parts(|chan, registry, variant| variant.detach_network(chan, registry))
    }

    /// Service pending asynchronous notifications.
    ///
    /// Call this periodically from the control loop when no socket
    /// operation is in flight; socket reads and writes pump implicitly.
    pub fn maintain(&self) -> Result<()> {
        self.with_parts(pump)
    }

    /// Bind a socket at `mux` and hand it out.
    ///
    /// The socket borrows the session; binding an already-bound mux resets
    /// its state, which is the supported way to reuse a mux after `stop()`.
    pub fn socket(&self, mux: u8) -> Result<Socket<'_>> {
        self.with_parts(|_, registry, _| registry.bind(mux))?;
        Ok(Socket::new(self, mux))
    }

    // -----------------------------------------------------------------
    // Peripheral queries
    // -----------------------------------------------------------------

    pub fn modem_name(&self) -> Result<String> {
        self.with_parts(|chan, registry, variant| variant.modem_name(chan, registry))
    }

    pub fn signal_quality(&self) -> Result<i32> {
        self.with_parts(|chan, registry, variant| variant.signal_quality(chan, registry))
    }

    pub fn sim_status(&self) -> Result<SimStatus> {
        self.with_parts(|chan, registry, variant| variant.sim_status(chan, registry))
    }

    pub fn local_ip(&self) -> Result<String> {
        self.with_parts(|chan, registry, variant| variant.local_ip(chan, registry))
    }

    pub fn battery_millivolts(&self) -> Result<u32> {
        self.with_parts(|chan, registry, variant| variant.battery_millivolts(chan, registry))
    }
}

/// Drain inbound bytes through the dialect's notification handler, then
/// refresh byte counts for any mux that signalled data ready.
///
/// Non-notification text encountered here belongs to no outstanding wait
/// and is discarded (the scanner logs it).
pub(crate) fn pump(
    chan: &mut CommandChannel,
    registry: &mut SocketRegistry,
    variant: &dyn ModemVariant,
) -> Result<()> {
    while chan.available()? > 0 {
        chan.await_response(
            Duration::from_millis(10),
            &[],
            variant.urc_handler(),
            registry,
            None,
        )?;
    }
    for mux in registry.take_data_pending() {
        variant.query_available(chan, registry, mux)?;
    }
    Ok(())
}
