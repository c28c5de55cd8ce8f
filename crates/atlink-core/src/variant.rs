//! The `ModemVariant` trait -- per-chipset command grammar and quirks.
//!
//! Each modem family speaks its own dialect of the AT command set: different
//! command grammar and argument order, different terminator sets, different
//! timeout budgets, and in some cases a command-mode/data-mode state machine
//! instead of multiplexed framing. A concrete [`ModemVariant`] captures all
//! of that behind one strategy interface, selected at session construction.
//!
//! Variant methods receive the session's [`CommandChannel`] and
//! [`SocketRegistry`] explicitly; the variant itself stays stateless apart
//! from its configuration, so a single control thread can interleave socket
//! operations freely.
//!
//! Peripheral queries (modem name, signal quality, SIM status, local IP,
//! battery) default to [`Error::Unsupported`]: they are single
//! command/response round-trips that not every chipset provides.

use crate::channel::{CommandChannel, UrcHandler};
use crate::error::{Error, Result};
use crate::registry::SocketRegistry;

/// Network attach parameters, by link type.
#[derive(Debug, Clone, Copy)]
pub enum NetworkConfig<'a> {
    /// Cellular packet data: APN plus optional credentials.
    Cellular {
        apn: &'a str,
        user: Option<&'a str>,
        password: Option<&'a str>,
    },
    /// Wi-Fi: SSID and passphrase.
    WiFi {
        ssid: &'a str,
        passphrase: &'a str,
    },
}

/// SIM card status as reported by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    Ready,
    Locked,
    Error,
}

/// Strategy interface for one modem dialect.
pub trait ModemVariant {
    /// Human-readable dialect name for logging.
    fn name(&self) -> &str;

    /// Line terminator appended to every command.
    fn line_ending(&self) -> &'static str;

    /// The dialect's asynchronous-notification interceptor.
    fn urc_handler(&self) -> &dyn UrcHandler;

    /// Maximum payload bytes one send round-trip will accept.
    fn max_send_len(&self) -> usize;

    /// Post-link initialization (echo off, status queries). Returns `false`
    /// if the modem did not acknowledge.
    fn init(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<bool>;

    /// Soft-reset the module. Default: not supported.
    fn reset(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<bool> {
        let _ = (chan, registry);
        Ok(false)
    }

    /// Bring up the data network (attach, configure, open the socket
    /// service). Fail-fast: the first step that misses its success
    /// terminator aborts the sequence.
    fn attach_network(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        config: &NetworkConfig<'_>,
    ) -> Result<bool>;

    /// Tear the data network down.
    fn detach_network(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<bool>;

    /// Open a TCP connection on `mux`. Returns the connected outcome.
    fn connect(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        host: &str,
        port: u16,
        mux: u8,
    ) -> Result<bool>;

    /// Send up to [`max_send_len`](Self::max_send_len) bytes of `data` on
    /// `mux`. Returns the byte count the modem accepted; the caller
    /// reissues for any remainder.
    fn send(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
        data: &[u8],
    ) -> Result<usize>;

    /// Ask the modem to hand over up to `max_len` buffered bytes for `mux`.
    ///
    /// Transferred bytes land in the mux's receive FIFO as a side effect;
    /// returns the number transferred.
    fn fetch_data(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
        max_len: usize,
    ) -> Result<usize>;

    /// Query how many received bytes the modem is holding for `mux`.
    fn query_available(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<usize>;

    /// Poll the modem for the connection state of `mux`.
    fn query_connected(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<bool>;

    /// Close the connection on `mux`.
    fn close(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<()>;

    // -----------------------------------------------------------------
    // Peripheral queries (single round-trips; optional per dialect)
    // -----------------------------------------------------------------

    fn modem_name(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<String> {
        let _ = (chan, registry);
        Err(Error::Unsupported("modem name query".into()))
    }

    /// Raw signal-quality figure (dialect-defined scale).
    fn signal_quality(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<i32> {
        let _ = (chan, registry);
        Err(Error::Unsupported("signal quality query".into()))
    }

    fn sim_status(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<SimStatus> {
        let _ = (chan, registry);
        Err(Error::Unsupported("SIM status query".into()))
    }

    fn local_ip(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<String> {
        let _ = (chan, registry);
        Err(Error::Unsupported("local IP query".into()))
    }

    fn battery_millivolts(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<u32> {
        let _ = (chan, registry);
        Err(Error::Unsupported("battery query".into()))
    }
}
