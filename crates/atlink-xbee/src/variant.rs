//! The XBee command dialect.
//!
//! All control traffic runs through command mode: a one second guard
//! silence, the `+++` escape, then CR-terminated `AT` commands until `CN`
//! drops the module back to data mode. Payload moves only in data mode,
//! as raw pass-through.
//!
//! Every operation that needs command mode goes through
//! [`XBee::with_command_mode`], which exits on all paths. A module stuck
//! in command mode would silently eat payload bytes, which is far harder
//! to diagnose than a failed command.

use std::time::Duration;

use tracing::{debug, warn};

use atlink_core::channel::{CommandChannel, Fragment, UrcHandler};
use atlink_core::error::{Error, Result};
use atlink_core::registry::SocketRegistry;
use atlink_core::variant::{ModemVariant, NetworkConfig};

use crate::urc::XBeeUrc;

/// The module carries a single link, mux 0.
pub const MUX_COUNT: usize = 1;

/// Data mode is pass-through; this only bounds one write call.
const MAX_SEND: usize = 8192;

const OK: &[u8] = b"OK\r";
const ERR: &[u8] = b"ERROR\r";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Budget for the `OK` that follows the `+++` escape. The module answers
/// only after a trailing guard silence of its own.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(2200);
/// `LA` resolves the hostname over the air before answering.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// The XBee dialect.
pub struct XBee {
    guard_delay: Duration,
    urc: XBeeUrc,
}

impl XBee {
    pub fn new() -> Self {
        XBee {
            guard_delay: Duration::from_secs(1),
            urc: XBeeUrc,
        }
    }

    /// Override the pre-escape guard silence. The firmware default is one
    /// second; only change this if the module's `GT` register was changed
    /// to match.
    pub fn with_guard_delay(mut self, guard_delay: Duration) -> Self {
        self.guard_delay = guard_delay;
        self
    }

    fn command_ok(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        fragments: &[Fragment<'_>],
        timeout: Duration,
    ) -> Result<bool> {
        chan.send_command(fragments)?;
        Ok(chan
            .await_response(timeout, &[OK, ERR], &self.urc, registry, None)?
            .is_success())
    }

    fn enter_command_mode(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<bool> {
        std::thread::sleep(self.guard_delay);
        chan.write_raw(b"+++")?;
        chan.flush()?;
        let entered = chan
            .await_response(ESCAPE_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?
            .is_success();
        if !entered {
            warn!("command mode entry not acknowledged");
        }
        Ok(entered)
    }

    fn exit_command_mode(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<()> {
        chan.send_command(&["CN".into()])?;
        chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        Ok(())
    }

    /// Persist pending register changes (`WR`) and apply them (`AC`).
    fn write_changes(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<()> {
        self.command_ok(chan, registry, &["WR".into()], DEFAULT_TIMEOUT)?;
        self.command_ok(chan, registry, &["AC".into()], DEFAULT_TIMEOUT)?;
        Ok(())
    }

    /// Run `f` in command mode, returning to data mode on every path.
    fn with_command_mode<R>(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        f: impl FnOnce(&mut CommandChannel, &mut SocketRegistry) -> Result<R>,
    ) -> Result<R> {
        self.enter_command_mode(chan, registry)?;
        let result = f(chan, registry);
        let exited = self.exit_command_mode(chan, registry);
        let value = result?;
        exited?;
        Ok(value)
    }
}

impl Default for XBee {
    fn default() -> Self {
        Self::new()
    }
}

impl ModemVariant for XBee {
    fn name(&self) -> &str {
        "XBee"
    }

    fn line_ending(&self) -> &'static str {
        "\r"
    }

    fn urc_handler(&self) -> &dyn UrcHandler {
        &self.urc
    }

    fn max_send_len(&self) -> usize {
        MAX_SEND
    }

    fn init(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<bool> {
        self.with_command_mode(chan, registry, |chan, registry| {
            self.command_ok(chan, registry, &[], DEFAULT_TIMEOUT)
        })
    }

    fn attach_network(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        config: &NetworkConfig<'_>,
    ) -> Result<bool> {
        let NetworkConfig::WiFi { ssid, passphrase } = *config else {
            return Err(Error::Unsupported("cellular attach on a Wi-Fi module".into()));
        };

        self.with_command_mode(chan, registry, |chan, registry| {
            // Transparent mode, TCP.
            self.command_ok(chan, registry, &["AP".into(), 0u64.into()], DEFAULT_TIMEOUT)?;
            self.command_ok(chan, registry, &["IP".into(), 1u64.into()], DEFAULT_TIMEOUT)?;

            if !self.command_ok(chan, registry, &["ID".into(), ssid.into()], DEFAULT_TIMEOUT)? {
                return Ok(false);
            }
            if !self.command_ok(
                chan,
                registry,
                &["PK".into(), passphrase.into()],
                DEFAULT_TIMEOUT,
            )? {
                return Ok(false);
            }

            self.write_changes(chan, registry)?;
            Ok(true)
        })
    }

    fn detach_network(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<bool> {
        // The module offers no disassociate command in transparent mode.
        let _ = (chan, registry);
        Ok(false)
    }

    fn connect(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        host: &str,
        port: u16,
        mux: u8,
    ) -> Result<bool> {
        self.with_command_mode(chan, registry, |chan, registry| {
            // Resolve the hostname; the reply is the bare dotted quad.
            chan.send_command(&["LA".into(), host.into()])?;
            let ip = chan.sub_reader().read_until(b'\r', LOOKUP_TIMEOUT)?;
            if ip.is_empty() || !ip.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
                debug!(host, %ip, "lookup failed");
                return Ok(false);
            }

            if !self.command_ok(chan, registry, &["DL".into(), ip.as_str().into()], DEFAULT_TIMEOUT)?
            {
                return Ok(false);
            }

            let port_hex = format!("{port:x}");
            let ok = self.command_ok(
                chan,
                registry,
                &["DE".into(), port_hex.as_str().into()],
                DEFAULT_TIMEOUT,
            )?;
            if ok {
                self.write_changes(chan, registry)?;
                debug!(mux, host, %ip, port, "destination configured");
            }
            Ok(ok)
        })
    }

    fn send(
        &self,
        chan: &mut CommandChannel,
        _registry: &mut SocketRegistry,
        mux: u8,
        data: &[u8],
    ) -> Result<usize> {
        // Data mode pass-through; the module frames nothing.
        chan.write_raw(data)?;
        chan.flush()?;
        debug!(mux, bytes = data.len(), "sent data");
        Ok(data.len())
    }

    fn fetch_data(
        &self,
        _chan: &mut CommandChannel,
        _registry: &mut SocketRegistry,
        _mux: u8,
        _max_len: usize,
    ) -> Result<usize> {
        // Payload arrives inline via +IPD; there is nothing to fetch.
        Ok(0)
    }

    fn query_available(
        &self,
        _chan: &mut CommandChannel,
        _registry: &mut SocketRegistry,
        _mux: u8,
    ) -> Result<usize> {
        // No modem-side receive buffer to poll.
        Ok(0)
    }

    fn query_connected(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<bool> {
        let up = self.with_command_mode(chan, registry, |chan, registry| {
            // AI reports association state; 0 means joined.
            chan.send_command(&["AI".into()])?;
            Ok(chan
                .await_response(
                    DEFAULT_TIMEOUT,
                    &[b"0".as_slice(), ERR],
                    &self.urc,
                    registry,
                    None,
                )?
                .is_success())
        })?;
        registry.set_connected(mux, up);
        Ok(up)
    }

    fn close(
        &self,
        _chan: &mut CommandChannel,
        _registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<()> {
        // No close command in transparent mode; the flag alone tracks it.
        debug!(mux, "close requested");
        Ok(())
    }

    fn signal_quality(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<i32> {
        self.with_command_mode(chan, registry, |chan, _registry| {
            // DB answers the last-hop RSSI magnitude in hex.
            chan.send_command(&["DB".into()])?;
            let field = chan.sub_reader().read_until(b'\r', DEFAULT_TIMEOUT)?;
            Ok(i32::from_str_radix(field.trim_start_matches("0x"), 16).unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let dialect = XBee::new();
        assert_eq!(dialect.name(), "XBee");
        assert_eq!(dialect.line_ending(), "\r");
        assert_eq!(dialect.guard_delay, Duration::from_secs(1));
    }

    #[test]
    fn guard_delay_builder() {
        let dialect = XBee::new().with_guard_delay(Duration::ZERO);
        assert_eq!(dialect.guard_delay, Duration::ZERO);
    }
}
