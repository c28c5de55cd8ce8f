//! The SIM7600 command dialect.
//!
//! Grammar, timeouts and sequencing follow the SIMCom AT command manual:
//! the embedded TCP/IP stack is driven in multi-socket command mode
//! (`+CIPMODE=0`), receive retrieval is manual (`+CIPRXGET`), and the slow
//! network operations carry their documented budgets (75 s for attach,
//! 60 s for detach, 15 s for a connect).

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use atlink_core::channel::{CommandChannel, Fragment, UrcHandler, WaitOutcome};
use atlink_core::error::{Error, Result};
use atlink_core::registry::SocketRegistry;
use atlink_core::variant::{ModemVariant, NetworkConfig, SimStatus};

use crate::urc::Sim7600Urc;

/// Sockets the module can multiplex.
pub const MUX_COUNT: usize = 10;

/// Largest payload one `+CIPSEND` round-trip accepts.
const MAX_SEND: usize = 1024;

const OK: &[u8] = b"OK\r\n";
const ERR: &[u8] = b"ERROR\r\n";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const ATTACH_TIMEOUT: Duration = Duration::from_secs(75);
const DETACH_TIMEOUT: Duration = Duration::from_secs(60);
const RESET_TIMEOUT: Duration = Duration::from_secs(10);
/// The module reboots after `+CRESET`; it ignores commands until it is
/// back up.
const RESET_SETTLE: Duration = Duration::from_secs(5);

/// Timeout for fields of an already-matched reply header.
const FIELD_TIMEOUT: Duration = Duration::from_secs(1);

/// How `+CIPRXGET` hands payload bytes over.
///
/// Hex doubles the wire size but survives links that mangle binary data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Raw,
    Hex,
}

/// The SIM7600 dialect.
pub struct Sim7600 {
    transfer_mode: TransferMode,
    urc: Sim7600Urc,
}

impl Sim7600 {
    pub fn new() -> Self {
        Sim7600 {
            transfer_mode: TransferMode::Raw,
            urc: Sim7600Urc,
        }
    }

    /// Use hex transfer for `+CIPRXGET` payloads.
    pub fn with_transfer_mode(mut self, mode: TransferMode) -> Self {
        self.transfer_mode = mode;
        self
    }

    /// Send one command and wait for its OK/ERROR verdict.
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

    /// Probe with bare `AT` until the modem answers, for up to 10 seconds.
    ///
    /// Covers both a module still booting and one autobauding to our rate.
    fn sync(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<bool> {
        let deadline = Instant::now() + SYNC_TIMEOUT;
        loop {
            if self.command_ok(chan, registry, &[], Duration::from_millis(200))? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

impl Default for Sim7600 {
    fn default() -> Self {
        Self::new()
    }
}

impl ModemVariant for Sim7600 {
    fn name(&self) -> &str {
        "SIM7600"
    }

    fn line_ending(&self) -> &'static str {
        "\r\n"
    }

    fn urc_handler(&self) -> &dyn UrcHandler {
        &self.urc
    }

    fn max_send_len(&self) -> usize {
        MAX_SEND
    }

    fn init(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<bool> {
        if !self.sync(chan, registry)? {
            return Ok(false);
        }
        // Echo off; echoed commands would pollute terminator matching.
        if !self.command_ok(chan, registry, &["E0".into()], DEFAULT_TIMEOUT)? {
            return Ok(false);
        }
        match self.modem_name(chan, registry) {
            Ok(name) => debug!(%name, "modem identified"),
            Err(err) => debug!(%err, "modem name query failed"),
        }
        match self.sim_status(chan, registry)? {
            SimStatus::Ready => {}
            status => warn!(?status, "SIM not ready"),
        }
        Ok(true)
    }

    fn reset(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<bool> {
        if !self.sync(chan, registry)? {
            return Ok(false);
        }
        chan.send_command(&["+CRESET".into()])?;
        if !chan
            .await_response(RESET_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?
            .is_success()
        {
            return Ok(false);
        }
        std::thread::sleep(RESET_SETTLE);
        Ok(true)
    }

    fn attach_network(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        config: &NetworkConfig<'_>,
    ) -> Result<bool> {
        let NetworkConfig::Cellular {
            apn,
            user,
            password,
        } = *config
        else {
            return Err(Error::Unsupported("Wi-Fi attach on a cellular module".into()));
        };

        // Make sure we're starting from a detached stack.
        let _ = self.detach_network(chan, registry)?;

        let user = user.filter(|u| !u.is_empty());
        let password = password.unwrap_or("");

        if let Some(user) = user {
            self.command_ok(
                chan,
                registry,
                &[
                    "+CGAUTH=1,0,\"".into(),
                    user.into(),
                    "\",\"".into(),
                    password.into(),
                    "\"".into(),
                ],
                DEFAULT_TIMEOUT,
            )?;
        }

        // Define PDP context 1 for the embedded stack.
        self.command_ok(
            chan,
            registry,
            &["+CGSOCKCONT=1,\"IP\",\"".into(), apn.into(), "\"".into()],
            DEFAULT_TIMEOUT,
        )?;

        // Activate the PDP profile; this is the slow radio-side step.
        if !self.command_ok(chan, registry, &["+CSOCKSETPN=1".into()], ATTACH_TIMEOUT)? {
            return Ok(false);
        }

        if let Some(user) = user {
            self.command_ok(
                chan,
                registry,
                &[
                    "+CSOCKAUTH=1,1,\"".into(),
                    user.into(),
                    "\",\"".into(),
                    password.into(),
                    "\"".into(),
                ],
                DEFAULT_TIMEOUT,
            )?;
        }

        // Send without waiting for the peer's TCP ACK.
        self.command_ok(chan, registry, &["+CIPSENDMODE=0".into()], DEFAULT_TIMEOUT)?;

        // Multi-client receive header "+RECEIVE,<mux>,<len>", synchronous
        // command execution, 75 s retransmission timeout.
        if !self.command_ok(
            chan,
            registry,
            &["+CIPCCFG=10,0,0,0,1,0,75000".into()],
            DEFAULT_TIMEOUT,
        )? {
            return Ok(false);
        }

        // Command mode, not transparent mode.
        self.command_ok(chan, registry, &["+CIPMODE=0".into()], DEFAULT_TIMEOUT)?;

        self.command_ok(
            chan,
            registry,
            &["+CIPTIMEOUT=".into(), 75000u64.into(), ",".into(), 15000u64.into(), ",".into(), 15000u64.into()],
            DEFAULT_TIMEOUT,
        )?;

        // Start the socket service. An immediate OK may precede the real
        // verdict, so wait for the +NETOPEN report itself.
        chan.send_command(&["+NETOPEN".into()])?;
        let outcome = chan.await_response(
            ATTACH_TIMEOUT,
            &[b"\r\n+NETOPEN: 0".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )?;
        Ok(outcome == WaitOutcome::Matched(1))
    }

    fn detach_network(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<bool> {
        // All sockets should be closed first.
        self.command_ok(chan, registry, &["+NETCLOSE".into()], DETACH_TIMEOUT)
    }

    fn connect(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        host: &str,
        port: u16,
        mux: u8,
    ) -> Result<bool> {
        // Manual data retrieval on this connection.
        if !self.command_ok(chan, registry, &["+CIPRXGET=1".into()], DEFAULT_TIMEOUT)? {
            return Ok(false);
        }

        chan.send_command(&[
            "+CIPOPEN=".into(),
            mux.into(),
            ",\"TCP\",\"".into(),
            host.into(),
            "\",".into(),
            port.into(),
        ])?;
        let outcome = chan.await_response(
            CONNECT_TIMEOUT,
            &[b"\r\n+CIPOPEN:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )?;
        if outcome != WaitOutcome::Matched(1) {
            return Ok(false);
        }

        // "+CIPOPEN: <mux>,<err>", err 0 on success.
        let line = chan.sub_reader().read_until(b'\n', FIELD_TIMEOUT)?;
        let err = line
            .rsplit(',')
            .next()
            .and_then(|f| f.trim().parse::<i32>().ok())
            .unwrap_or(-1);
        debug!(mux, host, port, err, "connect result");
        Ok(err == 0)
    }

    fn send(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
        data: &[u8],
    ) -> Result<usize> {
        chan.send_command(&[
            "+CIPSEND=".into(),
            mux.into(),
            ",".into(),
            (data.len() as u64).into(),
        ])?;
        if !chan
            .await_response(DEFAULT_TIMEOUT, &[b">".as_slice(), ERR], &self.urc, registry, None)?
            .is_success()
        {
            return Ok(0);
        }

        chan.write_raw(data)?;
        chan.flush()?;

        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"\r\n+CIPSEND:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? != WaitOutcome::Matched(1)
        {
            return Ok(0);
        }

        // "+CIPSEND: <mux>,<requested>,<confirmed>"
        let mut io = chan.sub_reader();
        io.skip_until(b',', FIELD_TIMEOUT)?;
        io.skip_until(b',', FIELD_TIMEOUT)?;
        let confirmed = io.read_uint_until(b'\n', FIELD_TIMEOUT)?;
        debug!(mux, confirmed, "sent data");
        Ok(confirmed)
    }

    fn fetch_data(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
        max_len: usize,
    ) -> Result<usize> {
        let mode: u64 = match self.transfer_mode {
            TransferMode::Raw => 2,
            TransferMode::Hex => 3,
        };
        chan.send_command(&[
            "+CIPRXGET=".into(),
            mode.into(),
            ",".into(),
            mux.into(),
            ",".into(),
            (max_len as u64).into(),
        ])?;
        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"+CIPRXGET:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? != WaitOutcome::Matched(1)
        {
            return Ok(0);
        }

        // "+CIPRXGET: <mode>,<mux>,<granted>,<remaining>" then the payload.
        let (granted, remaining, payload) = {
            let mut io = chan.sub_reader();
            io.skip_until(b',', FIELD_TIMEOUT)?;
            io.skip_until(b',', FIELD_TIMEOUT)?;
            let granted = io.read_uint_until(b',', FIELD_TIMEOUT)?;
            let remaining = io.read_uint_until(b'\n', FIELD_TIMEOUT)?;

            let mut payload = Vec::with_capacity(granted);
            for _ in 0..granted {
                let byte = match self.transfer_mode {
                    TransferMode::Raw => match io.read_byte(FIELD_TIMEOUT)? {
                        Some(b) => b,
                        None => break,
                    },
                    TransferMode::Hex => {
                        let (Some(hi), Some(lo)) =
                            (io.read_byte(FIELD_TIMEOUT)?, io.read_byte(FIELD_TIMEOUT)?)
                        else {
                            break;
                        };
                        let pair = [hi, lo];
                        let text = std::str::from_utf8(&pair).unwrap_or("00");
                        u8::from_str_radix(text, 16).unwrap_or(0)
                    }
                };
                payload.push(byte);
            }
            (granted, remaining, payload)
        };

        if payload.len() < granted {
            warn!(
                mux,
                granted,
                got = payload.len(),
                "short payload from modem"
            );
        }
        registry.push_bytes(mux, &payload);
        registry.set_available(mux, remaining);

        // Trailing OK.
        chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        debug!(mux, granted, remaining, "fetched data");
        Ok(payload.len())
    }

    fn query_available(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<usize> {
        chan.send_command(&["+CIPRXGET=4,".into(), mux.into()])?;
        let mut count = 0;
        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"+CIPRXGET:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? == WaitOutcome::Matched(1)
        {
            let mut io = chan.sub_reader();
            io.skip_until(b',', FIELD_TIMEOUT)?;
            io.skip_until(b',', FIELD_TIMEOUT)?;
            count = io.read_uint_until(b'\n', FIELD_TIMEOUT)?;
            chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        }
        registry.set_available(mux, count);
        // An empty modem buffer is also what a dead link looks like, so
        // refresh the connection state.
        if count == 0 {
            self.query_connected(chan, registry, mux)?;
        }
        Ok(count)
    }

    fn query_connected(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<bool> {
        // One reply carries the state of every link:
        // "+CIPCLOSE: <link0>,<link1>,...,<link9>"
        chan.send_command(&["+CIPCLOSE?".into()])?;
        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"+CIPCLOSE:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? == WaitOutcome::Matched(1)
        {
            let line = chan.sub_reader().read_until(b'\n', FIELD_TIMEOUT)?;
            for (m, field) in line.split(',').enumerate() {
                let up = field.trim().parse::<u32>().unwrap_or(0) != 0;
                registry.set_connected(m as u8, up);
            }
            chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        }
        Ok(registry.is_connected(mux))
    }

    fn close(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
        mux: u8,
    ) -> Result<()> {
        chan.send_command(&["+CIPCLOSE=".into(), mux.into()])?;
        // ERROR here just means the link was already down.
        chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        Ok(())
    }

    fn modem_name(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<String> {
        chan.send_command(&["+CGMM".into()])?;
        let mut text = String::new();
        if !chan
            .await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, Some(&mut text))?
            .is_success()
        {
            return Ok("SIMCom SIM7600".to_string());
        }
        let name = text
            .trim_end_matches("OK")
            .trim()
            .replace('_', " ");
        Ok(name)
    }

    fn signal_quality(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<i32> {
        chan.send_command(&["+CSQ".into()])?;
        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"\r\n+CSQ:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? != WaitOutcome::Matched(1)
        {
            return Ok(99);
        }
        let rssi = chan.sub_reader().read_uint_until(b',', FIELD_TIMEOUT)? as i32;
        chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        Ok(rssi)
    }

    fn sim_status(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<SimStatus> {
        chan.send_command(&["+CPIN?".into()])?;
        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"\r\n+CPIN:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? != WaitOutcome::Matched(1)
        {
            return Ok(SimStatus::Error);
        }
        let verdict = chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"READY".as_slice(), b"SIM PIN".as_slice(), b"SIM PUK".as_slice()],
            &self.urc,
            registry,
            None,
        )?;
        // Consume the trailing OK.
        chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        Ok(match verdict {
            WaitOutcome::Matched(1) => SimStatus::Ready,
            WaitOutcome::Matched(2) | WaitOutcome::Matched(3) => SimStatus::Locked,
            _ => SimStatus::Error,
        })
    }

    fn local_ip(&self, chan: &mut CommandChannel, registry: &mut SocketRegistry) -> Result<String> {
        chan.send_command(&["+IPADDR".into()])?;
        let mut text = String::new();
        if !chan
            .await_response(
                SYNC_TIMEOUT,
                &[OK, ERR],
                &self.urc,
                registry,
                Some(&mut text),
            )?
            .is_success()
        {
            return Ok(String::new());
        }
        let ip = text
            .trim_end_matches("OK")
            .trim()
            .trim_start_matches("+IPADDR:")
            .trim()
            .to_string();
        Ok(ip)
    }

    fn battery_millivolts(
        &self,
        chan: &mut CommandChannel,
        registry: &mut SocketRegistry,
    ) -> Result<u32> {
        chan.send_command(&["+CBC".into()])?;
        if chan.await_response(
            DEFAULT_TIMEOUT,
            &[b"\r\n+CBC:".as_slice(), ERR],
            &self.urc,
            registry,
            None,
        )? != WaitOutcome::Matched(1)
        {
            return Ok(0);
        }
        let line = chan.sub_reader().read_until(b'\n', FIELD_TIMEOUT)?;
        let volts: f64 = line.trim_end_matches('V').trim().parse().unwrap_or(0.0);
        chan.await_response(DEFAULT_TIMEOUT, &[OK, ERR], &self.urc, registry, None)?;
        Ok((volts * 1000.0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let dialect = Sim7600::new();
        assert_eq!(dialect.name(), "SIM7600");
        assert_eq!(dialect.line_ending(), "\r\n");
        assert_eq!(dialect.max_send_len(), 1024);
        assert_eq!(dialect.transfer_mode, TransferMode::Raw);
    }

    #[test]
    fn transfer_mode_builder() {
        let dialect = Sim7600::new().with_transfer_mode(TransferMode::Hex);
        assert_eq!(dialect.transfer_mode, TransferMode::Hex);
    }
}
