//! # atlink -- AT-Command Modem Sessions for Rust
//!
//! `atlink` drives cellular and Wi-Fi modems over their serial AT-command
//! channel and multiplexes TCP sockets across it. It is designed for
//! gateways, dataloggers, and remote telemetry where a modem is the only
//! uplink and the host cannot afford a background thread per socket.
//!
//! ## Quick Start
//!
//! Add `atlink` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! atlink = { version = "0.1", features = ["sim7600"] }
//! ```
//!
//! Attach to the cellular network and talk to a server:
//!
//! ```no_run
//! use atlink::sim7600::Sim7600;
//! use atlink::transport::SerialTransport;
//! use atlink::{NetworkConfig, Session, SessionConfig};
//!
//! fn main() -> atlink::Result<()> {
//!     let port = SerialTransport::open("/dev/ttyUSB2", 115_200)?;
//!     let session = Session::new(
//!         Box::new(port),
//!         Box::new(Sim7600::new()),
//!         SessionConfig::default(),
//!     );
//!
//!     session.begin()?;
//!     session.attach_network(&NetworkConfig::Cellular {
//!         apn: "internet",
//!         user: None,
//!         password: None,
//!     })?;
//!
//!     let socket = session.socket(0)?;
//!     socket.connect("example.org", 80)?;
//!     socket.write(b"GET / HTTP/1.0\r\nHost: example.org\r\n\r\n")?;
//!
//!     let mut buf = [0u8; 512];
//!     while socket.connected()? {
//!         let n = socket.read(&mut buf)?;
//!         if n > 0 {
//!             print!("{}", String::from_utf8_lossy(&buf[..n]));
//!         }
//!         session.maintain()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                         |
//! |-----------------------|-------------------------------------------------|
//! | `atlink-core`         | Session engine, command channel, socket registry |
//! | `atlink-transport`    | Serial and TCP transport implementations        |
//! | `atlink-sim7600`      | SIMCom SIM7600 cellular dialect                 |
//! | `atlink-xbee`         | Digi XBee Wi-Fi dialect (command mode)          |
//! | `atlink-test-harness` | Scripted mock transport for tests               |
//! | **`atlink`**          | This facade crate -- re-exports everything      |
//!
//! Every dialect implements the [`ModemVariant`] trait, so application code
//! can hold a `Box<dyn ModemVariant>` and stay modem-agnostic.
//!
//! ## Feature Flags
//!
//! Each dialect is gated behind a feature flag:
//!
//! | Feature   | Enables                             | Default |
//! |-----------|-------------------------------------|---------|
//! | `sim7600` | [`sim7600`] module (SIMCom cellular) | yes     |
//! | `xbee`    | [`xbee`] module (Digi Wi-Fi)        | yes     |
//! | `full`    | All dialects                        | no      |
//!
//! ## Concurrency Model
//!
//! A [`Session`] is single-threaded by design. Every call runs on the
//! caller's thread as a bounded poll; unsolicited modem traffic is absorbed
//! whenever any socket operation (or [`Session::maintain`]) touches the
//! wire. There are no locks and no background reader to coordinate with.
//! Long waits invoke the session's yield hook so cooperative schedulers
//! can run other work.

pub use atlink_core::*;

/// Serial and TCP transports.
///
/// Provides [`SerialTransport`](transport::SerialTransport) for modems on a
/// UART or USB CDC port and [`TcpTransport`](transport::TcpTransport) for
/// modems reachable through a serial-over-network bridge.
pub mod transport {
    pub use atlink_transport::*;
}

/// SIMCom SIM7600 cellular dialect.
///
/// Provides [`Sim7600`](sim7600::Sim7600): CRLF framing, up to ten
/// concurrent links, explicit retrieval of buffered receive data, and
/// cellular attach via PDP context activation.
#[cfg(feature = "sim7600")]
pub mod sim7600 {
    pub use atlink_sim7600::*;
}

/// Digi XBee Wi-Fi dialect.
///
/// Provides [`XBee`](xbee::XBee): CR framing, a single transparent-mode
/// link, command-mode escape sequences for control traffic, and Wi-Fi
/// attach via the module's association registers.
#[cfg(feature = "xbee")]
pub mod xbee {
    pub use atlink_xbee::*;
}

/// Names of the dialects compiled into this build.
///
/// Useful for diagnostics and for applications that present a modem picker.
pub fn supported_dialects() -> Vec<&'static str> {
    let mut dialects = Vec::new();

    #[cfg(feature = "sim7600")]
    dialects.push("SIM7600");

    #[cfg(feature = "xbee")]
    dialects.push("XBee");

    dialects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_dialects_reflects_features() {
        let dialects = supported_dialects();

        #[cfg(feature = "sim7600")]
        assert!(dialects.contains(&"SIM7600"));

        #[cfg(feature = "xbee")]
        assert!(dialects.contains(&"XBee"));
    }
}
