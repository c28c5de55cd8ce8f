//! SIMCom SIM7600 dialect for atlink.
//!
//! The SIM7600 is a multi-band LTE Cat-1/Cat-4 module speaking the SIMCom
//! flavor of the AT command set. This crate implements the
//! [`ModemVariant`](atlink_core::ModemVariant) strategy for it:
//!
//! - up to 10 TCP connections multiplexed over one UART (`+CIPOPEN`)
//! - manual receive retrieval via `+CIPRXGET`, raw or hex transfer
//! - cellular attach through the embedded TCP/IP stack (`+NETOPEN`)
//! - data-ready, inbound-length and peer-close notifications intercepted
//!   mid-wait
//!
//! # Example
//!
//! ```no_run
//! use atlink_core::{NetworkConfig, Session, SessionConfig};
//! use atlink_sim7600::Sim7600;
//! use atlink_transport::SerialTransport;
//! # fn main() -> atlink_core::Result<()> {
//! let port = SerialTransport::open("/dev/ttyUSB2", 115200)?;
//! let session = Session::new(
//!     Box::new(port),
//!     Box::new(Sim7600::new()),
//!     SessionConfig::default(),
//! );
//! session.begin()?;
//! session.attach_network(&NetworkConfig::Cellular {
//!     apn: "internet",
//!     user: None,
//!     password: None,
//! })?;
//! let socket = session.socket(0)?;
//! socket.connect("example.org", 80)?;
//! # Ok(())
//! # }
//! ```

mod urc;
mod variant;

pub use variant::{Sim7600, TransferMode, MUX_COUNT};
