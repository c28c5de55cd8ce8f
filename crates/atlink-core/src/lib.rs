//! Core types and traits for AT-command modem control.
//!
//! This crate provides the session engine shared by every modem dialect:
//!
//! - [`Session`]: the single-threaded engine owning the command channel and
//!   socket state
//! - [`Socket`]: stream-style handle to one multiplexed TCP connection
//! - [`ModemVariant`]: the strategy trait each chipset dialect implements
//! - [`CommandChannel`]: command formatting plus the terminator/notification
//!   scanner
//! - [`Transport`]: byte-level abstraction over serial ports, TCP bridges
//!   and test mocks
//! - [`Error`]: common error type
//!
//! Dialect crates (`atlink-sim7600`, `atlink-xbee`) implement
//! [`ModemVariant`]; transport crates implement [`Transport`]. Most
//! applications depend on the `atlink` facade crate instead of this one.

pub mod channel;
pub mod error;
pub mod fifo;
pub mod registry;
pub mod session;
pub mod socket;
pub mod transport;
pub mod variant;

pub use channel::{
    noop_yield, CommandChannel, Fragment, NoUrc, SubReader, UrcHandler, WaitOutcome, YieldHook,
};
pub use error::{Error, Result};
pub use registry::SocketRegistry;
pub use session::{Session, SessionConfig};
pub use socket::Socket;
pub use transport::Transport;
pub use variant::{ModemVariant, NetworkConfig, SimStatus};
