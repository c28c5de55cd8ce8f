//! Transport implementations for atlink.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](atlink_core::Transport) trait from `atlink-core` for the
//! physical links a radio module hangs off:
//!
//! - [`SerialTransport`]: UART and USB virtual COM port connections, the
//!   normal way to reach a cellular or Wi-Fi module
//! - [`TcpTransport`]: TCP connections to serial-over-network bridges
//!   (ser2net and friends), handy for bench setups
//!
//! # Example
//!
//! ```no_run
//! use atlink_transport::SerialTransport;
//!
//! # fn example() -> atlink_core::Result<()> {
//! // Modem modules commonly default to 115200 baud.
//! let transport = SerialTransport::open("/dev/ttyUSB2", 115200)?;
//! # Ok(())
//! # }
//! ```

pub mod serial;
pub mod tcp;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
pub use tcp::TcpTransport;
