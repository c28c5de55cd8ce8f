//! Test harness for atlink development.
//!
//! Provides [`MockTransport`], a scripted implementation of
//! [`Transport`](atlink_core::Transport) that plays back expected
//! command/response exchanges and can inject unsolicited notification bytes
//! mid-stream. Dialect crates use it to test full session flows without a
//! modem on the bench.

pub mod mock;

pub use mock::{MockHandle, MockTransport};
