//! Digi XBee Wi-Fi dialect for atlink.
//!
//! The XBee is a command-mode module: it carries exactly one link, sends
//! payload as raw pass-through in data mode, and only accepts commands
//! after an escape sequence (guard silence, then `+++`). This crate
//! implements the [`ModemVariant`](atlink_core::ModemVariant) strategy for
//! it:
//!
//! - CR-only line ending, `OK\r` / `ERROR\r` terminators
//! - scoped command-mode entry/exit so the link is always returned to
//!   data mode, even when a sequence fails partway
//! - connect via `LA` (lookup), `DL` (destination IP) and `DE`
//!   (destination port, hex), then `WR`/`AC` to persist and apply
//! - inbound payload delivered inline by `+IPD` notifications; peer close
//!   signalled by a `<mux>,CLOSED` line
//!
//! Sessions for this dialect should size their registry with
//! [`MUX_COUNT`]; the single link is mux 0.

mod urc;
mod variant;

pub use variant::{XBee, MUX_COUNT};
