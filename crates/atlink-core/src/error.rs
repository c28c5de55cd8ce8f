//! Error types for atlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Note that *protocol outcomes* -- a
//! command that timed out or matched its failure terminator -- are not
//! errors: they surface as [`WaitOutcome::Timeout`](crate::channel::WaitOutcome)
//! or as a `false`/zero status value. `Error` is reserved for conditions
//! that make the operation itself meaningless: a broken transport, a bad
//! parameter, an operation the selected modem variant does not support.

/// The error type for all atlink operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port, TCP socket).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed response, mock expectation mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An invalid parameter was passed to a session or socket operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested operation is not supported by this modem variant.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// No connection to the modem has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the modem was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
