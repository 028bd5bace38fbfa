//! Transfer error taxonomy.
//!
//! Every failure a session or transfer can produce is one of these
//! variants. Drivers catch them at the session boundary, log them, and
//! tear the session down; nothing here is retried automatically.

use std::io;

use thiserror::Error;

/// Errors raised by the transport session and the framed transfer protocol.
#[derive(Error, Debug)]
pub enum Error {
    /// The TCP connection to the server could not be established.
    #[error("connection failed: {0}")]
    Connect(#[source] io::Error),

    /// The client-side TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The server-side TLS handshake failed.
    #[error("TLS accept failed: {0}")]
    Accept(#[source] io::Error),

    /// No I/O progress within the fixed session timeout.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Malformed framing: short header, short filename, or a filename the
    /// receiver refuses to write.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The peer closed the connection without a clean TLS shutdown.
    #[error("connection closed by peer")]
    Closed,

    /// Generic I/O failure while streaming payload bytes.
    #[error("transfer failed: {0}")]
    Transfer(#[from] io::Error),
}

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}
