//! Secure single-file transfer over TLS
//!
//! A minimal file-transfer utility: the client opens a TLS connection and
//! streams one file, preceded by a 4-byte big-endian length-prefixed
//! filename; the server accepts connections one at a time and writes the
//! incoming byte stream to disk until the peer closes the stream.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a self-signed certificate pair (cert.pem / key.pem)
//! securexfer cert generate
//!
//! # Start the server (loopback only)
//! securexfer serve 8443
//!
//! # Send a file
//! securexfer send 127.0.0.1 8443 report.txt
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tls;

pub use client::{Client, ClientConfig};
pub use error::Error;
pub use protocol::Received;
pub use server::{Server, ServerConfig};
pub use session::Session;
pub use tls::{ClientTlsConfig, ServerTlsConfig};
