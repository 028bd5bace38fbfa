//! Transport Session Module
//!
//! A [`Session`] is one encrypted duplex byte stream bound to exactly one
//! TCP connection. It owns the handshake (client connect or server
//! accept), bounded read/write, and teardown. Sessions are exclusively
//! owned by the driver that created them and are never shared across
//! tasks; `close` consumes the session, so teardown runs exactly once per
//! lifecycle by construction.
//!
//! The session is generic over the underlying stream so the protocol layer
//! can be exercised over an in-memory pipe in tests; production code runs
//! it over `tokio_rustls::TlsStream<TcpStream>`. A TLS-layer wait for more
//! ciphertext parks the read inside the async runtime and never surfaces
//! to callers — only a clean EOF, an abrupt close, or a hard I/O failure
//! does.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};
use tracing::{debug, info};

use crate::error::Error;
use crate::tls::ClientTlsConfig;

/// Fixed bound on connect, handshake, and each read/write call.
pub const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// One encrypted connection with bounded I/O and exactly-once teardown.
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
}

impl Session<TlsStream<TcpStream>> {
    /// Open a TCP connection to `addr` and upgrade it to TLS.
    ///
    /// Both the connect and the handshake are bounded by [`IO_TIMEOUT`].
    /// The negotiated protocol version and cipher suite are logged for the
    /// operator; they carry no protocol meaning.
    pub async fn connect(addr: SocketAddr, tls: &ClientTlsConfig) -> Result<Self, Error> {
        let tcp = timeout(IO_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout("connect"))?
            .map_err(Error::Connect)?;
        debug!("TCP connection established to {}", addr);

        let connector = TlsConnector::from(tls.config.clone());
        let stream = timeout(IO_TIMEOUT, connector.connect(tls.server_name.clone(), tcp))
            .await
            .map_err(|_| Error::Timeout("TLS handshake"))?
            .map_err(Error::Handshake)?;

        let (_, conn) = stream.get_ref();
        if let Some(version) = conn.protocol_version() {
            info!("TLS version: {:?}", version);
        }
        if let Some(suite) = conn.negotiated_cipher_suite() {
            info!("Cipher: {:?}", suite.suite());
        }

        Ok(Self {
            stream: TlsStream::Client(stream),
            peer: addr,
        })
    }

    /// Upgrade an accepted TCP connection to a server-side TLS session.
    pub async fn accept(
        tcp: TcpStream,
        peer: SocketAddr,
        acceptor: &TlsAcceptor,
    ) -> Result<Self, Error> {
        let stream = timeout(IO_TIMEOUT, acceptor.accept(tcp))
            .await
            .map_err(|_| Error::Timeout("TLS accept"))?
            .map_err(Error::Accept)?;

        let (_, conn) = stream.get_ref();
        if let Some(version) = conn.protocol_version() {
            info!("TLS connection established with {} ({:?})", peer, version);
        }
        if let Some(suite) = conn.negotiated_cipher_suite() {
            debug!("Cipher: {:?}", suite.suite());
        }

        Ok(Self {
            stream: TlsStream::Server(stream),
            peer,
        })
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    /// Wrap an already-established secure stream.
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    /// Peer address, for reporting.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Read up to `buf.len()` bytes, bounded by [`IO_TIMEOUT`].
    ///
    /// `Ok(0)` is a clean EOF. An abrupt close by the peer (reset, or EOF
    /// without a TLS close_notify) is reported as [`Error::Closed`]; any
    /// other failure as [`Error::Transfer`].
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match timeout(IO_TIMEOUT, self.stream.read(buf)).await {
            Err(_) => Err(Error::Timeout("read")),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) if is_abrupt_close(&e) => Err(Error::Closed),
            Ok(Err(e)) => Err(Error::Transfer(e)),
        }
    }

    /// Write all of `buf`, bounded by [`IO_TIMEOUT`].
    ///
    /// Either every byte is written or an error is returned; a silent
    /// partial write is not a possible outcome.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        match timeout(IO_TIMEOUT, self.stream.write_all(buf)).await {
            Err(_) => Err(Error::Timeout("write")),
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if is_abrupt_close(&e) => Err(Error::Closed),
            Ok(Err(e)) => Err(Error::Transfer(e)),
        }
    }

    /// Tear the session down: flush, signal duplex shutdown (close_notify
    /// over TLS), and release the connection. Shutdown failures are
    /// swallowed; the connection is released regardless.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("shutdown of connection to {} ignored: {}", self.peer, e);
        }
        debug!("connection to {} closed", self.peer);
    }
}

fn is_abrupt_close(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
