//! Server Loop Module
//!
//! Binds a listening socket and serves clients strictly one at a time:
//! accept, TLS handshake, one framed receive, teardown, back to accept. A
//! slow client therefore blocks the next — an accepted simplicity
//! trade-off, since no state is shared between iterations. Any per-client
//! failure is logged and isolated to its iteration; only a bind failure at
//! startup is terminal.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::protocol::{self, Received};
use crate::session::Session;
use crate::tls::ServerTlsConfig;

/// Server configuration.
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Directory where received files are written.
    pub output_dir: PathBuf,
    /// TLS configuration.
    pub tls: ServerTlsConfig,
}

/// Secure file transfer server.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve forever.
    ///
    /// A bind failure is fatal and returns before the accept loop starts.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", self.config.bind_addr))?;

        info!("Secure server listening on {}", self.config.bind_addr);
        info!("Receiving files into {:?}", self.config.output_dir);

        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener, one at a time.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let acceptor = TlsAcceptor::from(self.config.tls.config.clone());

        loop {
            let (tcp, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };
            info!("Accepted connection from {}", peer);

            match self.handle_client(tcp, peer, &acceptor).await {
                Ok(received) => {
                    info!(
                        "Received file {} ({} bytes) from {}",
                        received.name, received.bytes, peer
                    );
                }
                Err(e) => warn!("Session with {} failed: {}", peer, e),
            }
            info!("Connection with {} closed", peer);
        }
    }

    /// One client's full lifecycle: handshake, receive, teardown. The
    /// session is closed on every exit path before the result propagates.
    async fn handle_client(
        &self,
        tcp: TcpStream,
        peer: SocketAddr,
        acceptor: &TlsAcceptor,
    ) -> Result<Received, Error> {
        let mut session = Session::accept(tcp, peer, acceptor).await?;
        let result = protocol::receive(&mut session, &self.config.output_dir).await;
        session.close().await;
        result
    }
}
