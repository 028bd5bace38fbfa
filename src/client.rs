//! Client Driver Module
//!
//! Single-shot: one invocation opens one session, sends one file, and
//! closes. The source file is checked before any network activity, so a
//! missing file never opens a socket. Whatever the transfer outcome, the
//! session is torn down before the result is reported.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::protocol;
use crate::session::Session;
use crate::tls::ClientTlsConfig;

/// Client configuration.
pub struct ClientConfig {
    /// Server address to connect to.
    pub server_addr: SocketAddr,
    /// TLS configuration (permissive by default, CA-verified on opt-in).
    pub tls: ClientTlsConfig,
}

/// Secure file transfer client.
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Send one file to the server and close the connection.
    ///
    /// Fails before connecting if the source path does not exist or is a
    /// directory. A failed transfer is reported after teardown; it is
    /// never retried.
    pub async fn send(&self, path: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("File not found: {:?}", path))?;
        if metadata.is_dir() {
            anyhow::bail!("Cannot send a directory: {:?}", path);
        }

        info!("Connecting to {}...", self.config.server_addr);
        let mut session = Session::connect(self.config.server_addr, &self.config.tls).await?;

        let result = protocol::send(&mut session, path).await;
        session.close().await;
        info!("Connection to {} closed", self.config.server_addr);

        let sent = result.with_context(|| format!("Failed to send {:?}", path))?;
        info!("File sent successfully ({} bytes)", sent);
        Ok(())
    }
}
