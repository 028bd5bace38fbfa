//! Secure file transfer CLI entry point.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use securexfer::client::{Client, ClientConfig};
use securexfer::server::{Server, ServerConfig};
use securexfer::tls::{
    generate_self_signed_cert, save_cert_and_key, ClientTlsConfig, ServerTlsConfig,
};

/// Secure single-file transfer over TLS.
#[derive(Parser)]
#[command(name = "securexfer")]
#[command(version = "0.1.0")]
#[command(about = "Send a single file over a TLS-encrypted connection", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one file to a server
    Send {
        /// Server IP address
        server_ip: IpAddr,

        /// Server port (1024-65535)
        #[arg(value_parser = port_in_range)]
        server_port: u16,

        /// Path of the file to send
        file: PathBuf,

        /// CA certificate for server verification; without it the server
        /// certificate is accepted unverified
        #[arg(long)]
        ca: Option<PathBuf>,

        /// Server name for TLS verification (defaults to the IP)
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Receive files, one connection at a time (binds loopback only)
    Serve {
        /// Port to listen on (1024-65535)
        #[arg(value_parser = port_in_range)]
        port: u16,

        /// Server certificate (PEM)
        #[arg(long, default_value = "cert.pem")]
        cert: PathBuf,

        /// Server private key (PEM)
        #[arg(long, default_value = "key.pem")]
        key: PathBuf,

        /// Directory to write received files into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Certificate management
    Cert {
        #[command(subcommand)]
        action: CertCommands,
    },
}

#[derive(Subcommand)]
enum CertCommands {
    /// Generate a self-signed certificate pair for development
    Generate {
        /// Output directory for cert.pem and key.pem
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Common name for the certificate
        #[arg(long, default_value = "localhost")]
        cn: String,
    },
}

fn port_in_range(s: &str) -> Result<u16, String> {
    let port: u32 = s.parse().map_err(|_| "port should be a number".to_string())?;
    if (1024..=65535).contains(&port) {
        Ok(port as u16)
    } else {
        Err("port number should be between 1024 and 65535".to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Send {
            server_ip,
            server_port,
            file,
            ca,
            hostname,
        } => run_send(server_ip, server_port, &file, ca, hostname).await,
        Commands::Serve {
            port,
            cert,
            key,
            output,
        } => run_serve(port, &cert, &key, output).await,
        Commands::Cert { action } => run_cert(action),
    }
}

async fn run_send(
    server_ip: IpAddr,
    server_port: u16,
    file: &PathBuf,
    ca: Option<PathBuf>,
    hostname: Option<String>,
) -> Result<()> {
    let server_name = hostname.unwrap_or_else(|| server_ip.to_string());
    let tls = match ca {
        Some(ca_path) => ClientTlsConfig::with_ca(&ca_path, &server_name)?,
        None => ClientTlsConfig::insecure(&server_name)?,
    };

    let client = Client::new(ClientConfig {
        server_addr: SocketAddr::new(server_ip, server_port),
        tls,
    });
    client.send(file).await
}

async fn run_serve(port: u16, cert: &PathBuf, key: &PathBuf, output: PathBuf) -> Result<()> {
    let tls = ServerTlsConfig::from_files(cert, key)?;

    let server = Server::new(ServerConfig {
        bind_addr: SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port),
        output_dir: output,
        tls,
    });
    server.run().await
}

fn run_cert(action: CertCommands) -> Result<()> {
    match action {
        CertCommands::Generate { output, cn } => {
            let cert = generate_self_signed_cert(
                &cn,
                &[cn.as_str()],
                &["127.0.0.1".parse().unwrap()],
            )?;

            std::fs::create_dir_all(&output)?;
            let cert_path = output.join("cert.pem");
            let key_path = output.join("key.pem");
            save_cert_and_key(&cert.cert_pem, &cert.key_pem, &cert_path, &key_path)?;

            info!("Certificate ready");
            info!("  Server: securexfer serve <PORT> --cert {:?} --key {:?}", cert_path, key_path);
            info!("  Client: securexfer send <IP> <PORT> <FILE> --ca {:?}", cert_path);
            Ok(())
        }
    }
}
