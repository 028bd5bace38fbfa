//! End-to-end transfer tests over a real TLS loopback connection.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use securexfer::tls::generate_self_signed_cert;
use securexfer::{Client, ClientConfig, ClientTlsConfig, Server, ServerConfig, ServerTlsConfig};

fn server_tls() -> ServerTlsConfig {
    let cert = generate_self_signed_cert(
        "localhost",
        &["localhost"],
        &["127.0.0.1".parse().unwrap()],
    )
    .unwrap();
    ServerTlsConfig::from_pem(&cert.cert_pem, &cert.key_pem).unwrap()
}

async fn spawn_server(output_dir: PathBuf) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(ServerConfig {
        bind_addr: addr,
        output_dir,
        tls: server_tls(),
    });
    let handle = tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    (addr, handle)
}

fn client_for(addr: SocketAddr) -> Client {
    Client::new(ClientConfig {
        server_addr: addr,
        tls: ClientTlsConfig::insecure("127.0.0.1").unwrap(),
    })
}

/// The server writes the file after the client closes, so give it a moment.
async fn wait_for_file(path: &Path, expected_len: u64) -> Vec<u8> {
    for _ in 0..100 {
        if let Ok(content) = tokio::fs::read(path).await {
            if content.len() as u64 == expected_len {
                return content;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("file {:?} did not reach {} bytes in time", path, expected_len);
}

#[tokio::test]
async fn transfers_a_file_over_tls() {
    let out = tempfile::tempdir().unwrap();
    let (addr, server) = spawn_server(out.path().to_path_buf()).await;

    let src = tempfile::tempdir().unwrap();
    let content: Vec<u8> = (0..2500u32).map(|i| (i * 7 % 256) as u8).collect();
    let path = src.path().join("report.txt");
    tokio::fs::write(&path, &content).await.unwrap();

    client_for(addr).send(&path).await.unwrap();

    let received = wait_for_file(&out.path().join("report.txt"), 2500).await;
    assert_eq!(received, content);

    server.abort();
}

#[tokio::test]
async fn transfers_an_empty_file_without_blocking() {
    let out = tempfile::tempdir().unwrap();
    let (addr, server) = spawn_server(out.path().to_path_buf()).await;

    let src = tempfile::tempdir().unwrap();
    let path = src.path().join("empty.dat");
    tokio::fs::write(&path, b"").await.unwrap();

    client_for(addr).send(&path).await.unwrap();

    let received = wait_for_file(&out.path().join("empty.dat"), 0).await;
    assert!(received.is_empty());

    server.abort();
}

#[tokio::test]
async fn serves_again_after_a_failed_session() {
    let out = tempfile::tempdir().unwrap();
    let (addr, server) = spawn_server(out.path().to_path_buf()).await;

    // A client that speaks no TLS at all fails that iteration only.
    {
        use tokio::io::AsyncWriteExt;
        let mut raw = tokio::net::TcpStream::connect(addr).await.unwrap();
        raw.write_all(b"not a TLS hello").await.unwrap();
        drop(raw);
    }

    let src = tempfile::tempdir().unwrap();
    let content = b"still serving".to_vec();
    let path = src.path().join("after.txt");
    tokio::fs::write(&path, &content).await.unwrap();

    client_for(addr).send(&path).await.unwrap();

    let received = wait_for_file(&out.path().join("after.txt"), content.len() as u64).await;
    assert_eq!(received, content);

    server.abort();
}

#[tokio::test]
async fn missing_source_file_never_opens_a_socket() {
    // A listener that nothing should ever connect to.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let err = client_for(addr)
        .send(Path::new("/definitely/not/here.bin"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("File not found"), "got {err:#}");

    let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(accepted.is_err(), "client opened a connection before the file check");
}

#[tokio::test]
async fn bind_conflict_fails_at_startup() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();

    let server = Server::new(ServerConfig {
        bind_addr: addr,
        output_dir: PathBuf::from("."),
        tls: server_tls(),
    });

    let err = server.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to bind"), "got {err:#}");
}
