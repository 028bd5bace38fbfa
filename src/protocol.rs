//! Framed Transfer Protocol Module
//!
//! Exactly one file per session, framed as:
//!
//! ```text
//! +-------------------+------------------+------------------------+
//! | name length (4,   | filename         | raw file content until |
//! | u32 big-endian)   | (UTF-8, N bytes) | the stream closes      |
//! +-------------------+------------------+------------------------+
//! ```
//!
//! The payload carries no length prefix and no end marker: the sender
//! closes the session after the last chunk and the receiver treats stream
//! closure as end of file. The receiver must consume exactly the 4 header
//! bytes and exactly `N` filename bytes before any byte counts as payload.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, trace};

use crate::error::Error;
use crate::session::Session;

/// Chunk size for streaming the payload.
pub const CHUNK_SIZE: usize = 1024;

/// Upper bound on the filename length field. A header above this is a
/// protocol violation, not an allocation request.
pub const MAX_NAME_LEN: usize = 1024;

/// How long the receive loop waits for readable data before it re-polls.
/// This is a responsiveness check, not a transfer timeout: an elapsed
/// window alone never fails the transfer.
pub const POLL_WAIT: Duration = Duration::from_secs(5);

/// Outcome of one successful receive.
#[derive(Debug)]
pub struct Received {
    /// Filename as decoded from the frame header.
    pub name: String,
    /// Payload bytes written to the sink.
    pub bytes: u64,
}

/// Send one file over an open session.
///
/// Writes the frame header (basename only — directory components are
/// stripped), then streams the content in [`CHUNK_SIZE`] chunks with an
/// advisory progress bar. The caller owns the session and must close it
/// after this returns; that closure is the receiver's end-of-file signal.
pub async fn send<S>(session: &mut Session<S>, path: &Path) -> Result<u64, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::protocol("source path has no usable file name"))?;

    let total = tokio::fs::metadata(path).await?.len();

    // Header: 4-byte big-endian name length, then the name itself.
    let mut header = Vec::with_capacity(4 + name.len());
    header.extend_from_slice(&(name.len() as u32).to_be_bytes());
    header.extend_from_slice(name.as_bytes());
    session.write_all(&header).await?;

    debug!("sending {} ({} bytes) to {}", name, total, session.peer());

    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut sent: u64 = 0;

    let pb = progress_bar(total);
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        session.write_all(&buf[..n]).await?;
        sent += n as u64;
        pb.set_position(sent);
    }
    pb.finish_with_message("sent");

    Ok(sent)
}

/// Receive one file over an open session, writing it into `dir`.
///
/// Reads the frame header exactly, validates the filename, then appends
/// payload chunks until the peer closes the stream — either a clean EOF or
/// an abrupt close mid-read counts as completion. Each read waits at most
/// [`POLL_WAIT`] for data and simply re-polls when the window elapses. On
/// any other error the receive aborts and partial content stays on disk.
pub async fn receive<S>(session: &mut Session<S>, dir: &Path) -> Result<Received, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut len_buf = [0u8; 4];
    read_header(session, &mut len_buf).await?;
    let name_len = u32::from_be_bytes(len_buf) as usize;
    if name_len == 0 || name_len > MAX_NAME_LEN {
        return Err(Error::protocol(format!(
            "filename length {} outside 1..={}",
            name_len, MAX_NAME_LEN
        )));
    }

    let mut name_buf = vec![0u8; name_len];
    read_header(session, &mut name_buf).await?;
    let name = String::from_utf8(name_buf)
        .map_err(|_| Error::protocol("filename is not valid UTF-8"))?;
    let name = validate_name(&name)?;

    info!("receiving file {} from {}", name, session.peer());

    let file = File::create(dir.join(&name)).await?;
    let mut writer = BufWriter::new(file);
    let mut buf = [0u8; CHUNK_SIZE];
    let mut received: u64 = 0;

    loop {
        let n = match timeout(POLL_WAIT, session.read(&mut buf)).await {
            // No data inside the poll window: go around again.
            Err(_) => {
                trace!("no data from {} yet, polling again", session.peer());
                continue;
            }
            // Clean EOF or peer closed mid-read: the payload is complete.
            Ok(Ok(0)) | Ok(Err(Error::Closed)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e),
        };
        writer.write_all(&buf[..n]).await?;
        received += n as u64;
    }
    writer.flush().await?;

    Ok(Received { name, bytes: received })
}

/// Read exactly `buf.len()` header bytes. A stream that closes short is a
/// framing violation, never a silent truncation.
async fn read_header<S>(session: &mut Session<S>, buf: &mut [u8]) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match session.read(&mut buf[filled..]).await {
            Ok(0) | Err(Error::Closed) => {
                return Err(Error::protocol(format!(
                    "stream closed after {} of {} header bytes",
                    filled,
                    buf.len()
                )));
            }
            Ok(n) => filled += n,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Reject names the receiver refuses to write: empty names, anything with
/// a path separator, and the dot entries. The sender only ever transmits a
/// basename, so a separator here is an attack or a broken peer.
fn validate_name(name: &str) -> Result<String, Error> {
    if name.is_empty() {
        return Err(Error::protocol("empty filename"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(Error::protocol("filename contains a path separator"));
    }
    if name == "." || name == ".." {
        return Err(Error::protocol("filename is a directory reference"));
    }
    Ok(name.to_string())
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent}% {bytes}/{total_bytes}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}
