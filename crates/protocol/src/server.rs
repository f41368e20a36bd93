//! The local stream socket server (spec §4.10): binds a `UnixListener`,
//! accepts connections concurrently, and frames NUL-terminated XML request/
//! response documents on each one independently.

use std::io;
use std::path::Path;

use fsal_manager::FsDbManager;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

use crate::request::ParsedRequest;
use crate::response::Response;

/// Removes any stale socket file, binds a fresh `UnixListener`, and accepts
/// connections until `shutdown` is signalled. Each connection is handled by
/// its own task so a slow or misbehaving client cannot block the others.
pub async fn serve(manager: FsDbManager, socket_path: &Path, mut shutdown: watch::Receiver<bool>) -> io::Result<()> {
    match std::fs::remove_file(socket_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!(path = %socket_path.display(), "protocol server listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _addr) = accepted?;
                let manager = manager.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(&manager, stream).await {
                        tracing::debug!(error = %err, "connection closed with an I/O error");
                    }
                });
            }
            _ = shutdown.changed() => {
                tracing::info!("protocol server shutting down");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

/// Reads and answers every pipelined request on one connection until the
/// client disconnects or sends malformed XML.
async fn handle_connection(manager: &FsDbManager, mut stream: UnixStream) -> io::Result<()> {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    loop {
        let Some(document) = next_document(&mut stream, &mut buf, &mut chunk).await? else {
            return Ok(());
        };

        let response_bytes = match ParsedRequest::parse(&document) {
            Ok(request) => crate::dispatch::dispatch(manager, &request).await,
            Err(err) => {
                tracing::warn!(error = %err, "malformed request, closing connection");
                let rendered = Response::error(err.to_string()).render();
                stream.write_all(&rendered).await?;
                stream.write_all(&[0]).await?;
                return Ok(());
            }
        };

        stream.write_all(&response_bytes).await?;
        stream.write_all(&[0]).await?;
    }
}

/// Reads until a NUL byte is observed, returning everything before it.
/// Bytes already buffered past the NUL (a pipelined next request) are kept
/// in `buf` for the following call. Returns `Ok(None)` on a clean EOF with
/// nothing buffered.
async fn next_document(
    stream: &mut UnixStream,
    buf: &mut Vec<u8>,
    chunk: &mut [u8],
) -> io::Result<Option<Vec<u8>>> {
    loop {
        if let Some(pos) = buf.iter().position(|&b| b == 0) {
            let document = buf[..pos].to_vec();
            buf.drain(..=pos);
            return Ok(Some(document));
        }

        let n = stream.read(chunk).await?;
        if n == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-request"))
            };
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
