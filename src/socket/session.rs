//! Per-connection relay session.

use std::net::Shutdown;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::BackendForwarder;
use crate::error::RelayResult;

use super::listener::RelayMetrics;

/// Drive one client connection through its request/response cycles.
///
/// Reads one bounded request at a time, forwards it to the backend and
/// writes the reply back, until the client stops sending. The connection
/// is shut down in both directions and closed before this returns, on
/// clean EOF and on error alike.
pub async fn run_session(
    mut stream: UnixStream,
    forwarder: &BackendForwarder,
    port: u32,
    buffer_size: usize,
    metrics: &RelayMetrics,
) -> RelayResult<()> {
    let session_id = Uuid::new_v4();
    metrics.record_session();

    let result = relay_cycles(&mut stream, forwarder, port, buffer_size, metrics, session_id).await;

    // Shut both directions down and close, whatever ended the session.
    match stream.into_std() {
        Ok(std_stream) => {
            if let Err(e) = std_stream.shutdown(Shutdown::Both) {
                debug!(%session_id, error = %e, "shutdown on already-closed connection");
            }
        }
        Err(e) => warn!(%session_id, error = %e, "failed to recover stream for shutdown"),
    }

    match &result {
        Ok(()) => debug!(%session_id, "session closed"),
        Err(e) => warn!(%session_id, error = %e, "session failed"),
    }

    result
}

/// The request/response loop: `AWAIT_REQUEST -> FORWARD -> RESPOND`.
async fn relay_cycles(
    stream: &mut UnixStream,
    forwarder: &BackendForwarder,
    port: u32,
    buffer_size: usize,
    metrics: &RelayMetrics,
    session_id: Uuid,
) -> RelayResult<()> {
    let mut buf = vec![0u8; buffer_size];

    loop {
        // One bounded read is one request; the client signals it is done
        // by closing its write side.
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        debug!(%session_id, bytes = n, "request received");

        match relay_one(stream, forwarder, port, &buf[..n]).await {
            Ok(reply_len) => {
                metrics.record_request(true);
                debug!(%session_id, bytes = reply_len, "reply sent");
            }
            Err(e) => {
                metrics.record_request(false);
                return Err(e);
            }
        }
    }
}

/// Forward one request and write the backend's reply back to the client.
async fn relay_one(
    stream: &mut UnixStream,
    forwarder: &BackendForwarder,
    port: u32,
    request: &[u8],
) -> RelayResult<usize> {
    let reply = forwarder.forward(port, request).await?;
    stream.write_all(&reply).await?;
    Ok(reply.len())
}
