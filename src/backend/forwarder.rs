//! Backend request forwarding.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{RelayError, RelayResult};

/// Backends are always reached over the local loopback interface.
pub const BACKEND_HOST: &str = "127.0.0.1";

/// Forwards a payload to a local TCP backend and collects the reply.
///
/// Each call opens a fresh connection, writes the payload and drains the
/// reply until the backend closes its write side; connections are never
/// reused.
#[derive(Debug, Clone)]
pub struct BackendForwarder {
    buffer_size: usize,
}

impl BackendForwarder {
    /// Create a forwarder reading replies in chunks of `buffer_size`.
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Forward one payload to the backend on `port` and return the reply.
    ///
    /// The reply is everything the backend sends until end-of-stream. The
    /// connection is closed when this returns, on success or error; no
    /// retry is attempted.
    pub async fn forward(&self, port: u32, payload: &[u8]) -> RelayResult<Vec<u8>> {
        let addr = format!("{}:{}", BACKEND_HOST, port);
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| RelayError::Backend {
                port,
                message: format!("connect to {} failed: {}", addr, e),
            })?;

        stream.write_all(payload).await?;

        let mut reply = Vec::new();
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            reply.extend_from_slice(&buf[..n]);
        }

        debug!(
            port,
            sent = payload.len(),
            received = reply.len(),
            "Backend round trip complete"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Backend that reads one chunk, echoes it back in pieces and closes.
    async fn chunked_echo_backend() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind backend");
        let port = listener.local_addr().expect("backend addr").port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                if let Ok(n) = stream.read(&mut buf).await {
                    for chunk in buf[..n].chunks(3) {
                        if stream.write_all(chunk).await.is_err() {
                            return;
                        }
                    }
                }
                // dropping the stream half-closes and ends the reply
            }
        });
        port
    }

    #[tokio::test]
    async fn test_forward_collects_reply_until_close() {
        let port = chunked_echo_backend().await;
        // A tiny buffer forces the reply to be drained over several reads.
        let forwarder = BackendForwarder::new(4);

        let reply = forwarder
            .forward(u32::from(port), b"payload across chunks")
            .await
            .expect("round trip");
        assert_eq!(reply, b"payload across chunks");
    }

    #[tokio::test]
    async fn test_forward_fails_when_backend_absent() {
        // Grab a free port, then close the listener so nothing is there.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let forwarder = BackendForwarder::new(1024);

        let err = forwarder
            .forward(u32::from(port), b"anyone home?")
            .await
            .expect_err("connect must fail");
        assert!(matches!(err, RelayError::Backend { .. }));
    }
}
