//! Domain socket listener lifecycle.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::backend::BackendForwarder;
use crate::config::Settings;
use crate::error::{RelayError, RelayResult};

use super::name::SocketName;
use super::session;

/// Accept backlog: one pending connection may queue while the current
/// session drains.
const ACCEPT_BACKLOG: i32 = 1;

/// Relay counters for monitoring.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total accepted sessions.
    pub sessions_total: AtomicU64,
    /// Total relayed requests.
    pub requests_total: AtomicU64,
    /// Total failed requests.
    pub requests_failed: AtomicU64,
}

impl RelayMetrics {
    /// Create new relay metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment session count.
    pub fn record_session(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment request count.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get total session count.
    pub fn sessions(&self) -> u64 {
        self.sessions_total.load(Ordering::Relaxed)
    }

    /// Get total request count.
    pub fn requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get failed request count.
    pub fn failed(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }
}

/// Domain socket relay server.
///
/// Owns the socket file from bind to cleanup and serves one client
/// connection at a time.
#[derive(Debug)]
pub struct RelayListener {
    listener: UnixListener,
    socket_path: PathBuf,
    socket_name: SocketName,
    forwarder: BackendForwarder,
    buffer_size: usize,
    metrics: Arc<RelayMetrics>,
}

impl RelayListener {
    /// Create and bind a relay listener on `path`.
    ///
    /// Derives the backend port from the socket filename, removes a stale
    /// socket file if one is present, binds with a minimal backlog and
    /// applies the configured socket file permissions.
    pub fn bind(path: &Path, settings: &Settings) -> RelayResult<Self> {
        let socket_name = SocketName::parse(&path.to_string_lossy())?;

        remove_stale_socket(path)?;

        let socket = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(|e| {
            RelayError::Socket {
                message: format!("Failed to create socket: {}", e),
            }
        })?;
        let addr = SockAddr::unix(path).map_err(|e| RelayError::Socket {
            message: format!("Invalid socket path {}: {}", path.display(), e),
        })?;
        socket.bind(&addr).map_err(|e| RelayError::Socket {
            message: format!("Failed to bind to socket {}: {}", path.display(), e),
        })?;
        socket.listen(ACCEPT_BACKLOG).map_err(|e| RelayError::Socket {
            message: format!("Failed to listen on socket {}: {}", path.display(), e),
        })?;

        let std_listener: std::os::unix::net::UnixListener = socket.into();
        std_listener
            .set_nonblocking(true)
            .map_err(|e| RelayError::Socket {
                message: format!("Failed to set non-blocking: {}", e),
            })?;
        let listener = UnixListener::from_std(std_listener).map_err(|e| RelayError::Socket {
            message: format!("Failed to register listener: {}", e),
        })?;

        set_socket_permissions(path, &settings.socket.permissions)?;

        info!(
            path = %path.display(),
            name = %socket_name.name,
            port = socket_name.port,
            "Relay listener bound"
        );

        Ok(Self {
            listener,
            socket_path: path.to_path_buf(),
            socket_name,
            forwarder: BackendForwarder::new(settings.relay.buffer_size),
            buffer_size: settings.relay.buffer_size,
            metrics: Arc::new(RelayMetrics::new()),
        })
    }

    /// Get relay metrics.
    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Get the parsed socket name.
    pub fn socket_name(&self) -> &SocketName {
        &self.socket_name
    }

    /// Accept and serve connections, one session at a time.
    ///
    /// A session runs to completion before the next `accept` is entered; a
    /// second client queues at the transport layer meanwhile. The loop
    /// exits when `shutdown` is notified, after which the socket file is
    /// unlinked and the closed notification logged. A session or accept
    /// error propagates instead and skips the cleanup.
    pub async fn run(&self, shutdown: Arc<Notify>) -> RelayResult<()> {
        info!("Relay listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, _addr) = result.map_err(|e| RelayError::Socket {
                        message: format!("Failed to accept connection: {}", e),
                    })?;

                    match stream.peer_cred() {
                        Ok(cred) => info!(uid = cred.uid(), gid = cred.gid(), "Client connected"),
                        Err(e) => debug!(error = %e, "Client connected, peer credentials unavailable"),
                    }

                    session::run_session(
                        stream,
                        &self.forwarder,
                        self.socket_name.port,
                        self.buffer_size,
                        &self.metrics,
                    )
                    .await?;
                }
                _ = shutdown.notified() => {
                    info!("Shutdown requested, leaving accept loop");
                    break;
                }
            }
        }

        self.cleanup()
    }

    /// Unlink the socket file and emit the closed notification.
    fn cleanup(&self) -> RelayResult<()> {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(RelayError::Socket {
                    message: format!(
                        "Failed to remove socket file {}: {}",
                        self.socket_path.display(),
                        e
                    ),
                })
            }
        }

        info!(
            path = %self.socket_path.display(),
            sessions = self.metrics.sessions(),
            requests = self.metrics.requests(),
            failed = self.metrics.failed(),
            "Relay socket closed"
        );
        Ok(())
    }
}

/// Remove a stale socket file left behind by an earlier process.
///
/// Succeeds silently when no file exists; any other removal failure is
/// fatal, the path may belong to someone else.
fn remove_stale_socket(path: &Path) -> RelayResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RelayError::Socket {
            message: format!(
                "Failed to remove stale socket file {}: {}",
                path.display(),
                e
            ),
        }),
    }
}

/// Set socket file permissions.
fn set_socket_permissions(path: &Path, permissions_str: &str) -> RelayResult<()> {
    let mode = u32::from_str_radix(permissions_str, 8).map_err(|e| RelayError::Socket {
        message: format!("Invalid socket permissions '{}': {}", permissions_str, e),
    })?;

    let permissions = std::fs::Permissions::from_mode(mode);
    std::fs::set_permissions(path, permissions).map_err(|e| RelayError::Socket {
        message: format!(
            "Failed to set socket permissions on {}: {}",
            path.display(),
            e
        ),
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_stale_socket_missing_file_is_silent() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("svc-8080.sock");
        remove_stale_socket(&path).expect("missing file should be fine");
    }

    #[test]
    fn test_remove_stale_socket_removes_existing_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("svc-8080.sock");
        std::fs::write(&path, b"stale").expect("seed file");
        remove_stale_socket(&path).expect("stale file should be removed");
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_stale_socket_fails_on_directory() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("svc-8080.sock");
        std::fs::create_dir(&path).expect("seed directory");
        let err = remove_stale_socket(&path).expect_err("directory is not removable");
        assert!(matches!(err, RelayError::Socket { .. }));
    }
}
