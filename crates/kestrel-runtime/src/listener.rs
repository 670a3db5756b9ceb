//! Process-global socket-listener bootstrap.
//!
//! The runtime's executor is started exactly once per process; every
//! [`start_socket_listener`] call after that mints a fresh Unix socket and
//! reports its path through the init callback. The protocol machinery behind
//! each accepted connection is supplied once, process-wide, through
//! [`install_backend`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use tokio::net::UnixStream;
use tokio::runtime::Runtime;

use crate::stats;

/// The seam where the Runtime Core plugs in: one call per accepted client
/// connection, invoked on the runtime's executor.
pub trait ConnectionBackend: Send + Sync + 'static {
    /// Take ownership of one accepted connection. Implementations typically
    /// spawn a task per connection; the executor context is already entered.
    fn handle_connection(&self, stream: UnixStream);
}

static BACKEND: OnceLock<Box<dyn ConnectionBackend>> = OnceLock::new();
static EXECUTOR: OnceLock<std::io::Result<Runtime>> = OnceLock::new();
static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(0);

/// Install the process-wide connection backend. One-shot: a repeated install
/// is ignored with a warning.
pub fn install_backend(backend: impl ConnectionBackend) {
    if BACKEND.set(Box::new(backend)).is_err() {
        tracing::warn!("connection backend already installed, ignoring new backend");
    }
}

fn executor() -> Result<&'static Runtime, String> {
    let result = EXECUTOR.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("kestrel-runtime")
            .build()
    });
    match result {
        Ok(runtime) => Ok(runtime),
        Err(e) => Err(format!("Failed to start the networking runtime: {e}")),
    }
}

fn mint_socket_path() -> PathBuf {
    let id = NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "kestrel-socket-{}-{}.sock",
        std::process::id(),
        id
    ))
}

/// Start a Unix-socket listener for one client session.
///
/// Non-blocking: the listener is bound on the runtime's executor and
/// `init_callback` fires exactly once, with the socket path once the listener
/// is ready to accept, or with an error message. Safe to call any number of
/// times; every call yields an independent socket.
pub fn start_socket_listener<F>(init_callback: F)
where
    F: FnOnce(Result<String, String>) + Send + 'static,
{
    let Some(backend) = BACKEND.get() else {
        init_callback(Err(
            "Socket initialization error: no connection backend installed".to_string(),
        ));
        return;
    };

    let runtime = match executor() {
        Ok(runtime) => runtime,
        Err(e) => {
            init_callback(Err(e));
            return;
        }
    };

    let path = mint_socket_path();
    runtime.spawn(async move {
        // A stale socket file from a crashed process would fail the bind.
        let _ = std::fs::remove_file(&path);

        let listener = match tokio::net::UnixListener::bind(&path) {
            Ok(listener) => listener,
            Err(e) => {
                init_callback(Err(format!(
                    "Socket initialization error: failed to bind {}: {e}",
                    path.display()
                )));
                return;
            }
        };

        stats::record_listener_started();
        init_callback(Ok(path.display().to_string()));

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    stats::record_client_connected();
                    backend.handle_connection(stream);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept client connection");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_paths_are_unique() {
        let a = mint_socket_path();
        let b = mint_socket_path();
        assert_ne!(a, b);
        assert!(a.to_string_lossy().contains("kestrel-socket-"));
    }

    #[test]
    fn listener_without_backend_reports_error() {
        // BACKEND is process-global; this test only runs meaningfully when
        // nothing installed a backend first, so accept both outcomes but
        // require the callback to fire exactly once either way.
        let (tx, rx) = std::sync::mpsc::channel();
        start_socket_listener(move |result| {
            tx.send(result).unwrap();
        });
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("init callback never fired");
        if let Err(msg) = result {
            assert!(msg.contains("Socket initialization error"));
        }
    }
}
