//! The Runtime Core boundary.
//!
//! Everything the client engine needs from the background networking runtime
//! lives behind this crate: the process-global socket-listener bootstrap, the
//! leaked byte-vector hand-off for large argument payloads, the native
//! [`Value`] representation with its pointer decode, OpenTelemetry hooks,
//! engine statistics and the cluster-scan cursor registry.
//!
//! The runtime's own protocol machinery (RESP, TCP, reconnection) is not
//! here; it plugs in through [`ConnectionBackend`] and owns everything on the
//! far side of the Unix socket.

mod handoff;
mod listener;
mod otel;
mod scan;
mod stats;
mod value;

pub use handoff::{
    create_leaked_bytes_vec, take_leaked_bytes_vec, value_from_pointer, value_to_pointer,
};
pub use listener::{install_backend, start_socket_listener, ConnectionBackend};
pub use otel::{
    create_otel_span, drop_otel_span, get_sample_percentage, init_opentelemetry, otel_initialized,
    set_sample_percentage, should_sample, OpenTelemetryConfig, OpenTelemetryMetricsConfig,
    OpenTelemetryTracesConfig,
};
pub use scan::{
    cursor_is_registered, register_cluster_scan_cursor, remove_cluster_scan_cursor,
    ClusterScanCursor, FINISHED_SCAN_CURSOR, INITIAL_SCAN_CURSOR,
};
pub use stats::get_statistics;
pub use value::{PushKind, Value};

/// Overall deadline, in milliseconds, for the socket connect plus handshake
/// performed by client creation.
pub const DEFAULT_TIMEOUT_IN_MILLISECONDS: u64 = 10_000;

/// Inline-vs-pointer threshold for argument payloads, in bytes. Argument
/// lists whose summed byte length is below this travel inside the protobuf
/// message; at or above it they are leaked to the runtime and the message
/// carries only the pointer.
pub const MAX_REQUEST_ARGS_LEN: usize = (1 << 12) * 1024;

/// Socket read chunk size used by the client's reader loop.
pub const DEFAULT_READ_BYTES_SIZE: usize = 65_536;
