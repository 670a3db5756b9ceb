//! Engine-level counters surfaced through `get_statistics`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static TOTAL_CONNECTIONS: AtomicU64 = AtomicU64::new(0);
static TOTAL_CLIENTS: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_listener_started() {
    TOTAL_CONNECTIONS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_client_connected() {
    TOTAL_CLIENTS.fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the engine counters, keyed by stable names.
pub fn get_statistics() -> HashMap<String, String> {
    let mut stats = HashMap::new();
    stats.insert(
        "total_connections".to_string(),
        TOTAL_CONNECTIONS.load(Ordering::Relaxed).to_string(),
    );
    stats.insert(
        "total_clients".to_string(),
        TOTAL_CLIENTS.load(Ordering::Relaxed).to_string(),
    );
    stats
}
