//! Cluster-scan cursor hand-off.
//!
//! Cursor ids are minted by the runtime, which keeps per-cursor scan state
//! alive until the binding signals it is done. The signal is the cursor
//! wrapper's `Drop`, which removes the id from the registry.

use std::collections::HashSet;
use std::sync::OnceLock;

use parking_lot::Mutex;

/// Cursor id representing the start of a new iteration.
pub const INITIAL_SCAN_CURSOR: &str = "0";

/// Cursor id the runtime returns once the iteration has covered every slot.
pub const FINISHED_SCAN_CURSOR: &str = "finished";

fn registry() -> &'static Mutex<HashSet<String>> {
    static REGISTRY: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Record a freshly minted cursor id. Called by the runtime when it opens
/// scan state for a new cursor.
pub fn register_cluster_scan_cursor(cursor_id: &str) {
    registry().lock().insert(cursor_id.to_string());
}

/// Release the scan state behind a cursor id. Idempotent.
pub fn remove_cluster_scan_cursor(cursor_id: &str) {
    registry().lock().remove(cursor_id);
}

/// Whether the runtime still holds scan state for a cursor id.
pub fn cursor_is_registered(cursor_id: &str) -> bool {
    registry().lock().contains(cursor_id)
}

/// Opaque handle to one cluster-wide SCAN iteration.
///
/// Holds the cursor id minted by the runtime; dropping the handle tells the
/// runtime to release the server-side scan state behind it.
#[derive(Debug)]
pub struct ClusterScanCursor {
    cursor: String,
}

impl ClusterScanCursor {
    /// A cursor pointing at the start of a new iteration.
    pub fn new() -> Self {
        Self {
            cursor: INITIAL_SCAN_CURSOR.to_string(),
        }
    }

    /// Wrap a cursor id returned by the runtime.
    pub fn from_id(cursor: String) -> Self {
        Self { cursor }
    }

    pub fn get_cursor(&self) -> &str {
        &self.cursor
    }

    /// Whether the iteration has completed.
    pub fn is_finished(&self) -> bool {
        self.cursor == FINISHED_SCAN_CURSOR
    }
}

impl Default for ClusterScanCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClusterScanCursor {
    fn drop(&mut self) {
        // The initial and finished sentinels have no runtime state behind
        // them.
        if self.cursor != INITIAL_SCAN_CURSOR && self.cursor != FINISHED_SCAN_CURSOR {
            remove_cluster_scan_cursor(&self.cursor);
        }
    }
}
