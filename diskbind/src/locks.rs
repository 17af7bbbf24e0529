//! Per-mount-path mutual exclusion.
//!
//! The probe-create-mount sequence during attach and the
//! unmount-remove-detach sequence during detach are not atomic; two
//! callers working on the same disk must serialize. Locks are keyed by the
//! global mount path, so distinct disks (and distinct access modes of the
//! same disk) proceed independently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Lock table keyed by global mount path.
///
/// Entries are never removed; the table is bounded by the number of
/// distinct disks ever handled by this process.
#[derive(Default)]
pub struct MountLockTable {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl MountLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding all mutations of `path`. Hold the returned mutex
    /// across the whole sequence, not just individual filesystem calls.
    pub fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
