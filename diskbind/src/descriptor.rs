//! Volume descriptor: one persistent disk attachment request.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default filesystem type when the caller does not specify one.
pub const DEFAULT_FS_TYPE: &str = "ext4";

/// Immutable description of one volume attachment request.
///
/// Arrives from the orchestration layer, typically decoded from a versioned
/// API object (see [`crate::api`]). The read-only flag affects both the
/// mount flags and the global mount path namespace, so read-only and
/// read-write mounts of the same disk never collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    /// Cloud-assigned stable identifier of the persistent disk.
    pub disk_id: String,
    /// Decimal partition number; `None` means the whole disk.
    pub partition: Option<String>,
    /// Mount the disk read-only.
    pub read_only: bool,
    /// Base directory under which all global mount points live.
    pub root_dir: PathBuf,
    /// Filesystem type passed to the mount call.
    pub fs_type: String,
}

impl VolumeDescriptor {
    /// Create a read-write, whole-disk descriptor with the default
    /// filesystem type.
    pub fn new(disk_id: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            disk_id: disk_id.into(),
            partition: None,
            read_only: false,
            root_dir: root_dir.into(),
            fs_type: DEFAULT_FS_TYPE.to_string(),
        }
    }

    /// Select a partition of the disk instead of the whole device.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Mount read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Override the filesystem type.
    pub fn with_fs_type(mut self, fs_type: impl Into<String>) -> Self {
        self.fs_type = fs_type.into();
        self
    }
}
