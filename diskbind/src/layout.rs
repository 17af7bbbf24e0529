//! Global mount path layout.
//!
//! Every disk is mounted at most once per host, at a deterministic path
//! derived from the kubelet root directory, the disk identifier and the
//! read-only mode. All local consumers of the disk share that single
//! mount. Read-only and read-write mounts of the same disk live in sibling
//! directories so the two modes can never collide:
//!
//! ```text
//! {root}/plugins/gce-pd/
//! ├── mounts/{disk_id}       # read-write
//! └── mounts-ro/{disk_id}    # read-only
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Directory structure constants.
pub mod dirs {
    /// Plugin namespace under the root directory.
    pub const PLUGINS: &str = "plugins";

    /// Subdirectory for the GCE persistent-disk plugin.
    pub const GCE_PD: &str = "gce-pd";

    /// Read-write global mounts.
    pub const MOUNTS: &str = "mounts";

    /// Read-only global mounts.
    pub const MOUNTS_RO: &str = "mounts-ro";
}

/// Mode for freshly created mount-point directories.
const MOUNT_POINT_MODE: u32 = 0o750;

/// Derives global mount paths under a host root directory.
#[derive(Clone, Debug)]
pub struct MountLayout {
    root: PathBuf,
}

impl MountLayout {
    /// Create a layout rooted at the host's volume root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this layout.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Plugin directory: `{root}/plugins/gce-pd`
    pub fn plugin_dir(&self) -> PathBuf {
        self.root.join(dirs::PLUGINS).join(dirs::GCE_PD)
    }

    /// Mounts directory for one access mode.
    pub fn mounts_dir(&self, read_only: bool) -> PathBuf {
        let mounts = if read_only {
            dirs::MOUNTS_RO
        } else {
            dirs::MOUNTS
        };
        self.plugin_dir().join(mounts)
    }

    /// The single canonical mount point for a disk in one access mode.
    ///
    /// Pure and total: the same `(disk_id, read_only)` pair always yields
    /// the same path, distinct pairs never share one.
    pub fn global_mount_path(&self, disk_id: &str, read_only: bool) -> PathBuf {
        self.mounts_dir(read_only).join(disk_id)
    }
}

/// Create a mount-point directory (and parents) with mode 0750.
pub fn create_mount_point(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(MOUNT_POINT_MODE)
        .create(path)
}
