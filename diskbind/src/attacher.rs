//! Persistent disk attachment lifecycle.
//!
//! [`DiskAttacher`] coordinates three layers that fail independently: the
//! remote control plane (attach/detach), the kernel's device table (the
//! device node appears some time after the remote attach returns), and the
//! local filesystem (the one global mount per disk). Neither operation
//! keeps state between calls; every step probes the filesystem or the
//! control plane directly, so a failed call can simply be retried whole.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::descriptor::VolumeDescriptor;
use crate::device;
use crate::errors::{DiskError, DiskResult};
use crate::layout::{self, MountLayout};
use crate::locks::MountLockTable;
use crate::mount::{MntFlags, Mounter, access_mode_flags};
use crate::provider::CloudProvider;

/// Tuning for device-visibility probing.
#[derive(Clone, Debug)]
pub struct AttacherConfig {
    /// Directory holding the by-id device symlinks.
    pub by_id_dir: PathBuf,

    /// Delay between device-visibility probes.
    pub device_probe_interval: Duration,

    /// Number of probes before giving up on the device node.
    pub device_probe_attempts: u32,
}

impl Default for AttacherConfig {
    fn default() -> Self {
        Self {
            by_id_dir: PathBuf::from(device::BY_ID_DIR),
            device_probe_interval: Duration::from_secs(1),
            device_probe_attempts: 10,
        }
    }
}

impl AttacherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the by-id directory (tests point this at a tempdir).
    pub fn with_by_id_dir(mut self, by_id_dir: impl Into<PathBuf>) -> Self {
        self.by_id_dir = by_id_dir.into();
        self
    }

    /// Override the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.device_probe_interval = interval;
        self
    }

    /// Override the probe budget.
    pub fn with_probe_attempts(mut self, attempts: u32) -> Self {
        self.device_probe_attempts = attempts;
        self
    }
}

/// Node-local attach/detach lifecycle manager.
pub struct DiskAttacher {
    provider: Option<Arc<dyn CloudProvider>>,
    mounter: Arc<dyn Mounter>,
    config: AttacherConfig,
    locks: MountLockTable,
}

impl DiskAttacher {
    /// Create an attacher with default probing configuration.
    pub fn new(provider: Option<Arc<dyn CloudProvider>>, mounter: Arc<dyn Mounter>) -> Self {
        Self::with_config(provider, mounter, AttacherConfig::default())
    }

    /// Create an attacher with explicit probing configuration.
    pub fn with_config(
        provider: Option<Arc<dyn CloudProvider>>,
        mounter: Arc<dyn Mounter>,
        config: AttacherConfig,
    ) -> Self {
        Self {
            provider,
            mounter,
            config,
            locks: MountLockTable::new(),
        }
    }

    fn provider(&self) -> DiskResult<&Arc<dyn CloudProvider>> {
        self.provider.as_ref().ok_or(DiskError::ProviderUnavailable)
    }

    /// Attach a disk to this host and mount it at its global mount path.
    ///
    /// Remotely attaches the disk, waits for the kernel to expose the
    /// device node, then mounts it. If an earlier caller already mounted
    /// this disk the existing mount is shared and no second mount happens.
    pub async fn attach(&self, volume: &VolumeDescriptor) -> DiskResult<()> {
        let provider = self.provider()?;

        provider
            .attach_disk(&volume.disk_id, volume.read_only)
            .await
            .map_err(|e| DiskError::RemoteAttachFailed {
                disk: volume.disk_id.clone(),
                reason: e.to_string(),
            })?;

        let device_path = device::attach_device_path(
            &self.config.by_id_dir,
            &volume.disk_id,
            volume.partition.as_deref(),
        );
        self.wait_for_device(&volume.disk_id, &device_path).await?;

        let layout = MountLayout::new(&volume.root_dir);
        let global_path = layout.global_mount_path(&volume.disk_id, volume.read_only);

        let lock = self.locks.lock_for(&global_path);
        let _guard = lock.lock().await;

        match std::fs::metadata(&global_path) {
            Ok(_) => {
                // Mounted by an earlier caller; share it.
                tracing::debug!(
                    disk = %volume.disk_id,
                    path = %global_path.display(),
                    "disk already mounted globally"
                );
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        layout::create_mount_point(&global_path)?;
        if let Err(e) = self.mounter.mount(
            &device_path,
            &global_path,
            &volume.fs_type,
            access_mode_flags(volume.read_only),
            None,
        ) {
            // A mount point that never mounted must not linger: a later
            // attach would mistake it for an existing mount.
            if let Err(cleanup) = std::fs::remove_dir_all(&global_path) {
                tracing::warn!(
                    path = %global_path.display(),
                    error = %cleanup,
                    "failed to remove mount point after mount failure"
                );
            }
            return Err(DiskError::MountFailed {
                path: global_path,
                source: e,
            });
        }

        tracing::info!(
            disk = %volume.disk_id,
            device = %device_path.display(),
            path = %global_path.display(),
            "mounted persistent disk globally"
        );
        Ok(())
    }

    /// Unmount a disk's global mount and detach it from this host.
    ///
    /// `device_path` is the device the caller observed, possibly a
    /// partition symlink; the disk identifier is recovered from it so the
    /// detach always targets the whole disk. Steps run strictly in order
    /// (unmount, remove mount point, remote detach) and the first failure
    /// halts the sequence: an unmount failure means the disk may still be
    /// in use, so nothing further is torn down.
    pub async fn detach(&self, device_path: &Path, volume: &VolumeDescriptor) -> DiskResult<()> {
        let canonical_path = device::canonicalize_device_path(device_path)?;
        let disk_id = device::parse_device_name(device_path, &canonical_path)?;

        let layout = MountLayout::new(&volume.root_dir);
        let global_path = layout.global_mount_path(&disk_id, volume.read_only);

        let lock = self.locks.lock_for(&global_path);
        let _guard = lock.lock().await;

        self.mounter
            .unmount(&global_path, MntFlags::empty())
            .map_err(|source| DiskError::UnmountFailed {
                path: global_path.clone(),
                source,
            })?;

        std::fs::remove_dir_all(&global_path).map_err(|source| DiskError::CleanupFailed {
            path: global_path.clone(),
            source,
        })?;

        self.provider()?
            .detach_disk(&disk_id)
            .await
            .map_err(|e| DiskError::RemoteDetachFailed {
                disk: disk_id.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            disk = %disk_id,
            path = %global_path.display(),
            "detached persistent disk"
        );
        Ok(())
    }

    /// Wait for the kernel to expose the device node.
    ///
    /// The remote attach call returns before the device materializes
    /// locally, so poll for it: one probe per interval, bounded. Any stat
    /// error other than "not found" aborts immediately.
    async fn wait_for_device(&self, disk_id: &str, device_path: &Path) -> DiskResult<()> {
        for attempt in 1..=self.config.device_probe_attempts {
            match std::fs::metadata(device_path) {
                Ok(_) => {
                    tracing::debug!(
                        disk = disk_id,
                        device = %device_path.display(),
                        attempt,
                        "device visible"
                    );
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(DiskError::DeviceProbeFailed {
                        path: device_path.to_path_buf(),
                        source,
                    });
                }
            }
            tracing::debug!(disk = disk_id, attempt, "device not visible yet");
            tokio::time::sleep(self.config.device_probe_interval).await;
        }

        Err(DiskError::AttachTimeout {
            disk: disk_id.to_string(),
            attempts: self.config.device_probe_attempts,
        })
    }
}
