//! Test fixtures for diskbind: scriptable cloud and mount capabilities
//! plus a fake `/dev/disk/by-id` directory.
//!
//! Every fake records into a shared [`OpLog`], so tests can assert on the
//! relative order of control-plane and mount operations, not just their
//! counts.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use diskbind::mount::{MntFlags, MsFlags, Mounter};
use diskbind::provider::CloudProvider;

/// One observed capability call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    AttachDisk {
        disk: String,
        read_only: bool,
    },
    DetachDisk {
        disk: String,
    },
    Mount {
        source: PathBuf,
        target: PathBuf,
        fs_type: String,
        read_only: bool,
    },
    Unmount {
        target: PathBuf,
    },
}

/// Shared, ordered record of capability calls.
#[derive(Clone, Default)]
pub struct OpLog {
    ops: Arc<Mutex<Vec<Op>>>,
}

impl OpLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, op: Op) {
        self.ops.lock().push(op);
    }

    /// Snapshot of all recorded operations, in call order.
    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().clone()
    }

    /// Count of mount calls.
    pub fn mount_count(&self) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, Op::Mount { .. }))
            .count()
    }
}

/// Scriptable [`CloudProvider`].
///
/// Records every call (including failing ones) before reporting the
/// scripted outcome.
#[derive(Default)]
pub struct FakeCloud {
    log: OpLog,
    fail_attach: Option<String>,
    fail_detach: Option<String>,
}

impl FakeCloud {
    pub fn new(log: OpLog) -> Self {
        Self {
            log,
            fail_attach: None,
            fail_detach: None,
        }
    }

    /// Make every attach call fail with `reason`.
    pub fn failing_attach(mut self, reason: impl Into<String>) -> Self {
        self.fail_attach = Some(reason.into());
        self
    }

    /// Make every detach call fail with `reason`.
    pub fn failing_detach(mut self, reason: impl Into<String>) -> Self {
        self.fail_detach = Some(reason.into());
        self
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn attach_disk(&self, disk_id: &str, read_only: bool) -> anyhow::Result<()> {
        self.log.record(Op::AttachDisk {
            disk: disk_id.to_string(),
            read_only,
        });
        if let Some(reason) = &self.fail_attach {
            bail!("{reason}");
        }
        Ok(())
    }

    async fn detach_disk(&self, disk_id: &str) -> anyhow::Result<()> {
        self.log.record(Op::DetachDisk {
            disk: disk_id.to_string(),
        });
        if let Some(reason) = &self.fail_detach {
            bail!("{reason}");
        }
        Ok(())
    }
}

/// Recording [`Mounter`] that never touches the kernel.
#[derive(Default)]
pub struct FakeMounter {
    log: OpLog,
    fail_mount: Option<String>,
    fail_unmount: Option<String>,
}

impl FakeMounter {
    pub fn new(log: OpLog) -> Self {
        Self {
            log,
            fail_mount: None,
            fail_unmount: None,
        }
    }

    /// Make every mount call fail with `reason`.
    pub fn failing_mount(mut self, reason: impl Into<String>) -> Self {
        self.fail_mount = Some(reason.into());
        self
    }

    /// Make every unmount call fail with `reason`.
    pub fn failing_unmount(mut self, reason: impl Into<String>) -> Self {
        self.fail_unmount = Some(reason.into());
        self
    }
}

impl Mounter for FakeMounter {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: &str,
        flags: MsFlags,
        _data: Option<&str>,
    ) -> io::Result<()> {
        self.log.record(Op::Mount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            fs_type: fs_type.to_string(),
            read_only: flags.contains(MsFlags::MS_RDONLY),
        });
        match &self.fail_mount {
            Some(reason) => Err(io::Error::other(reason.clone())),
            None => Ok(()),
        }
    }

    fn unmount(&self, target: &Path, _flags: MntFlags) -> io::Result<()> {
        self.log.record(Op::Unmount {
            target: target.to_path_buf(),
        });
        match &self.fail_unmount {
            Some(reason) => Err(io::Error::other(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Fake `/dev/disk/by-id` directory backed by a tempdir.
pub struct DeviceDir {
    dir: TempDir,
}

impl DeviceDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create device dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn device_name(disk_id: &str, partition: Option<&str>) -> String {
        match partition {
            Some(partition) => format!("google-{disk_id}-part{partition}"),
            None => format!("google-{disk_id}"),
        }
    }

    /// Materialize a device node immediately.
    pub fn add_device(&self, disk_id: &str, partition: Option<&str>) -> PathBuf {
        let path = self.dir.path().join(Self::device_name(disk_id, partition));
        std::fs::write(&path, b"").expect("failed to create device node");
        path
    }

    /// Materialize a device node after `delay`, off-task.
    ///
    /// Models the lag between the control-plane attach returning and the
    /// kernel exposing the node. Works under tokio's paused clock.
    pub fn add_device_after(&self, disk_id: &str, partition: Option<&str>, delay: Duration) {
        let path = self.dir.path().join(Self::device_name(disk_id, partition));
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            std::fs::write(&path, b"").expect("failed to create device node");
        });
    }
}

impl Default for DeviceDir {
    fn default() -> Self {
        Self::new()
    }
}
