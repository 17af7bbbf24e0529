//! Integration tests for the attach/detach lifecycle (remote attach,
//! device wait, global mount, and the reverse sequence).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use diskbind::errors::DiskError;
use diskbind::{AttacherConfig, DiskAttacher, MountLayout, VolumeDescriptor};
use diskbind_test_utils::{DeviceDir, FakeCloud, FakeMounter, Op, OpLog};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Attacher wired to fakes, with an isolated device dir and root dir.
struct TestContext {
    log: OpLog,
    devices: DeviceDir,
    root: TempDir,
    attacher: DiskAttacher,
}

impl TestContext {
    fn new() -> Self {
        Self::with_fakes(|cloud, mounter| (cloud, mounter))
    }

    /// Build a context, letting the test rescript the fakes.
    fn with_fakes(
        rescript: impl FnOnce(FakeCloud, FakeMounter) -> (FakeCloud, FakeMounter),
    ) -> Self {
        let log = OpLog::new();
        let devices = DeviceDir::new();
        let root = TempDir::new().expect("failed to create root dir");
        let (cloud, mounter) = rescript(FakeCloud::new(log.clone()), FakeMounter::new(log.clone()));
        let attacher = DiskAttacher::with_config(
            Some(Arc::new(cloud)),
            Arc::new(mounter),
            AttacherConfig::new().with_by_id_dir(devices.path()),
        );
        Self {
            log,
            devices,
            root,
            attacher,
        }
    }

    fn without_provider() -> Self {
        let log = OpLog::new();
        let devices = DeviceDir::new();
        let root = TempDir::new().expect("failed to create root dir");
        let attacher = DiskAttacher::with_config(
            None,
            Arc::new(FakeMounter::new(log.clone())),
            AttacherConfig::new().with_by_id_dir(devices.path()),
        );
        Self {
            log,
            devices,
            root,
            attacher,
        }
    }

    fn descriptor(&self, disk: &str) -> VolumeDescriptor {
        VolumeDescriptor::new(disk, self.root.path())
    }

    fn global_path(&self, disk: &str, read_only: bool) -> PathBuf {
        MountLayout::new(self.root.path()).global_mount_path(disk, read_only)
    }
}

// ============================================================================
// ATTACH TESTS
// ============================================================================

#[tokio::test]
async fn attach_mounts_disk_at_global_path() {
    let ctx = TestContext::new();
    let device = ctx.devices.add_device("disk1", None);

    ctx.attacher.attach(&ctx.descriptor("disk1")).await.unwrap();

    let global = ctx.global_path("disk1", false);
    assert!(global.ends_with("plugins/gce-pd/mounts/disk1"));
    assert!(global.is_dir());
    assert_eq!(
        ctx.log.ops(),
        vec![
            Op::AttachDisk {
                disk: "disk1".into(),
                read_only: false,
            },
            Op::Mount {
                source: device,
                target: global,
                fs_type: "ext4".into(),
                read_only: false,
            },
        ]
    );
}

#[tokio::test]
async fn attach_mounts_globally_at_most_once() {
    let ctx = TestContext::new();
    ctx.devices.add_device("disk1", None);
    let descriptor = ctx.descriptor("disk1");

    ctx.attacher.attach(&descriptor).await.unwrap();
    ctx.attacher.attach(&descriptor).await.unwrap();

    // Each call attaches remotely; only the first one mounts.
    let attaches = ctx
        .log
        .ops()
        .iter()
        .filter(|op| matches!(op, Op::AttachDisk { .. }))
        .count();
    assert_eq!(attaches, 2);
    assert_eq!(ctx.log.mount_count(), 1);
}

#[tokio::test]
async fn read_only_attach_uses_its_own_namespace_and_flag() {
    let ctx = TestContext::new();
    ctx.devices.add_device("disk1", None);
    let descriptor = ctx.descriptor("disk1").with_read_only(true);

    ctx.attacher.attach(&descriptor).await.unwrap();

    let global = ctx.global_path("disk1", true);
    assert!(global.ends_with("plugins/gce-pd/mounts-ro/disk1"));
    assert!(global.is_dir());
    assert!(ctx.log.ops().iter().any(|op| matches!(
        op,
        Op::Mount {
            read_only: true,
            ..
        }
    )));
}

#[tokio::test]
async fn read_only_and_read_write_mounts_do_not_share_a_path() {
    let ctx = TestContext::new();
    ctx.devices.add_device("disk1", None);

    ctx.attacher.attach(&ctx.descriptor("disk1")).await.unwrap();
    ctx.attacher
        .attach(&ctx.descriptor("disk1").with_read_only(true))
        .await
        .unwrap();

    assert_eq!(ctx.log.mount_count(), 2);
    assert!(ctx.global_path("disk1", false).is_dir());
    assert!(ctx.global_path("disk1", true).is_dir());
}

#[tokio::test]
async fn attach_with_partition_probes_partition_device() {
    let ctx = TestContext::new();
    let device = ctx.devices.add_device("disk1", Some("2"));

    ctx.attacher
        .attach(&ctx.descriptor("disk1").with_partition("2"))
        .await
        .unwrap();

    // The partition device is mounted, at the disk-level global path.
    assert!(ctx.log.ops().iter().any(|op| matches!(
        op,
        Op::Mount { source, target, .. }
            if *source == device && target.ends_with("mounts/disk1")
    )));
}

#[tokio::test(start_paused = true)]
async fn attach_waits_for_delayed_device_visibility() {
    let ctx = TestContext::new();
    ctx.devices
        .add_device_after("disk1", None, Duration::from_secs(3));

    ctx.attacher.attach(&ctx.descriptor("disk1")).await.unwrap();

    assert_eq!(ctx.log.mount_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn attach_times_out_after_ten_probes() {
    let ctx = TestContext::new();
    let start = tokio::time::Instant::now();

    let err = ctx
        .attacher
        .attach(&ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DiskError::AttachTimeout { attempts: 10, .. }
    ));
    // Ten probes at one-second spacing, no real sleeping under the paused
    // clock.
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    assert_eq!(ctx.log.mount_count(), 0);
    assert!(!ctx.global_path("disk1", false).exists());
}

#[tokio::test]
async fn attach_aborts_on_non_not_found_probe_error() {
    let log = OpLog::new();
    let root = TempDir::new().unwrap();
    // A file where the by-id directory should be turns every probe into
    // ENOTDIR.
    let bogus = root.path().join("by-id");
    std::fs::write(&bogus, b"").unwrap();

    let attacher = DiskAttacher::with_config(
        Some(Arc::new(FakeCloud::new(log.clone()))),
        Arc::new(FakeMounter::new(log.clone())),
        AttacherConfig::new().with_by_id_dir(&bogus),
    );

    let err = attacher
        .attach(&VolumeDescriptor::new("disk1", root.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, DiskError::DeviceProbeFailed { .. }));
}

#[tokio::test]
async fn attach_cleans_up_mount_point_on_mount_failure() {
    let ctx = TestContext::with_fakes(|cloud, mounter| {
        (cloud, mounter.failing_mount("wrong fs type"))
    });
    ctx.devices.add_device("disk1", None);

    let err = ctx
        .attacher
        .attach(&ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::MountFailed { .. }));
    // The freshly created mount point must not survive the failure.
    assert!(!ctx.global_path("disk1", false).exists());
}

#[tokio::test]
async fn attach_surfaces_remote_attach_failure() {
    let ctx =
        TestContext::with_fakes(|cloud, mounter| (cloud.failing_attach("quota exceeded"), mounter));
    ctx.devices.add_device("disk1", None);

    let err = ctx
        .attacher
        .attach(&ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    match err {
        DiskError::RemoteAttachFailed { disk, reason } => {
            assert_eq!(disk, "disk1");
            assert!(reason.contains("quota exceeded"));
        }
        other => panic!("expected RemoteAttachFailed, got {other}"),
    }
    assert_eq!(ctx.log.mount_count(), 0);
}

#[tokio::test]
async fn attach_without_provider_fails() {
    let ctx = TestContext::without_provider();
    ctx.devices.add_device("disk1", None);

    let err = ctx
        .attacher
        .attach(&ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::ProviderUnavailable));
    assert!(ctx.log.ops().is_empty());
}

#[tokio::test]
async fn concurrent_attaches_of_one_disk_mount_once() {
    let ctx = TestContext::new();
    ctx.devices.add_device("disk1", None);
    let descriptor = ctx.descriptor("disk1");

    let (a, b) = tokio::join!(
        ctx.attacher.attach(&descriptor),
        ctx.attacher.attach(&descriptor)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(ctx.log.mount_count(), 1);
}

// ============================================================================
// DETACH TESTS
// ============================================================================

#[tokio::test]
async fn detach_unmounts_removes_and_detaches_in_order() {
    let ctx = TestContext::new();
    let device = ctx.devices.add_device("disk1", None);
    let global = ctx.global_path("disk1", false);
    std::fs::create_dir_all(&global).unwrap();

    ctx.attacher
        .detach(&device, &ctx.descriptor("disk1"))
        .await
        .unwrap();

    assert!(!global.exists());
    assert_eq!(
        ctx.log.ops(),
        vec![
            Op::Unmount {
                target: global.clone(),
            },
            Op::DetachDisk {
                disk: "disk1".into(),
            },
        ]
    );
}

#[tokio::test]
async fn detach_partition_device_targets_whole_disk() {
    let ctx = TestContext::new();
    let device = ctx.devices.add_device("disk1", Some("2"));
    let global = ctx.global_path("disk1", false);
    std::fs::create_dir_all(&global).unwrap();

    ctx.attacher
        .detach(&device, &ctx.descriptor("disk1"))
        .await
        .unwrap();

    // The partition suffix is stripped: the disk-level mount is unmounted
    // and the disk (not the partition) is detached remotely.
    assert_eq!(
        ctx.log.ops(),
        vec![
            Op::Unmount { target: global },
            Op::DetachDisk {
                disk: "disk1".into(),
            },
        ]
    );
}

#[tokio::test]
async fn detach_halts_when_unmount_fails() {
    let ctx = TestContext::with_fakes(|cloud, mounter| {
        (cloud, mounter.failing_unmount("target is busy"))
    });
    let device = ctx.devices.add_device("disk1", None);
    let global = ctx.global_path("disk1", false);
    std::fs::create_dir_all(&global).unwrap();

    let err = ctx
        .attacher
        .detach(&device, &ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::UnmountFailed { .. }));
    // The disk may still be in use: keep the mount point, skip the remote
    // detach.
    assert!(global.exists());
    assert!(
        !ctx.log
            .ops()
            .iter()
            .any(|op| matches!(op, Op::DetachDisk { .. }))
    );
}

#[tokio::test]
async fn detach_surfaces_remote_detach_failure() {
    let ctx = TestContext::with_fakes(|cloud, mounter| {
        (cloud.failing_detach("disk not attached"), mounter)
    });
    let device = ctx.devices.add_device("disk1", None);
    let global = ctx.global_path("disk1", false);
    std::fs::create_dir_all(&global).unwrap();

    let err = ctx
        .attacher
        .detach(&device, &ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::RemoteDetachFailed { .. }));
    // Local teardown already happened; only the remote step failed.
    assert!(!global.exists());
}

#[tokio::test]
async fn detach_fails_on_unresolvable_device_path() {
    let ctx = TestContext::new();
    let missing = ctx.devices.path().join("google-ghost");

    let err = ctx
        .attacher
        .detach(&missing, &ctx.descriptor("ghost"))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::SymlinkResolutionFailed { .. }));
    assert!(ctx.log.ops().is_empty());
}

#[tokio::test]
async fn detach_rejects_unrecognized_device_names() {
    let ctx = TestContext::new();
    let bogus = ctx.devices.path().join("123");
    std::fs::write(&bogus, b"").unwrap();

    let err = ctx
        .attacher
        .detach(&bogus, &ctx.descriptor("disk1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DiskError::UnrecognizedDeviceFormat { .. }));
    assert!(ctx.log.ops().is_empty());
}

// ============================================================================
// END-TO-END
// ============================================================================

#[tokio::test]
async fn attach_then_detach_round_trip() {
    let ctx = TestContext::new();
    let device = ctx.devices.add_device("disk1", None);
    let descriptor = ctx.descriptor("disk1");

    ctx.attacher.attach(&descriptor).await.unwrap();
    ctx.attacher.detach(&device, &descriptor).await.unwrap();

    let global = ctx.global_path("disk1", false);
    assert!(!global.exists());
    assert_eq!(
        ctx.log.ops(),
        vec![
            Op::AttachDisk {
                disk: "disk1".into(),
                read_only: false,
            },
            Op::Mount {
                source: device,
                target: global.clone(),
                fs_type: "ext4".into(),
                read_only: false,
            },
            Op::Unmount { target: global },
            Op::DetachDisk {
                disk: "disk1".into(),
            },
        ]
    );
}
