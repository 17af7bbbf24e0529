//! Device node naming for GCE persistent disks.
//!
//! Attached disks surface under `/dev/disk/by-id` with a vendor prefix:
//! `google-<diskID>` for the whole disk, `google-<diskID>-part<N>` for a
//! partition. Both forms are symlinks to the real device node (`/dev/sdb`,
//! `/dev/sdb1`, ...). Detach receives an arbitrary device path from the
//! caller and must recover the bare disk identifier from it, stripping the
//! partition suffix when one is present, because detach always operates on
//! the disk rather than a partition.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{DiskError, DiskResult};

/// Directory where the kernel exposes persistent-disk symlinks.
pub const BY_ID_DIR: &str = "/dev/disk/by-id";

/// Vendor prefix on every GCE persistent-disk device name.
pub const VENDOR_PREFIX: &str = "google-";

/// Marker between the disk name and its partition number.
pub const PARTITION_MARKER: &str = "-part";

// Trailing device-name component: letters with an optional partition
// number, e.g. "sdb", "sdb1", "part2".
static DEVICE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<name>[a-z]+)(?P<partition>[0-9]+)?$").unwrap());

/// Build the expected device path for a freshly attached disk.
pub fn attach_device_path(by_id_dir: &Path, disk_id: &str, partition: Option<&str>) -> PathBuf {
    let mut name = format!("{VENDOR_PREFIX}{disk_id}");
    if let Some(partition) = partition {
        name.push_str(PARTITION_MARKER);
        name.push_str(partition);
    }
    by_id_dir.join(name)
}

/// Resolve a caller-supplied device path through symlink indirection.
pub fn canonicalize_device_path(device_path: &Path) -> DiskResult<PathBuf> {
    std::fs::canonicalize(device_path).map_err(|source| DiskError::SymlinkResolutionFailed {
        path: device_path.to_path_buf(),
        source,
    })
}

/// Recover the bare disk identifier from a device path pair.
///
/// `canonical_path` names the device the kernel actually exposed and
/// carries the partition number, either as a plain numeric suffix
/// (`/dev/sdb1`) or as a `-part<N>` suffix when the by-id link resolves to
/// itself. `device_path` is the attach-time path whose base name, minus
/// any `-part<N>` suffix and the vendor prefix, is the disk identifier.
pub fn parse_device_name(device_path: &Path, canonical_path: &Path) -> DiskResult<String> {
    let canonical_base = base_name(canonical_path)?;
    let captures = DEVICE_NAME_RE.captures(canonical_base).ok_or_else(|| {
        DiskError::UnrecognizedDeviceFormat {
            path: canonical_path.to_path_buf(),
        }
    })?;

    let mut name = base_name(device_path)?.to_string();
    if let Some(partition) = captures.name("partition") {
        let suffix = format!("{PARTITION_MARKER}{}", partition.as_str());
        if let Some(stripped) = name.strip_suffix(&suffix) {
            name = stripped.to_string();
        }
    }

    Ok(name
        .strip_prefix(VENDOR_PREFIX)
        .unwrap_or(name.as_str())
        .to_string())
}

fn base_name(path: &Path) -> DiskResult<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DiskError::UnrecognizedDeviceFormat {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(device: &str, canonical: &str) -> DiskResult<String> {
        parse_device_name(Path::new(device), Path::new(canonical))
    }

    #[test]
    fn test_attach_device_path() {
        assert_eq!(
            attach_device_path(Path::new(BY_ID_DIR), "disk1", None),
            PathBuf::from("/dev/disk/by-id/google-disk1")
        );
        assert_eq!(
            attach_device_path(Path::new(BY_ID_DIR), "disk1", Some("2")),
            PathBuf::from("/dev/disk/by-id/google-disk1-part2")
        );
    }

    #[test]
    fn test_parse_whole_disk() {
        assert_eq!(
            parse("/dev/disk/by-id/google-disk1", "/dev/sdb").unwrap(),
            "disk1"
        );
    }

    #[test]
    fn test_parse_partition_from_real_device_name() {
        assert_eq!(
            parse("/dev/disk/by-id/google-disk1-part2", "/dev/sdb2").unwrap(),
            "disk1"
        );
    }

    #[test]
    fn test_parse_partition_from_by_id_name() {
        // Canonical resolution can yield the by-id path itself; the
        // partition marker is then part of the canonical base name.
        assert_eq!(
            parse(
                "/dev/disk/by-id/google-disk1-part2",
                "/dev/disk/by-id/google-disk1-part2"
            )
            .unwrap(),
            "disk1"
        );
    }

    #[test]
    fn test_parse_without_vendor_prefix() {
        // Paths that never carried the prefix come back unchanged.
        assert_eq!(parse("/dev/sdb", "/dev/sdb").unwrap(), "sdb");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for canonical in ["/dev/123", "/dev/DISK", "/dev/-"] {
            let err = parse("/dev/disk/by-id/google-disk1", canonical).unwrap_err();
            assert!(
                matches!(err, DiskError::UnrecognizedDeviceFormat { .. }),
                "expected UnrecognizedDeviceFormat for {canonical}, got {err}"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_partition_suffix_always_stripped(
            disk in "[a-z][a-z0-9]{0,11}",
            partition in 1u32..=128,
        ) {
            let partition = partition.to_string();
            let attach = attach_device_path(Path::new(BY_ID_DIR), &disk, Some(&partition));
            let canonical = format!("/dev/sdb{partition}");
            prop_assert_eq!(
                parse_device_name(&attach, Path::new(&canonical)).unwrap(),
                disk
            );
        }
    }
}
