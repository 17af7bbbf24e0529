//! Versioned volume payload decoding.
//!
//! Orchestration layers hand volume definitions to this node in whatever
//! API version they speak. Only the GCE persistent-disk fields matter
//! here: v1beta1 carries them inline, v1beta3 nests them under a
//! `gcePersistentDisk` source object. Both decode to the same
//! [`VolumeDescriptor`].

use std::path::PathBuf;

use serde::Deserialize;

use crate::descriptor::{DEFAULT_FS_TYPE, VolumeDescriptor};
use crate::errors::{DiskError, DiskResult};

/// API versions this node accepts volume payloads in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1Beta1,
    V1Beta3,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1Beta1 => "v1beta1",
            ApiVersion::V1Beta3 => "v1beta3",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "apiVersion")]
enum VersionedVolume {
    #[serde(rename = "v1beta1")]
    V1Beta1(GcePersistentDiskSource),

    #[serde(rename = "v1beta3")]
    V1Beta3(VolumeSourceV1Beta3),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeSourceV1Beta3 {
    gce_persistent_disk: GcePersistentDiskSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcePersistentDiskSource {
    pd_name: String,
    #[serde(default)]
    partition: u32,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    fs_type: Option<String>,
}

impl GcePersistentDiskSource {
    fn into_descriptor(self, root_dir: PathBuf) -> VolumeDescriptor {
        VolumeDescriptor {
            disk_id: self.pd_name,
            // Partition 0 means the whole disk on the wire.
            partition: match self.partition {
                0 => None,
                n => Some(n.to_string()),
            },
            read_only: self.read_only,
            root_dir,
            fs_type: self.fs_type.unwrap_or_else(|| DEFAULT_FS_TYPE.to_string()),
        }
    }
}

/// Decode a versioned JSON volume payload into a [`VolumeDescriptor`].
///
/// `root_dir` is host configuration, not part of the wire form.
pub fn decode_volume(data: &str, root_dir: impl Into<PathBuf>) -> DiskResult<VolumeDescriptor> {
    let versioned: VersionedVolume =
        serde_json::from_str(data).map_err(|e| DiskError::InvalidDescriptor(e.to_string()))?;

    let (version, source) = match versioned {
        VersionedVolume::V1Beta1(source) => (ApiVersion::V1Beta1, source),
        VersionedVolume::V1Beta3(volume) => (ApiVersion::V1Beta3, volume.gce_persistent_disk),
    };
    tracing::debug!(
        version = version.as_str(),
        disk = %source.pd_name,
        "decoded volume payload"
    );
    Ok(source.into_descriptor(root_dir.into()))
}
