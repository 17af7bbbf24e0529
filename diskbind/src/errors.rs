//! Error types for disk attachment lifecycle operations.
//!
//! Every operation step surfaces its failure as a distinct [`DiskError`]
//! variant so callers can branch on the failure category (remote control
//! plane vs. local filesystem vs. timeout) instead of matching on message
//! strings.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type DiskResult<T> = std::result::Result<T, DiskError>;

/// Errors that can occur while attaching, mounting or detaching a
/// persistent disk on this host.
#[derive(Debug, Error)]
pub enum DiskError {
    /// No cloud provider was configured on the attacher.
    #[error("no cloud provider configured")]
    ProviderUnavailable,

    /// The control-plane attach call failed.
    #[error("remote attach of disk {disk} failed: {reason}")]
    RemoteAttachFailed {
        /// Cloud identifier of the disk.
        disk: String,
        /// Provider-reported failure reason.
        reason: String,
    },

    /// Probing for the device node failed with something other than
    /// "not found".
    #[error("probing device {}: {source}", path.display())]
    DeviceProbeFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The device node never became visible within the probe budget.
    #[error("disk {disk}: device did not appear after {attempts} probes")]
    AttachTimeout { disk: String, attempts: u32 },

    /// Mounting the device at its global mount path failed.
    #[error("mount at {} failed: {source}", path.display())]
    MountFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A caller-supplied device path could not be resolved to its
    /// canonical form.
    #[error("resolving device path {}: {source}", path.display())]
    SymlinkResolutionFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The device path does not follow the expected naming convention.
    #[error("unrecognized device name: {}", path.display())]
    UnrecognizedDeviceFormat { path: PathBuf },

    /// Unmounting the global mount path failed. The disk may still be in
    /// use; no further detach steps are attempted.
    #[error("unmount of {} failed: {source}", path.display())]
    UnmountFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Removing the unmounted global mount path failed.
    #[error("removing mount point {} failed: {source}", path.display())]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The control-plane detach call failed.
    #[error("remote detach of disk {disk} failed: {reason}")]
    RemoteDetachFailed { disk: String, reason: String },

    /// A versioned volume payload could not be decoded.
    #[error("invalid volume descriptor: {0}")]
    InvalidDescriptor(String),

    /// Filesystem errors propagated verbatim (mount-point probe, directory
    /// creation).
    #[error("io: {0}")]
    Io(#[from] io::Error),
}
