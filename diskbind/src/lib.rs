//! diskbind: node-local lifecycle management for GCE persistent disks.
//!
//! Attaching a cloud persistent disk to a host crosses three layers: a
//! remote control-plane call, the kernel's asynchronous device-node
//! materialization, and a local mount that must happen exactly once per
//! disk no matter how many consumers reference it. [`DiskAttacher`] walks
//! those layers in order on attach and in reverse on detach, re-deriving
//! all state from the filesystem so calls are idempotent and safe to
//! retry after a crash.
//!
//! The remote control plane ([`CloudProvider`]) and the mount syscalls
//! ([`Mounter`]) are injected capabilities; everything else is local path
//! and name bookkeeping.

pub mod api;
pub mod attacher;
pub mod descriptor;
pub mod device;
pub mod errors;
pub mod layout;
pub mod locks;
pub mod mount;
pub mod provider;

pub use attacher::{AttacherConfig, DiskAttacher};
pub use descriptor::VolumeDescriptor;
pub use errors::{DiskError, DiskResult};
pub use layout::MountLayout;
pub use mount::{Mounter, SystemMounter};
pub use provider::{CloudProvider, GcloudProvider};
