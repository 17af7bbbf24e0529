//! Mount capability.
//!
//! The lifecycle manager only needs two syscalls; they sit behind a trait
//! so tests can observe mount activity without touching the kernel.

use std::io;
use std::path::Path;

pub use nix::mount::{MntFlags, MsFlags};

/// Mount/unmount syscall wrapper.
pub trait Mounter: Send + Sync {
    /// Mount `source` at `target`.
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: &str,
        flags: MsFlags,
        data: Option<&str>,
    ) -> io::Result<()>;

    /// Unmount `target`.
    fn unmount(&self, target: &Path, flags: MntFlags) -> io::Result<()>;
}

/// Mount flags for one access mode.
pub fn access_mode_flags(read_only: bool) -> MsFlags {
    if read_only {
        MsFlags::MS_RDONLY
    } else {
        MsFlags::empty()
    }
}

/// [`Mounter`] backed by the real mount/umount2 syscalls.
#[derive(Debug, Default)]
pub struct SystemMounter;

impl Mounter for SystemMounter {
    fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: &str,
        flags: MsFlags,
        data: Option<&str>,
    ) -> io::Result<()> {
        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            fs_type,
            ?flags,
            "mounting block device"
        );
        nix::mount::mount(Some(source), target, Some(fs_type), flags, data)
            .map_err(|e| io::Error::from_raw_os_error(e as i32))
    }

    fn unmount(&self, target: &Path, flags: MntFlags) -> io::Result<()> {
        tracing::debug!(target = %target.display(), ?flags, "unmounting");
        nix::mount::umount2(target, flags).map_err(|e| io::Error::from_raw_os_error(e as i32))
    }
}
