//! Top-level CLI definition and shared flags.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use diskbind::{AttacherConfig, CloudProvider, DiskAttacher, GcloudProvider, SystemMounter};

use crate::commands;

#[derive(Parser)]
#[command(
    name = "diskbind",
    about = "Attach, mount and detach GCE persistent disks on this host",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// GCE instance this host corresponds to (enables gcloud-backed
    /// attach/detach)
    #[arg(long, global = true, env = "DISKBIND_INSTANCE")]
    pub instance: Option<String>,

    /// GCE zone of the instance
    #[arg(long, global = true, env = "DISKBIND_ZONE")]
    pub zone: Option<String>,

    /// Directory holding the by-id device symlinks
    #[arg(long, global = true, default_value = diskbind::device::BY_ID_DIR)]
    pub by_id_dir: PathBuf,
}

impl GlobalFlags {
    /// Build an attacher from the global flags.
    ///
    /// Without `--instance`/`--zone` no provider is configured; local-only
    /// commands still work, attach/detach will report the missing
    /// provider.
    pub fn create_attacher(&self) -> anyhow::Result<DiskAttacher> {
        let provider: Option<Arc<dyn CloudProvider>> = match (&self.instance, &self.zone) {
            (Some(instance), Some(zone)) => {
                Some(Arc::new(GcloudProvider::new(instance.clone(), zone.clone())))
            }
            (None, None) => {
                tracing::debug!("no instance/zone configured; running without a cloud provider");
                None
            }
            _ => anyhow::bail!("--instance and --zone must be given together"),
        };

        Ok(DiskAttacher::with_config(
            provider,
            Arc::new(SystemMounter),
            AttacherConfig::new().with_by_id_dir(&self.by_id_dir),
        ))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Attach a disk to this host and mount it at its global mount path
    Attach(commands::attach::AttachArgs),

    /// Unmount a disk's global mount and detach it from this host
    Detach(commands::detach::DetachArgs),

    /// Print the global mount path for a disk
    MountPath(commands::mount_path::MountPathArgs),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Attach(args) => commands::attach::execute(args, &self.global).await,
            Command::Detach(args) => commands::detach::execute(args, &self.global).await,
            Command::MountPath(args) => commands::mount_path::execute(args),
        }
    }
}

/// Log to stderr, level controlled by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
