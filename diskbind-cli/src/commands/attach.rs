use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use diskbind::{MountLayout, VolumeDescriptor, api};

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Cloud identifier of the persistent disk
    #[arg(long, required_unless_present = "from_file", conflicts_with = "from_file")]
    pub disk: Option<String>,

    /// Decimal partition number (whole disk when omitted)
    #[arg(long)]
    pub partition: Option<String>,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,

    /// Root directory for global mount points
    #[arg(long, default_value = "/var/lib/kubelet")]
    pub root_dir: PathBuf,

    /// Filesystem type passed to mount
    #[arg(long, default_value = diskbind::descriptor::DEFAULT_FS_TYPE)]
    pub fs_type: String,

    /// Read a versioned JSON volume payload instead of flags
    #[arg(long, value_name = "FILE")]
    pub from_file: Option<PathBuf>,
}

pub async fn execute(args: AttachArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let descriptor = descriptor_from(&args)?;
    let attacher = global.create_attacher()?;

    attacher.attach(&descriptor).await?;

    let mount_path = MountLayout::new(&descriptor.root_dir)
        .global_mount_path(&descriptor.disk_id, descriptor.read_only);
    println!("{}", mount_path.display());
    Ok(())
}

fn descriptor_from(args: &AttachArgs) -> anyhow::Result<VolumeDescriptor> {
    if let Some(path) = &args.from_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(api::decode_volume(&data, &args.root_dir)?);
    }

    let disk = args.disk.clone().context("--disk is required")?;
    let mut descriptor = VolumeDescriptor::new(disk, &args.root_dir)
        .with_read_only(args.read_only)
        .with_fs_type(&args.fs_type);
    if let Some(partition) = &args.partition {
        descriptor = descriptor.with_partition(partition);
    }
    Ok(descriptor)
}
