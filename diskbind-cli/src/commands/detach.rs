use std::path::PathBuf;

use clap::Args;

use diskbind::{VolumeDescriptor, device};

#[derive(Args, Debug)]
pub struct DetachArgs {
    /// Device path of the attached disk, e.g.
    /// /dev/disk/by-id/google-mydisk-part1
    pub device: PathBuf,

    /// The mount was read-only
    #[arg(long)]
    pub read_only: bool,

    /// Root directory for global mount points
    #[arg(long, default_value = "/var/lib/kubelet")]
    pub root_dir: PathBuf,
}

pub async fn execute(args: DetachArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let canonical = device::canonicalize_device_path(&args.device)?;
    let disk = device::parse_device_name(&args.device, &canonical)?;
    let descriptor =
        VolumeDescriptor::new(disk.as_str(), &args.root_dir).with_read_only(args.read_only);

    let attacher = global.create_attacher()?;
    attacher.detach(&args.device, &descriptor).await?;

    println!("{disk}");
    Ok(())
}
