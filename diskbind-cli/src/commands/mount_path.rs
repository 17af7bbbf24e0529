use std::path::PathBuf;

use clap::Args;

use diskbind::MountLayout;

#[derive(Args, Debug)]
pub struct MountPathArgs {
    /// Cloud identifier of the persistent disk
    #[arg(long)]
    pub disk: String,

    /// Path for a read-only mount
    #[arg(long)]
    pub read_only: bool,

    /// Root directory for global mount points
    #[arg(long, default_value = "/var/lib/kubelet")]
    pub root_dir: PathBuf,
}

pub fn execute(args: MountPathArgs) -> anyhow::Result<()> {
    let path = MountLayout::new(&args.root_dir).global_mount_path(&args.disk, args.read_only);
    println!("{}", path.display());
    Ok(())
}
