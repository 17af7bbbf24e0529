//! Cloud control-plane capability.
//!
//! Attaching a disk to the host's device list (and detaching it again) is
//! a remote control-plane action. The lifecycle manager only sees the
//! [`CloudProvider`] trait; the concrete client is injected at
//! construction time.

use std::path::PathBuf;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::process::Command;

/// Remote attach/detach of a persistent disk for this host.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Attach `disk_id` to this host's device list.
    ///
    /// Returning `Ok` means the control plane accepted the attach; the
    /// local device node may still lag behind.
    async fn attach_disk(&self, disk_id: &str, read_only: bool) -> anyhow::Result<()>;

    /// Detach `disk_id` from this host's device list.
    async fn detach_disk(&self, disk_id: &str) -> anyhow::Result<()>;
}

/// [`CloudProvider`] that delegates to the `gcloud` binary.
///
/// Keeps the crate free of any API transport; credentials and endpoint
/// handling stay with the installed SDK.
pub struct GcloudProvider {
    instance: String,
    zone: String,
    binary: PathBuf,
}

impl GcloudProvider {
    /// Provider for one GCE instance in one zone.
    pub fn new(instance: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            zone: zone.into(),
            binary: PathBuf::from("gcloud"),
        }
    }

    /// Override the `gcloud` binary location.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn attach_args(&self, disk_id: &str, read_only: bool) -> Vec<String> {
        let mut args = vec![
            "compute".to_string(),
            "instances".to_string(),
            "attach-disk".to_string(),
            self.instance.clone(),
            format!("--disk={disk_id}"),
            format!("--device-name={disk_id}"),
            format!("--zone={}", self.zone),
        ];
        if read_only {
            args.push("--mode=ro".to_string());
        }
        args
    }

    fn detach_args(&self, disk_id: &str) -> Vec<String> {
        vec![
            "compute".to_string(),
            "instances".to_string(),
            "detach-disk".to_string(),
            self.instance.clone(),
            format!("--disk={disk_id}"),
            format!("--zone={}", self.zone),
        ]
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<()> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary.display()))?;

        if !output.status.success() {
            bail!(
                "gcloud {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for GcloudProvider {
    async fn attach_disk(&self, disk_id: &str, read_only: bool) -> anyhow::Result<()> {
        tracing::info!(disk = disk_id, instance = %self.instance, read_only, "attaching disk");
        self.run(&self.attach_args(disk_id, read_only)).await
    }

    async fn detach_disk(&self, disk_id: &str) -> anyhow::Result<()> {
        tracing::info!(disk = disk_id, instance = %self.instance, "detaching disk");
        self.run(&self.detach_args(disk_id)).await
    }
}
