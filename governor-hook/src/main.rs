//! pve-governor-hook - Proxmox VM hookscript
//!
//! Usage: `pve-governor-hook <vmid> <phase>`. Exits 0 on success or when the
//! phase is not handled, non-zero on any failure so Proxmox can react.

use anyhow::{Context, Result};
use clap::Parser;
use governor_hook::config::Config;
use governor_hook::governor::SYSFS_CPU_ROOT;
use governor_hook::hook::HookOutcome;
use governor_hook::Invocation;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Set CPU governors for the cores pinned to a Proxmox VM")]
struct Cli {
    /// ID of the VM the event is for
    vmid: u32,

    /// Lifecycle phase (pre-start, post-start, pre-stop, post-stop)
    phase: String,

    /// Config file (defaults to $GOVERNOR_HOOK_CONFIG, then /etc/proxmox-hook-cpu-affinity-hook.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root of the sysfs cpu tree
    #[arg(long, default_value = SYSFS_CPU_ROOT, hide = true)]
    sysfs_root: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let invocation = Invocation {
        vmid: cli.vmid,
        phase: cli.phase,
        config_path: Config::resolve_path(cli.config),
        sysfs_root: cli.sysfs_root,
    };

    let outcome = governor_hook::run(&invocation)
        .await
        .with_context(|| format!("hook failed for VM {} ({})", invocation.vmid, invocation.phase))?;

    match outcome {
        HookOutcome::Applied { phase, governor, cores } => {
            info!("VM {} {}: governor `{}` on {} cores", invocation.vmid, phase, governor, cores.len());
        }
        HookOutcome::Ignored { phase } => {
            info!("VM {} {}: ignored", invocation.vmid, phase);
        }
    }

    Ok(())
}
