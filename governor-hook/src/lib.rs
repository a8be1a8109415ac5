//! Proxmox hookscript setting the cpufreq governor of the cores pinned to a VM
//!
//! On a start phase the cores listed in the VM's `affinity` option are
//! switched to the configured started governor (`performance` by default);
//! on a stop phase they are restored to the stopped governor (`schedutil`).
//! Affinity is queried from the Proxmox API on every run.

pub mod affinity;
pub mod config;
pub mod error;
pub mod governor;
pub mod hook;
pub mod proxmox;

use crate::config::Config;
use crate::governor::GovernorWriter;
use crate::hook::{Hook, HookOutcome, Phase};
use crate::proxmox::ProxmoxClient;
use std::path::PathBuf;
use tracing::info;

pub use crate::error::HookError;

/// Arguments of one hook call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub vmid: u32,
    pub phase: String,
    pub config_path: PathBuf,
    pub sysfs_root: PathBuf,
}

/// Run the hook for one lifecycle event.
///
/// Unsupported phases return `HookOutcome::Ignored` before the config is
/// read or the API is contacted.
pub async fn run(invocation: &Invocation) -> Result<HookOutcome, HookError> {
    let phase = match invocation.phase.parse::<Phase>() {
        Ok(phase) => phase,
        Err(unsupported) => {
            info!("VM {}: {}, nothing to do", invocation.vmid, unsupported);
            return Ok(HookOutcome::Ignored {
                phase: unsupported.0,
            });
        }
    };

    let config = Config::load(&invocation.config_path).await?;
    let api = ProxmoxClient::new(&config)?;
    let writer = GovernorWriter::with_root(&invocation.sysfs_root);

    let mut hook = Hook::new(config, api, writer);
    hook.handle(invocation.vmid, phase).await
}
