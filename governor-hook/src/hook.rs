//! Lifecycle phase dispatch
//!
//! Proxmox calls a hookscript with `<vmid> <phase>` at pre-start,
//! post-start, pre-stop and post-stop. Start phases apply the started
//! governor to the VM's pinned cores, stop phases restore the stopped one.
//! Any other phase is ignored.

use crate::affinity::CoreSet;
use crate::config::{Config, Governor};
use crate::error::{HookError, UnsupportedPhase};
use crate::governor::GovernorWriter;
use crate::proxmox::ManagementApi;
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreStart,
    PostStart,
    PreStop,
    PostStop,
}

/// Governor state a phase drives the cores to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Started,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreStart => "pre-start",
            Phase::PostStart => "post-start",
            Phase::PreStop => "pre-stop",
            Phase::PostStop => "post-stop",
        }
    }

    pub fn target(&self) -> TargetState {
        match self {
            Phase::PreStart | Phase::PostStart => TargetState::Started,
            Phase::PreStop | Phase::PostStop => TargetState::Stopped,
        }
    }
}

impl FromStr for Phase {
    type Err = UnsupportedPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-start" => Ok(Phase::PreStart),
            "post-start" => Ok(Phase::PostStart),
            "pre-stop" => Ok(Phase::PreStop),
            "post-stop" => Ok(Phase::PostStop),
            other => Err(UnsupportedPhase(other.to_string())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Applied {
        phase: Phase,
        governor: Governor,
        cores: CoreSet,
    },
    Ignored {
        phase: String,
    },
}

/// One configured hook run against a management API and a sysfs tree
pub struct Hook<A> {
    config: Config,
    api: A,
    writer: GovernorWriter,
}

impl<A: ManagementApi> Hook<A> {
    pub fn new(config: Config, api: A, writer: GovernorWriter) -> Self {
        Self { config, api, writer }
    }

    pub fn governor_for(&self, target: TargetState) -> &Governor {
        match target {
            TargetState::Started => &self.config.started_state,
            TargetState::Stopped => &self.config.stopped_state,
        }
    }

    /// Authenticate, fetch the VM's cores and write the phase's governor
    pub async fn handle(&mut self, vmid: u32, phase: Phase) -> Result<HookOutcome, HookError> {
        info!("VM {} {}: applying {:?} governor", vmid, phase, phase.target());

        self.api.authenticate().await?;
        let cores = self.api.get_affinity(vmid).await?;

        let governor = self.governor_for(phase.target()).clone();
        self.writer.set_governor(&cores, &governor)?;

        Ok(HookOutcome::Applied {
            phase,
            governor,
            cores,
        })
    }
}
