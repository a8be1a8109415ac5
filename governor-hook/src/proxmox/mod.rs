//! Management API capability
//!
//! The dispatcher only needs two things from the cluster: a session and the
//! pinned cores of one VM. `ManagementApi` is that seam; `ProxmoxClient`
//! implements it over the Proxmox VE REST API.

mod client;

pub use client::ProxmoxClient;

use crate::affinity::CoreSet;
use crate::error::{ApiError, AuthError};

#[allow(async_fn_in_trait)]
pub trait ManagementApi {
    /// Exchange the configured credentials for a session ticket
    async fn authenticate(&mut self) -> Result<(), AuthError>;

    /// Cores pinned to `vmid`; empty when the VM has no affinity configured
    async fn get_affinity(&self, vmid: u32) -> Result<CoreSet, ApiError>;
}
