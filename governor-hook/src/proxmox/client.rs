//! Proxmox VE REST client (`/api2/json`)
//!
//! Handles:
//! - Ticket authentication (`POST /access/ticket`)
//! - Locating the node that hosts a VM (offline nodes skipped)
//! - Reading the VM `affinity` option and expanding it

use super::ManagementApi;
use crate::affinity::{parse_cpu_list, CoreSet};
use crate::config::Config;
use crate::error::{ApiError, AuthError};
use reqwest::header::COOKIE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Response envelope shared by every Proxmox endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    ticket: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    node: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VmEntry {
    vmid: VmId,
}

/// `vmid` is a number on current releases and a string on some older ones
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VmId {
    Number(u32),
    Text(String),
}

impl VmId {
    fn matches(&self, vmid: u32) -> bool {
        match self {
            VmId::Number(n) => *n == vmid,
            VmId::Text(s) => s.trim().parse::<u32>().ok() == Some(vmid),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VmConfig {
    affinity: Option<String>,
}

pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    ticket: Option<String>,
}

impl ProxmoxClient {
    /// Build a client for the endpoint described by `config`
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(concat!("pve-governor-hook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AuthError::Client)?;

        Ok(Self {
            http,
            base_url: config.api_base_url(),
            user: config.user.clone(),
            password: config.password.clone(),
            ticket: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.ticket.is_some()
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let ticket = self.ticket.as_ref().ok_or(ApiError::NotAuthenticated)?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(COOKIE, format!("PVEAuthCookie={}", ticket))
            .send()
            .await
            .map_err(|source| ApiError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status { url, status });
        }

        let envelope: Envelope<T> =
            response
                .json()
                .await
                .map_err(|e| ApiError::MalformedResponse {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        envelope.data.ok_or_else(|| ApiError::MalformedResponse {
            url,
            reason: "missing `data`".to_string(),
        })
    }

    /// Name of the online node currently hosting `vmid`
    async fn locate_vm(&self, vmid: u32) -> Result<String, ApiError> {
        let nodes: Vec<NodeEntry> = self.get_data("/nodes").await?;

        for node in nodes {
            if node.status.as_deref() == Some("offline") {
                debug!("Skipping offline node {}", node.node);
                continue;
            }

            let vms: Vec<VmEntry> = self.get_data(&format!("/nodes/{}/qemu", node.node)).await?;
            if vms.iter().any(|vm| vm.vmid.matches(vmid)) {
                debug!("VM {} found on node {}", vmid, node.node);
                return Ok(node.node);
            }
        }

        Err(ApiError::VmNotFound(vmid))
    }
}

impl ManagementApi for ProxmoxClient {
    async fn authenticate(&mut self) -> Result<(), AuthError> {
        let url = format!("{}/access/ticket", self.base_url);
        info!("Authenticating as {} against {}", self.user, self.base_url);

        let response = self
            .http
            .post(&url)
            .form(&[("username", self.user.as_str()), ("password", self.password.as_str())])
            .send()
            .await
            .map_err(|source| AuthError::Unreachable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials {
                user: self.user.clone(),
            });
        }
        if !status.is_success() {
            return Err(AuthError::Status(status));
        }

        let envelope: Envelope<TicketData> = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        let ticket = envelope.data.ok_or_else(|| AuthError::InvalidCredentials {
            user: self.user.clone(),
        })?;

        if ticket.ticket.is_empty() {
            return Err(AuthError::MalformedResponse("empty ticket".to_string()));
        }

        debug!(
            "Ticket issued for {}",
            ticket.username.as_deref().unwrap_or(&self.user)
        );
        self.ticket = Some(ticket.ticket);
        Ok(())
    }

    async fn get_affinity(&self, vmid: u32) -> Result<CoreSet, ApiError> {
        let node = self.locate_vm(vmid).await?;
        let config: VmConfig = self
            .get_data(&format!("/nodes/{}/qemu/{}/config", node, vmid))
            .await?;

        let Some(list) = config.affinity.filter(|a| !a.trim().is_empty()) else {
            warn!(
                "VM {} has no CPU affinity configured, no core governor will be changed",
                vmid
            );
            return Ok(CoreSet::new());
        };

        let cores = parse_cpu_list(&list)
            .map_err(|source| ApiError::MalformedAffinity { vmid, source })?;
        info!("VM {} pinned to cores {:?} ({})", vmid, cores, list);
        Ok(cores)
    }
}
