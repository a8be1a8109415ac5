/*!
Faux serveur API Proxmox pour tests sans cluster

Expose en HTTP clair sur 127.0.0.1 les endpoints utilisés par le hook:
- POST /api2/json/access/ticket
- GET  /api2/json/nodes
- GET  /api2/json/nodes/{node}/qemu
- GET  /api2/json/nodes/{node}/qemu/{vmid}/config

Toutes les requêtes reçues sont enregistrées ("METHOD /path").
*/

use anyhow::{Context, Result};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

const STUB_TICKET: &str = "PVE:root@pam:65F0A1B2::c3R1Yi10aWNrZXQ=";

/// Code renvoyé par Proxmox quand un nœud ne répond pas
const NODE_OFFLINE_STATUS: u16 = 595;

/// Réponse HTTP brute (statut + corps) servie telle quelle
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    fn to_response(&self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, "application/json")], self.body.clone()).into_response()
    }
}

#[derive(Debug, Clone)]
pub struct StubVm {
    pub vmid: u32,
    pub affinity: Option<String>,
    /// Remplace la réponse de `/config` (corps invalide, erreur HTTP...)
    pub raw_config: Option<RawResponse>,
}

#[derive(Debug, Clone)]
pub struct StubNode {
    pub name: String,
    pub online: bool,
    pub vms: Vec<StubVm>,
}

impl StubNode {
    pub fn online(name: &str) -> Self {
        Self {
            name: name.to_string(),
            online: true,
            vms: Vec::new(),
        }
    }

    pub fn offline(name: &str) -> Self {
        Self {
            online: false,
            ..Self::online(name)
        }
    }

    /// Ajoute une VM; `affinity` à `None` = VM non épinglée
    pub fn with_vm(mut self, vmid: u32, affinity: Option<&str>) -> Self {
        self.vms.push(StubVm {
            vmid,
            affinity: affinity.map(String::from),
            raw_config: None,
        });
        self
    }

    /// Ajoute une VM dont `/config` renvoie `status` et `body` bruts
    pub fn with_raw_config(mut self, vmid: u32, status: u16, body: &str) -> Self {
        self.vms.push(StubVm {
            vmid,
            affinity: None,
            raw_config: Some(RawResponse::new(status, body)),
        });
        self
    }
}

struct StubState {
    user: String,
    password: String,
    nodes: Vec<StubNode>,
    raw_ticket: Option<RawResponse>,
    requests: Mutex<Vec<String>>,
}

impl StubState {
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("PVEAuthCookie={}", STUB_TICKET);
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').any(|c| c.trim() == expected))
            .unwrap_or(false)
    }

    fn node(&self, name: &str) -> Option<&StubNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Serveur HTTP lancé en tâche de fond, arrêté au drop
pub struct MockProxmoxServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl MockProxmoxServer {
    /// Démarre le serveur sur un port libre avec les identifiants attendus
    pub async fn start(user: &str, password: &str, nodes: Vec<StubNode>) -> Result<Self> {
        Self::launch(user, password, nodes, None).await
    }

    /// Démarre un serveur dont `/access/ticket` renvoie toujours `ticket`
    pub async fn start_with_ticket_response(
        user: &str,
        password: &str,
        ticket: RawResponse,
    ) -> Result<Self> {
        Self::launch(user, password, Vec::new(), Some(ticket)).await
    }

    async fn launch(
        user: &str,
        password: &str,
        nodes: Vec<StubNode>,
        raw_ticket: Option<RawResponse>,
    ) -> Result<Self> {
        env_logger::try_init().ok();

        let state = Arc::new(StubState {
            user: user.to_string(),
            password: password.to_string(),
            nodes,
            raw_ticket,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api2/json/access/ticket", post(create_ticket))
            .route("/api2/json/nodes", get(list_nodes))
            .route("/api2/json/nodes/{node}/qemu", get(list_vms))
            .route("/api2/json/nodes/{node}/qemu/{vmid}/config", get(vm_config))
            .layer(middleware::from_fn_with_state(state.clone(), record_request))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind stub Proxmox API")?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("❌ [STUB] Proxmox API stopped: {}", e);
            }
        });

        log::info!("🚀 [STUB] Proxmox API listening on {}", addr);
        Ok(Self { addr, state, handle })
    }

    /// URL de base à mettre dans `api_url`
    pub fn base_url(&self) -> String {
        format!("http://{}/api2/json", self.addr)
    }

    /// Requêtes reçues, dans l'ordre
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockProxmoxServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record_request(State(state): State<Arc<StubState>>, req: Request, next: Next) -> Response {
    let line = format!("{} {}", req.method(), req.uri().path());
    log::info!("📨 [STUB] {}", line);
    state.requests.lock().unwrap().push(line);
    next.run(req).await
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn create_ticket(
    State(state): State<Arc<StubState>>,
    Form(login): Form<LoginForm>,
) -> Response {
    if let Some(raw) = &state.raw_ticket {
        return raw.to_response();
    }
    if login.username != state.user || login.password != state.password {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "data": null }))).into_response();
    }

    Json(json!({
        "data": {
            "ticket": STUB_TICKET,
            "CSRFPreventionToken": "65F0A1B2:c3R1Yi1jc3Jm",
            "username": login.username,
        }
    }))
    .into_response()
}

async fn list_nodes(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let nodes: Vec<Value> = state
        .nodes
        .iter()
        .map(|n| {
            json!({
                "node": n.name,
                "status": if n.online { "online" } else { "offline" },
            })
        })
        .collect();

    Json(json!({ "data": nodes })).into_response()
}

async fn list_vms(
    State(state): State<Arc<StubState>>,
    Path(node): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(node) = state.node(&node) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "data": null }))).into_response();
    };
    if !node.online {
        let status = StatusCode::from_u16(NODE_OFFLINE_STATUS).unwrap_or(StatusCode::BAD_GATEWAY);
        return status.into_response();
    }

    let vms: Vec<Value> = node
        .vms
        .iter()
        .map(|vm| json!({ "vmid": vm.vmid, "status": "running" }))
        .collect();

    Json(json!({ "data": vms })).into_response()
}

async fn vm_config(
    State(state): State<Arc<StubState>>,
    Path((node, vmid)): Path<(String, u32)>,
    headers: HeaderMap,
) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let vm = state
        .node(&node)
        .and_then(|n| n.vms.iter().find(|vm| vm.vmid == vmid));
    let Some(vm) = vm else {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "data": null }))).into_response();
    };
    if let Some(raw) = &vm.raw_config {
        return raw.to_response();
    }

    let mut config = json!({ "cores": 4, "name": format!("vm{}", vmid) });
    if let Some(affinity) = &vm.affinity {
        config["affinity"] = Value::String(affinity.clone());
    }

    Json(json!({ "data": config })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_node_builder() {
        let node = StubNode::offline("pve2")
            .with_vm(101, Some("0-1"))
            .with_raw_config(102, 500, "oops");
        assert!(!node.online);
        assert_eq!(node.vms[0].affinity.as_deref(), Some("0-1"));
        assert_eq!(node.vms[1].raw_config.as_ref().map(|r| r.status), Some(500));
    }

    #[tokio::test]
    async fn test_server_records_requests() {
        let server = MockProxmoxServer::start("root@pam", "pw", vec![StubNode::online("pve1")])
            .await
            .unwrap();

        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        assert!(server.requests().is_empty());
    }
}
