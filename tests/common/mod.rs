//! In-process mock of the manager's REST API for integration tests.
//!
//! Executions start `pending` and turn `terminated` after a configurable
//! number of execution list polls, so the harness's waiting logic gets
//! exercised for real.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TENANT: &str = "default_tenant";

#[derive(Debug, Clone)]
pub struct MockExecution {
    pub id: String,
    pub tenant: String,
    pub deployment_id: String,
    pub workflow_id: String,
    pub status: String,
    pub is_system: bool,
    pub polls_left: u32,
}

#[derive(Debug, Default)]
pub struct ManagerState {
    pub tenants: BTreeSet<String>,
    pub blueprints: HashMap<String, Vec<String>>,
    pub deployments: HashMap<String, Vec<(String, String)>>,
    pub deployment_inputs: HashMap<String, Value>,
    pub executions: Vec<MockExecution>,
    pub plugins: HashMap<String, usize>,
    /// Execution list polls before a new execution terminates
    pub execution_polls: u32,
    /// Fail every Nth deployment creation with a 500
    pub fail_every_nth_deployment: Option<usize>,
    /// Leave executions in this state instead of terminating them
    pub stuck_status: Option<String>,
    pub deployment_delay_ms: u64,
    pub deployment_attempts: usize,
    pub execution_list_calls: usize,
    next_id: usize,
}

#[derive(Clone, Default)]
pub struct MockManager {
    state: Arc<Mutex<ManagerState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockManager {
    pub fn new() -> Self {
        let manager = Self::default();
        manager.state.lock().tenants.insert(DEFAULT_TENANT.to_string());
        manager
    }

    pub fn configure(&self, f: impl FnOnce(&mut ManagerState)) {
        f(&mut self.state.lock());
    }

    pub fn deployments_in(&self, tenant: &str) -> usize {
        self.state
            .lock()
            .deployments
            .get(tenant)
            .map(|d| d.len())
            .unwrap_or(0)
    }

    pub fn blueprints_in(&self, tenant: &str) -> usize {
        self.state
            .lock()
            .blueprints
            .get(tenant)
            .map(|b| b.len())
            .unwrap_or(0)
    }

    pub fn plugins_in(&self, tenant: &str) -> usize {
        self.state.lock().plugins.get(tenant).copied().unwrap_or(0)
    }

    pub fn tenants(&self) -> BTreeSet<String> {
        self.state.lock().tenants.clone()
    }

    pub fn executions(&self) -> Vec<MockExecution> {
        self.state.lock().executions.clone()
    }

    pub fn deployment_inputs(&self, deployment_id: &str) -> Option<Value> {
        self.state.lock().deployment_inputs.get(deployment_id).cloned()
    }

    pub fn all_deployment_ids(&self, tenant: &str) -> Vec<String> {
        self.state
            .lock()
            .deployments
            .get(tenant)
            .map(|d| d.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn execution_list_calls(&self) -> usize {
        self.state.lock().execution_list_calls
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Serve on an ephemeral port and return the base URL
    pub async fn spawn(&self) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock manager");
        let addr = listener.local_addr().expect("mock manager address");
        let server = axum::Server::from_tcp(listener)
            .expect("mock manager listener")
            .serve(router(self.clone()).into_make_service());
        tokio::spawn(async move {
            let _ = server.await;
        });
        format!("http://{}", addr)
    }
}

fn router(manager: MockManager) -> Router {
    Router::new()
        .route("/api/v3.1/blueprints", get(list_blueprints))
        .route("/api/v3.1/blueprints/:id", put(upload_blueprint))
        .route("/api/v3.1/deployments", get(list_deployments))
        .route(
            "/api/v3.1/deployments/:id",
            put(create_deployment).delete(delete_deployment),
        )
        .route(
            "/api/v3.1/executions",
            get(list_executions).post(start_execution),
        )
        .route("/api/v3.1/tenants", get(list_tenants))
        .route(
            "/api/v3.1/tenants/:name",
            post(create_tenant).delete(delete_tenant),
        )
        .route("/api/v3.1/plugins", post(upload_plugin))
        .with_state(manager)
}

type Params = Query<Vec<(String, String)>>;

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn paginated(items: Vec<Value>, params: &[(String, String)]) -> Response {
    let total = items.len();
    let offset: usize = param(params, "_offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let size: usize = param(params, "_size")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);
    let page: Vec<Value> = items.into_iter().skip(offset).take(size).collect();
    Json(json!({
        "items": page,
        "metadata": {"pagination": {"total": total, "offset": offset, "size": size}}
    }))
    .into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"message": message}))).into_response()
}

/// Authenticated tenant of the request, or the rejection to send back
fn tenant_of(manager: &MockManager, headers: &HeaderMap) -> Result<String, Response> {
    if !headers.contains_key("authorization") {
        return Err(error(StatusCode::UNAUTHORIZED, "missing credentials"));
    }
    let tenant = headers
        .get("Tenant")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_TENANT)
        .to_string();
    if !manager.state.lock().tenants.contains(&tenant) {
        return Err(error(StatusCode::FORBIDDEN, "unknown tenant"));
    }
    Ok(tenant)
}

macro_rules! tenant_or_reject {
    ($manager:expr, $headers:expr) => {
        match tenant_of(&$manager, &$headers) {
            Ok(tenant) => tenant,
            Err(response) => return response,
        }
    };
}

async fn upload_blueprint(
    State(manager): State<MockManager>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Params,
    body: Bytes,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    if param(&params, "application_file_name").is_none() {
        return error(StatusCode::BAD_REQUEST, "application_file_name is required");
    }
    // gzip magic
    if body.len() < 2 || body[0] != 0x1f || body[1] != 0x8b {
        return error(StatusCode::BAD_REQUEST, "blueprint archive must be gzipped");
    }
    let mut state = manager.state.lock();
    let blueprints = state.blueprints.entry(tenant).or_default();
    if blueprints.contains(&id) {
        return error(StatusCode::CONFLICT, "blueprint already exists");
    }
    blueprints.push(id.clone());
    Json(json!({"id": id})).into_response()
}

async fn list_blueprints(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    let all_tenants = param(&params, "_all_tenants") == Some("true");
    let items: Vec<Value> = {
        let state = manager.state.lock();
        state
            .blueprints
            .iter()
            .filter(|(t, _)| all_tenants || **t == tenant)
            .flat_map(|(_, ids)| ids.iter().map(|id| json!({"id": id})))
            .collect()
    };
    paginated(items, &params)
}

async fn create_deployment(
    State(manager): State<MockManager>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);

    let in_flight = manager.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    manager.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
    let delay_ms = manager.state.lock().deployment_delay_ms;
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    let response = register_deployment(&manager, &tenant, id, body);
    manager.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

fn register_deployment(manager: &MockManager, tenant: &str, id: String, body: Value) -> Response {
    let mut state = manager.state.lock();
    state.deployment_attempts += 1;
    if let Some(nth) = state.fail_every_nth_deployment {
        if state.deployment_attempts % nth == 0 {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
        }
    }

    let Some(blueprint_id) = body.get("blueprint_id").and_then(|b| b.as_str()) else {
        return error(StatusCode::BAD_REQUEST, "blueprint_id is required");
    };
    let blueprint_known = state
        .blueprints
        .get(tenant)
        .map(|b| b.iter().any(|known| known == blueprint_id))
        .unwrap_or(false);
    if !blueprint_known {
        return error(StatusCode::NOT_FOUND, "blueprint not found");
    }
    let blueprint_id = blueprint_id.to_string();

    let deployments = state.deployments.entry(tenant.to_string()).or_default();
    if deployments.iter().any(|(existing, _)| *existing == id) {
        return error(StatusCode::CONFLICT, "deployment already exists");
    }
    deployments.push((id.clone(), blueprint_id.clone()));
    state
        .deployment_inputs
        .insert(id.clone(), body.get("inputs").cloned().unwrap_or(Value::Null));
    push_execution(&mut state, tenant, &id, "create_deployment_environment", true);

    Json(json!({"id": id, "blueprint_id": blueprint_id})).into_response()
}

fn push_execution(
    state: &mut ManagerState,
    tenant: &str,
    deployment_id: &str,
    workflow_id: &str,
    is_system: bool,
) -> MockExecution {
    state.next_id += 1;
    let execution = MockExecution {
        id: format!("exec-{}", state.next_id),
        tenant: tenant.to_string(),
        deployment_id: deployment_id.to_string(),
        workflow_id: workflow_id.to_string(),
        status: "pending".to_string(),
        is_system,
        polls_left: state.execution_polls,
    };
    state.executions.push(execution.clone());
    execution
}

async fn list_deployments(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    let items: Vec<Value> = {
        let state = manager.state.lock();
        state
            .deployments
            .get(&tenant)
            .map(|d| {
                d.iter()
                    .map(|(id, bp)| json!({"id": id, "blueprint_id": bp}))
                    .collect()
            })
            .unwrap_or_default()
    };
    paginated(items, &params)
}

async fn delete_deployment(
    State(manager): State<MockManager>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    let mut state = manager.state.lock();
    let deployments = state.deployments.entry(tenant).or_default();
    let Some(pos) = deployments.iter().position(|(existing, _)| *existing == id) else {
        return error(StatusCode::NOT_FOUND, "deployment not found");
    };
    deployments.remove(pos);
    Json(json!({"id": id})).into_response()
}

async fn start_execution(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    let deployment_id = body
        .get("deployment_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let workflow_id = body
        .get("workflow_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut state = manager.state.lock();
    let exists = state
        .deployments
        .get(&tenant)
        .map(|d| d.iter().any(|(id, _)| *id == deployment_id))
        .unwrap_or(false);
    if !exists {
        return error(StatusCode::NOT_FOUND, "deployment not found");
    }
    let execution = push_execution(&mut state, &tenant, &deployment_id, &workflow_id, false);
    Json(execution_json(&execution)).into_response()
}

fn execution_json(execution: &MockExecution) -> Value {
    json!({
        "id": execution.id,
        "deployment_id": execution.deployment_id,
        "workflow_id": execution.workflow_id,
        "status": execution.status,
        "is_system_workflow": execution.is_system,
    })
}

async fn list_executions(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    let include_system = param(&params, "_include_system_workflows") == Some("true");
    let statuses: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "status")
        .map(|(_, v)| v.as_str())
        .collect();

    let items: Vec<Value> = {
        let mut state = manager.state.lock();
        state.execution_list_calls += 1;
        let stuck = state.stuck_status.clone();
        for execution in state.executions.iter_mut() {
            if execution.status == "terminated" {
                continue;
            }
            if let Some(stuck) = &stuck {
                execution.status = stuck.clone();
                continue;
            }
            if execution.polls_left == 0 {
                execution.status = "terminated".to_string();
            } else {
                execution.polls_left -= 1;
                execution.status = "started".to_string();
            }
        }
        state
            .executions
            .iter()
            .filter(|e| e.tenant == tenant)
            .filter(|e| include_system || !e.is_system)
            .filter(|e| statuses.is_empty() || statuses.contains(&e.status.as_str()))
            .map(execution_json)
            .collect()
    };
    paginated(items, &params)
}

async fn create_tenant(
    State(manager): State<MockManager>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let _ = tenant_or_reject!(manager, headers);
    let mut state = manager.state.lock();
    if !state.tenants.insert(name.clone()) {
        return error(StatusCode::CONFLICT, "tenant already exists");
    }
    Json(json!({"name": name})).into_response()
}

async fn delete_tenant(
    State(manager): State<MockManager>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let _ = tenant_or_reject!(manager, headers);
    let mut state = manager.state.lock();
    if !state.tenants.remove(&name) {
        return error(StatusCode::NOT_FOUND, "tenant not found");
    }
    Json(json!({"name": name})).into_response()
}

async fn list_tenants(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    let _ = tenant_or_reject!(manager, headers);
    let items: Vec<Value> = manager
        .state
        .lock()
        .tenants
        .iter()
        .map(|name| json!({"name": name}))
        .collect();
    paginated(items, &params)
}

async fn upload_plugin(
    State(manager): State<MockManager>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tenant = tenant_or_reject!(manager, headers);
    if body.is_empty() {
        return error(StatusCode::BAD_REQUEST, "empty plugin package");
    }
    let mut state = manager.state.lock();
    state.next_id += 1;
    let id = format!("plugin-{}", state.next_id);
    *state.plugins.entry(tenant).or_insert(0) += 1;
    Json(json!({"id": id, "package_name": "scale-plugin"})).into_response()
}

/// Resources directory laid out like the real one: typed blueprints, the
/// simple blueprint, an inputs file and a plugin package
pub fn resources_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("resources dir");
    let examples = dir.path().join("blueprint-examples");
    fs::create_dir_all(&examples).expect("blueprint-examples dir");
    for name in [
        "monitoring-blueprint.yaml",
        "no-monitoring-blueprint.yaml",
        "agentless-blueprint.yaml",
        "simple-blueprint.yaml",
    ] {
        fs::write(
            examples.join(name),
            "tosca_definitions_version: cloudify_dsl_1_3\nnode_templates: {}\n",
        )
        .expect("blueprint file");
    }
    fs::write(
        dir.path().join("inputs.json"),
        r#"{"image": "centos-7", "flavor": "m1.small"}"#,
    )
    .expect("inputs file");
    fs::write(dir.path().join("plugin.wgn"), b"wagon").expect("plugin file");
    dir
}

/// Retry policy short enough for tests
pub fn fast_poll() -> scaletest::retry::RetryPolicy {
    scaletest::retry::RetryPolicy::fixed(20, Duration::from_millis(25))
}

pub fn client_for(base_url: &str) -> Arc<scaletest::HttpManagerClient> {
    Arc::new(
        scaletest::HttpManagerClient::new(
            base_url,
            "admin",
            "admin",
            DEFAULT_TENANT,
            Duration::from_secs(10),
        )
        .expect("http client"),
    )
}

/// Creator against `base_url` using the monitoring blueprint and inputs file
pub fn creator_for(
    base_url: &str,
    resources: &std::path::Path,
) -> scaletest::ConcurrentResourceCreator {
    let attributes = scaletest::blueprint::BlueprintAttributes {
        floating_network_id: "net-float".to_string(),
        keypair_name: "scale-key".to_string(),
        network_name: "scale-net".to_string(),
        remote_private_key_path: "/etc/manager/key.pem".to_string(),
    };
    let example = scaletest::blueprint::BlueprintExample::new(
        resources,
        "blueprint-examples/monitoring-blueprint.yaml",
        Some("inputs.json"),
        attributes,
    )
    .expect("blueprint example");
    scaletest::ConcurrentResourceCreator::new(client_for(base_url), example, fast_poll())
}
