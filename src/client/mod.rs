use crate::blueprint::{BlueprintArchive, PluginPackage};
use crate::constants::{PAGINATION_OFFSET, PAGINATION_SIZE, TERMINATED_STATE};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod http;

pub use http::HttpManagerClient;

/// Lifecycle state of a workflow execution, as reported by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Terminated,
    Failed,
    Cancelled,
    Pending,
    Started,
    Cancelling,
    ForceCancelling,
}

impl ExecutionStatus {
    pub const ALL: [ExecutionStatus; 7] = [
        ExecutionStatus::Terminated,
        ExecutionStatus::Failed,
        ExecutionStatus::Cancelled,
        ExecutionStatus::Pending,
        ExecutionStatus::Started,
        ExecutionStatus::Cancelling,
        ExecutionStatus::ForceCancelling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminated => TERMINATED_STATE,
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Cancelling => "cancelling",
            Self::ForceCancelling => "force_cancelling",
        }
    }

    /// Every state except terminated. Failed and cancelled executions count
    /// as outstanding so that a broken run never looks drained.
    pub fn not_terminated() -> Vec<ExecutionStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| *s != ExecutionStatus::Terminated)
            .collect()
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub blueprint_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    #[serde(default)]
    pub deployment_id: Option<String>,
    pub workflow_id: String,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    #[serde(default)]
    pub package_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMetadata {
    pub pagination: Pagination,
}

/// Paginated list envelope returned by every list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub metadata: ListMetadata,
}

impl<T> ListResponse<T> {
    /// Items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total matching resources on the manager, across pages
    pub fn total(&self) -> u64 {
        self.metadata.pagination.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub offset: u64,
    pub size: u64,
    pub all_tenants: bool,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            offset: PAGINATION_OFFSET,
            size: PAGINATION_SIZE,
            all_tenants: false,
        }
    }
}

impl ListParams {
    pub fn all_tenants() -> Self {
        Self {
            all_tenants: true,
            ..Self::default()
        }
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("_offset", self.offset.to_string()),
            ("_size", self.size.to_string()),
        ];
        if self.all_tenants {
            pairs.push(("_all_tenants", "true".to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub include_system_workflows: bool,
    pub statuses: Vec<ExecutionStatus>,
}

impl ExecutionFilter {
    /// Filter matching anything still keeping the manager busy
    pub fn active_or_failed() -> Self {
        Self {
            include_system_workflows: true,
            statuses: ExecutionStatus::not_terminated(),
        }
    }
}

/// Operations the scale tests need from the manager's REST API
#[async_trait]
pub trait ManagerClient: Send + Sync {
    /// Tenant every request of this client is scoped to
    fn tenant(&self) -> &str;

    /// Same credentials, scoped to another tenant
    fn for_tenant(&self, tenant: &str) -> Arc<dyn ManagerClient>;

    async fn upload_blueprint(
        &self,
        archive: &BlueprintArchive,
        blueprint_id: &str,
    ) -> Result<Blueprint>;
    async fn list_blueprints(&self, params: &ListParams) -> Result<ListResponse<Blueprint>>;

    async fn create_deployment(
        &self,
        blueprint_id: &str,
        deployment_id: &str,
        inputs: Option<&serde_json::Value>,
    ) -> Result<Deployment>;
    async fn list_deployments(&self, params: &ListParams) -> Result<ListResponse<Deployment>>;
    async fn delete_deployment(&self, deployment_id: &str) -> Result<()>;

    async fn start_execution(
        &self,
        deployment_id: &str,
        workflow_id: &str,
        force: bool,
    ) -> Result<Execution>;
    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
        params: &ListParams,
    ) -> Result<ListResponse<Execution>>;

    async fn create_tenant(&self, name: &str) -> Result<Tenant>;
    async fn delete_tenant(&self, name: &str) -> Result<()>;
    async fn list_tenants(&self, params: &ListParams) -> Result<ListResponse<Tenant>>;

    async fn upload_plugin(&self, package: &PluginPackage) -> Result<Plugin>;
}
