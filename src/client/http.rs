use crate::blueprint::{BlueprintArchive, PluginPackage};
use crate::client::{
    Blueprint, Deployment, Execution, ExecutionFilter, ListParams, ListResponse, ManagerClient,
    Plugin, Tenant,
};
use crate::config::ScaleConfig;
use crate::constants::{API_BASE_PATH, TENANT_HEADER};
use crate::error::{Result, ScaleTestError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// REST client for the manager, authenticated with basic auth and scoped to
/// one tenant through the `Tenant` header.
#[derive(Clone)]
pub struct HttpManagerClient {
    base_url: String,
    username: String,
    password: String,
    tenant: String,
    client: Client,
}

impl HttpManagerClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        tenant: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScaleTestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            tenant: tenant.to_string(),
            client,
        })
    }

    pub fn from_config(config: &ScaleConfig) -> Result<Self> {
        Self::new(
            &config.manager_url,
            &config.username,
            &config.password,
            &config.tenant,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_BASE_PATH, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(TENANT_HEADER, &self.tenant)
    }

    async fn send(&self, method: Method, url: &str, builder: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|source| ScaleTestError::Transport {
                method: method.to_string(),
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        crate::log_remote_operation!(
            method.as_str(),
            status.as_u16(),
            start.elapsed().as_millis() as u64
        );

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<unreadable body: {}>", e),
            };
            return Err(ScaleTestError::Api {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(method.clone(), url, builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| ScaleTestError::Transport {
                method: method.to_string(),
                url: url.to_string(),
                source,
            })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &ListParams,
    ) -> Result<ListResponse<T>> {
        let url = self.url(path);
        let builder = self
            .request(Method::GET, &url)
            .query(&params.query_pairs());
        self.send_json(Method::GET, &url, builder).await
    }
}

#[async_trait]
impl ManagerClient for HttpManagerClient {
    fn tenant(&self) -> &str {
        &self.tenant
    }

    fn for_tenant(&self, tenant: &str) -> Arc<dyn ManagerClient> {
        let mut scoped = self.clone();
        scoped.tenant = tenant.to_string();
        Arc::new(scoped)
    }

    async fn upload_blueprint(
        &self,
        archive: &BlueprintArchive,
        blueprint_id: &str,
    ) -> Result<Blueprint> {
        let url = self.url(&format!("/blueprints/{}", blueprint_id));
        let builder = self
            .request(Method::PUT, &url)
            .query(&[("application_file_name", archive.application_file_name.as_str())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(archive.bytes.to_vec());
        self.send_json(Method::PUT, &url, builder).await
    }

    async fn list_blueprints(&self, params: &ListParams) -> Result<ListResponse<Blueprint>> {
        self.get_list("/blueprints", params).await
    }

    async fn create_deployment(
        &self,
        blueprint_id: &str,
        deployment_id: &str,
        inputs: Option<&serde_json::Value>,
    ) -> Result<Deployment> {
        let url = self.url(&format!("/deployments/{}", deployment_id));
        let body = serde_json::json!({
            "blueprint_id": blueprint_id,
            "inputs": inputs.cloned().unwrap_or_else(|| serde_json::json!({})),
        });
        let builder = self.request(Method::PUT, &url).json(&body);
        self.send_json(Method::PUT, &url, builder).await
    }

    async fn list_deployments(&self, params: &ListParams) -> Result<ListResponse<Deployment>> {
        self.get_list("/deployments", params).await
    }

    async fn delete_deployment(&self, deployment_id: &str) -> Result<()> {
        let url = self.url(&format!("/deployments/{}", deployment_id));
        let builder = self.request(Method::DELETE, &url);
        self.send(Method::DELETE, &url, builder).await?;
        Ok(())
    }

    async fn start_execution(
        &self,
        deployment_id: &str,
        workflow_id: &str,
        force: bool,
    ) -> Result<Execution> {
        let url = self.url("/executions");
        let body = serde_json::json!({
            "deployment_id": deployment_id,
            "workflow_id": workflow_id,
            "force": force,
            "parameters": {},
        });
        let builder = self.request(Method::POST, &url).json(&body);
        self.send_json(Method::POST, &url, builder).await
    }

    async fn list_executions(
        &self,
        filter: &ExecutionFilter,
        params: &ListParams,
    ) -> Result<ListResponse<Execution>> {
        let url = self.url("/executions");
        let mut query = params.query_pairs();
        if filter.include_system_workflows {
            query.push(("_include_system_workflows", "true".to_string()));
        }
        for status in &filter.statuses {
            query.push(("status", status.as_str().to_string()));
        }
        let builder = self.request(Method::GET, &url).query(&query);
        self.send_json(Method::GET, &url, builder).await
    }

    async fn create_tenant(&self, name: &str) -> Result<Tenant> {
        let url = self.url(&format!("/tenants/{}", name));
        let builder = self.request(Method::POST, &url);
        self.send_json(Method::POST, &url, builder).await
    }

    async fn delete_tenant(&self, name: &str) -> Result<()> {
        let url = self.url(&format!("/tenants/{}", name));
        let builder = self.request(Method::DELETE, &url);
        self.send(Method::DELETE, &url, builder).await?;
        Ok(())
    }

    async fn list_tenants(&self, params: &ListParams) -> Result<ListResponse<Tenant>> {
        self.get_list("/tenants", params).await
    }

    async fn upload_plugin(&self, package: &PluginPackage) -> Result<Plugin> {
        let url = self.url("/plugins");
        let builder = self
            .request(Method::POST, &url)
            .query(&[("visibility", "tenant"), ("title", package.file_name.as_str())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(package.bytes.to_vec());
        self.send_json(Method::POST, &url, builder).await
    }
}
