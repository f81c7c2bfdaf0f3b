use crate::blueprint::{BlueprintExample, PluginPackage};
use crate::client::{ExecutionFilter, ListParams, ManagerClient};
use crate::constants::{INSTALL_WORKFLOW, UNINSTALL_WORKFLOW};
use crate::error::{Result, ScaleTestError};
use crate::metrics::{ActionMetrics, ActionState};
use crate::retry::{retry_fixed, RetryPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Fresh resource id: a UUID4 rendered as 32 hex characters
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Creates manager resources concurrently and checks what ended up there.
///
/// Every fan-out goes through [`run_action_concurrently`], which bounds the
/// number of in-flight calls and records one [`ActionMetrics`] per phase.
///
/// [`run_action_concurrently`]: ConcurrentResourceCreator::run_action_concurrently
pub struct ConcurrentResourceCreator {
    client: Arc<dyn ManagerClient>,
    blueprint_example: BlueprintExample,
    poll: RetryPolicy,
    plugin: Option<PluginPackage>,
    show_progress: bool,
    phases: parking_lot::Mutex<Vec<ActionMetrics>>,
}

impl ConcurrentResourceCreator {
    pub fn new(
        client: Arc<dyn ManagerClient>,
        blueprint_example: BlueprintExample,
        poll: RetryPolicy,
    ) -> Self {
        Self {
            client,
            blueprint_example,
            poll,
            plugin: None,
            show_progress: false,
            phases: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn with_plugin(mut self, plugin: PluginPackage) -> Self {
        self.plugin = Some(plugin);
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn client(&self) -> &Arc<dyn ManagerClient> {
        &self.client
    }

    pub fn blueprint_example(&self) -> &BlueprintExample {
        &self.blueprint_example
    }

    pub fn blueprint_example_mut(&mut self) -> &mut BlueprintExample {
        &mut self.blueprint_example
    }

    /// Drain the metrics of every phase run so far
    pub fn take_phase_metrics(&self) -> Vec<ActionMetrics> {
        std::mem::take(&mut *self.phases.lock())
    }

    pub async fn upload_blueprint(&self) -> Result<String> {
        let archive = self.blueprint_example.archive()?;
        let blueprint_id = new_id();
        self.client.upload_blueprint(&archive, &blueprint_id).await?;
        tracing::info!(blueprint_id = %blueprint_id, "Uploaded blueprint");
        Ok(blueprint_id)
    }

    pub async fn upload_blueprints(
        &self,
        blueprints_count: usize,
        threads_count: usize,
    ) -> Result<ActionMetrics> {
        let archive = Arc::new(self.blueprint_example.archive()?);
        let client = self.client.clone();

        let metrics = self
            .run_action_concurrently(
                "upload blueprints",
                threads_count,
                0..blueprints_count,
                move |_| {
                    let client = client.clone();
                    let archive = archive.clone();
                    async move {
                        client.upload_blueprint(&archive, &new_id()).await?;
                        Ok(())
                    }
                },
            )
            .await;

        tracing::info!(
            "Uploaded {} blueprints in {:.2} seconds",
            blueprints_count,
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(metrics)
    }

    pub async fn create_deployments(
        &mut self,
        deployments_count: usize,
        threads_count: usize,
        blueprint_id: &str,
    ) -> Result<ActionMetrics> {
        let inputs = Arc::new(self.blueprint_example.inputs()?);
        let blueprint_id: Arc<str> = Arc::from(blueprint_id);
        let client = self.client.clone();

        let metrics = self
            .run_action_concurrently(
                "create deployments",
                threads_count,
                0..deployments_count,
                move |_| {
                    let client = client.clone();
                    let inputs = inputs.clone();
                    let blueprint_id = blueprint_id.clone();
                    async move {
                        client
                            .create_deployment(&blueprint_id, &new_id(), (*inputs).as_ref())
                            .await?;
                        Ok(())
                    }
                },
            )
            .await;

        tracing::info!(
            "Created {} deployments in {:.2} seconds",
            deployments_count,
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        self.assert_deployments_count(deployments_count as u64)
            .await?;
        Ok(metrics)
    }

    pub async fn install_deployments(
        &self,
        deployments_count: usize,
        threads_count: usize,
    ) -> Result<ActionMetrics> {
        self.wait_for_active_executions().await?;
        let deployments = self.client.list_deployments(&ListParams::default()).await?;
        if deployments.len() < deployments_count {
            tracing::error!(
                "There aren't enough deployments for installing {} deployments",
                deployments_count
            );
            return Err(ScaleTestError::NotEnoughDeployments {
                requested: deployments_count,
                available: deployments.len(),
            });
        }

        let deployment_ids: Vec<String> = deployments
            .items
            .into_iter()
            .take(deployments_count)
            .map(|d| d.id)
            .collect();
        let metrics = self
            .start_workflow(
                "install deployments",
                threads_count,
                deployment_ids,
                INSTALL_WORKFLOW,
                false,
            )
            .await;

        tracing::info!(
            "Installed {} deployments in {:.2} seconds",
            deployments_count,
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(metrics)
    }

    pub async fn uninstall_all_deployments(&self, threads_count: usize) -> Result<ActionMetrics> {
        self.wait_for_active_executions().await?;
        let deployment_ids = self.all_deployment_ids().await?;
        let count = deployment_ids.len();
        let metrics = self
            .start_workflow(
                "uninstall deployments",
                threads_count,
                deployment_ids,
                UNINSTALL_WORKFLOW,
                true,
            )
            .await;

        tracing::info!(
            "Uninstalled {} deployments in {:.2} seconds",
            count,
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(metrics)
    }

    pub async fn delete_all_deployments(&self, threads_count: usize) -> Result<ActionMetrics> {
        self.wait_for_active_executions().await?;
        let deployment_ids = self.all_deployment_ids().await?;
        let count = deployment_ids.len();
        let client = self.client.clone();

        let metrics = self
            .run_action_concurrently(
                "delete deployments",
                threads_count,
                deployment_ids,
                move |deployment_id| {
                    let client = client.clone();
                    async move { client.delete_deployment(&deployment_id).await }
                },
            )
            .await;

        tracing::info!(
            "Deleted {} deployments in {:.2} seconds",
            count,
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        self.assert_deployments_count(0).await?;
        Ok(metrics)
    }

    /// Create tenants and return their names, in creation order
    pub async fn create_tenants(
        &self,
        tenants_count: usize,
        threads_count: usize,
    ) -> Result<Vec<String>> {
        let names: Vec<String> = (0..tenants_count)
            .map(|_| format!("tenant_{}", new_id()))
            .collect();
        let client = self.client.clone();

        let metrics = self
            .run_action_concurrently(
                "create tenants",
                threads_count,
                names.clone(),
                move |name| {
                    let client = client.clone();
                    async move {
                        client.create_tenant(&name).await?;
                        Ok(())
                    }
                },
            )
            .await;

        tracing::info!(
            "Created {} tenants in {:.2} seconds",
            tenants_count,
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(names)
    }

    pub async fn delete_all_tenants(
        &self,
        tenants: &[String],
        threads_count: usize,
    ) -> Result<ActionMetrics> {
        let client = self.client.clone();
        let metrics = self
            .run_action_concurrently(
                "delete tenants",
                threads_count,
                tenants.to_vec(),
                move |name| {
                    let client = client.clone();
                    async move { client.delete_tenant(&name).await }
                },
            )
            .await;

        tracing::info!(
            "Deleted {} tenants in {:.2} seconds",
            tenants.len(),
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(metrics)
    }

    /// Upload the configured plugin package into every tenant.
    ///
    /// Returns `None` when no plugin package is configured.
    pub async fn upload_plugins(
        &self,
        tenants: &[String],
        threads_count: usize,
    ) -> Result<Option<ActionMetrics>> {
        let Some(plugin) = self.plugin.clone() else {
            tracing::warn!("No plugin package configured, skipping plugin uploads");
            return Ok(None);
        };
        let plugin = Arc::new(plugin);
        let client = self.client.clone();

        let metrics = self
            .run_action_concurrently(
                "upload plugins",
                threads_count,
                tenants.to_vec(),
                move |tenant| {
                    let scoped = client.for_tenant(&tenant);
                    let plugin = plugin.clone();
                    async move {
                        scoped.upload_plugin(&plugin).await?;
                        Ok(())
                    }
                },
            )
            .await;

        tracing::info!(
            "Uploaded plugins to {} tenants in {:.2} seconds",
            tenants.len(),
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(Some(metrics))
    }

    /// Upload the current blueprint into each tenant and create exactly one
    /// deployment from it
    pub async fn create_deployments_in_tenants(
        &mut self,
        tenants: &[String],
        threads_count: usize,
    ) -> Result<ActionMetrics> {
        let archive = Arc::new(self.blueprint_example.archive()?);
        let inputs = Arc::new(self.blueprint_example.inputs()?);
        let client = self.client.clone();

        let metrics = self
            .run_action_concurrently(
                "create deployments in tenants",
                threads_count,
                tenants.to_vec(),
                move |tenant| {
                    let scoped = client.for_tenant(&tenant);
                    let archive = archive.clone();
                    let inputs = inputs.clone();
                    async move {
                        let blueprint_id = new_id();
                        scoped.upload_blueprint(&archive, &blueprint_id).await?;
                        scoped
                            .create_deployment(&blueprint_id, &new_id(), (*inputs).as_ref())
                            .await?;
                        Ok(())
                    }
                },
            )
            .await;

        tracing::info!(
            "Created deployments in {} tenants in {:.2} seconds",
            tenants.len(),
            metrics.elapsed_secs()
        );
        metrics.ensure_all_succeeded()?;
        Ok(metrics)
    }

    /// Poll until no execution, system workflows included, is in any state
    /// other than terminated
    pub async fn wait_for_active_executions(&self) -> Result<()> {
        tracing::info!("Waiting for active executions");
        let filter = ExecutionFilter::active_or_failed();
        let filter = &filter;
        let client = self.client.as_ref();

        retry_fixed(&self.poll, "active executions", move || async move {
            let executions = client
                .list_executions(filter, &ListParams::default())
                .await?;
            if executions.is_empty() {
                Ok(())
            } else {
                Err(ScaleTestError::ActiveExecutions(executions.len()))
            }
        })
        .await
    }

    pub async fn assert_deployments_count(&self, expected_count: u64) -> Result<()> {
        let deployments = self.client.list_deployments(&ListParams::default()).await?;
        let actual = deployments.total();
        if actual != expected_count {
            return Err(ScaleTestError::CountMismatch {
                resource: "deployments".to_string(),
                expected: expected_count,
                actual,
            });
        }
        Ok(())
    }

    /// Dispatch every item through `f`, at most `threads_count` at a time.
    ///
    /// All calls run to completion; failures are counted, logged and
    /// reported in the returned metrics rather than aborting the batch.
    pub async fn run_action_concurrently<T, I, F, Fut>(
        &self,
        action: &str,
        threads_count: usize,
        items: I,
        f: F,
    ) -> ActionMetrics
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let items: Vec<T> = items.into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(threads_count.max(1)));
        let state = ActionState::new();
        let progress = self.progress_bar(action, items.len() as u64);
        let f = Arc::new(f);

        tracing::debug!(action, calls = items.len(), threads_count, "Dispatching action");
        let span = tracing::info_span!("action", action);
        let start = Instant::now();
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(items.len());

        for item in items {
            let semaphore = semaphore.clone();
            let state = state.clone();
            let progress = progress.clone();
            let f = f.clone();

            let call = async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let op_start = Instant::now();
                let result = f(item).await;
                let latency_ms = op_start.elapsed().as_millis() as u64;

                match result {
                    Ok(()) => state.record_success(latency_ms),
                    Err(err) => {
                        tracing::warn!(error = %err, "Call failed");
                        state.record_failure(latency_ms, err.kind(), err.to_string());
                    }
                }
                progress.inc(1);
            };
            handles.push(tokio::spawn(call.instrument(span.clone())));
        }

        for joined in futures::future::join_all(handles).await {
            if let Err(err) = joined {
                state.record_failure(0, "join", err.to_string());
            }
        }
        progress.finish_and_clear();

        let metrics = state.get_metrics(action, start.elapsed().as_millis() as u64);
        crate::log_action_complete!(metrics);
        self.phases.lock().push(metrics.clone());
        metrics
    }

    async fn start_workflow(
        &self,
        action: &str,
        threads_count: usize,
        deployment_ids: Vec<String>,
        workflow_id: &'static str,
        force: bool,
    ) -> ActionMetrics {
        let client = self.client.clone();
        self.run_action_concurrently(action, threads_count, deployment_ids, move |deployment_id| {
            let client = client.clone();
            async move {
                client
                    .start_execution(&deployment_id, workflow_id, force)
                    .await?;
                Ok(())
            }
        })
        .await
    }

    async fn all_deployment_ids(&self) -> Result<Vec<String>> {
        let deployments = self.client.list_deployments(&ListParams::default()).await?;
        Ok(deployments.items.into_iter().map(|d| d.id).collect())
    }

    fn progress_bar(&self, action: &str, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::with_template("{msg:>30} [{bar:40}] {pos}/{len} ({elapsed})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(action.to_string());
        bar
    }
}
