/// The scale test scenarios, each one a sequence of creator phases
use crate::client::ListParams;
use crate::constants::{BlueprintType, SIMPLE_BLUEPRINT_PATH};
use crate::creator::ConcurrentResourceCreator;
use crate::error::{Result, ScaleTestError};
use crate::metrics::ActionMetrics;
use crate::util;
use serde::Serialize;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub elapsed_secs: f64,
    pub phases: Vec<ActionMetrics>,
    pub notes: Vec<String>,
    /// Why the scenario stopped early, if it did
    pub error: Option<String>,
}

impl ScenarioReport {
    fn finish(
        name: &str,
        start: Instant,
        creator: &ConcurrentResourceCreator,
        notes: Vec<String>,
    ) -> Self {
        let elapsed_secs = start.elapsed().as_secs_f64();
        crate::log_scenario_complete!(name, elapsed_secs);
        Self {
            name: name.to_string(),
            elapsed_secs,
            phases: creator.take_phase_metrics(),
            notes,
            error: None,
        }
    }

    /// Report for a scenario that stopped on `err`, keeping the metrics of
    /// every phase that ran before it
    pub fn failed(
        name: &str,
        elapsed_secs: f64,
        creator: &ConcurrentResourceCreator,
        err: &ScaleTestError,
    ) -> Self {
        tracing::error!(scenario = name, error = %err, "Scenario failed");
        Self {
            name: name.to_string(),
            elapsed_secs,
            phases: creator.take_phase_metrics(),
            notes: Vec::new(),
            error: Some(err.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    pub fn failed_operations(&self) -> u64 {
        self.phases.iter().map(|p| p.failed_operations).sum()
    }
}

/// Values the simple blueprint needs to reach the manager host
#[derive(Debug, Clone)]
pub struct SimpleBlueprintTarget {
    pub host_ip: String,
    pub agent_user: String,
    pub agent_private_key_path: String,
}

pub async fn many_blueprints_uploads(
    creator: &mut ConcurrentResourceCreator,
    blueprints_count: usize,
) -> Result<ScenarioReport> {
    let start = Instant::now();
    let threads_count = 20;
    let client = creator.client().clone();

    creator
        .upload_blueprints(blueprints_count, threads_count)
        .await?;
    let blueprints =
        util::get_resource_list("Blueprint", client.list_blueprints(&ListParams::default()))
            .await?;

    // One deployment on top of the uploaded blueprints, to see how long it takes
    let blueprint_id = creator.upload_blueprint().await?;
    let one_deployment = util::create_one_deployment(creator, &blueprint_id).await?;

    Ok(ScenarioReport::finish(
        "many_blueprints_uploads",
        start,
        creator,
        vec![
            format!("{} blueprints on the manager", blueprints.total()),
            format!(
                "Creating one deployment took {:.2} seconds",
                one_deployment.as_secs_f64()
            ),
        ],
    ))
}

pub async fn many_deployments_creation(
    creator: &mut ConcurrentResourceCreator,
    deployments_count: usize,
    threads_count: usize,
) -> Result<ScenarioReport> {
    let start = Instant::now();
    let blueprint_id = creator.upload_blueprint().await?;
    creator
        .create_deployments(deployments_count, threads_count, &blueprint_id)
        .await?;
    creator.delete_all_deployments(threads_count).await?;

    Ok(ScenarioReport::finish(
        "many_deployments_creation",
        start,
        creator,
        Vec::new(),
    ))
}

pub async fn many_deployments_installs(
    creator: &mut ConcurrentResourceCreator,
    deployments_count: usize,
    threads_count: usize,
) -> Result<ScenarioReport> {
    let start = Instant::now();
    let blueprint_id = creator.upload_blueprint().await?;
    creator
        .create_deployments(deployments_count, threads_count, &blueprint_id)
        .await?;
    creator
        .install_deployments(deployments_count, threads_count)
        .await?;
    creator.uninstall_all_deployments(threads_count).await?;
    creator.delete_all_deployments(threads_count).await?;

    Ok(ScenarioReport::finish(
        "many_deployments_installs",
        start,
        creator,
        Vec::new(),
    ))
}

/// Install agents of one blueprint type and optionally hold the deployments
/// up until the operator has looked at the manager's host metrics
pub async fn agents(
    creator: &mut ConcurrentResourceCreator,
    blueprint_type: BlueprintType,
    deployments_count: usize,
    pause_before_teardown: bool,
) -> Result<ScenarioReport> {
    creator
        .blueprint_example_mut()
        .set_blueprint_path(&blueprint_type.blueprint_path())?;
    let threads_count = deployments_count;

    let start = Instant::now();
    let blueprint_id = creator.upload_blueprint().await?;
    creator
        .create_deployments(deployments_count, threads_count, &blueprint_id)
        .await?;
    creator
        .install_deployments(deployments_count, threads_count)
        .await?;
    let installed_secs = start.elapsed().as_secs_f64();
    tracing::info!(
        "agents with {} blueprint took {:.2} seconds",
        blueprint_type,
        installed_secs
    );

    if pause_before_teardown {
        wait_for_operator().await?;
    }

    creator.uninstall_all_deployments(threads_count).await?;
    creator.delete_all_deployments(threads_count).await?;

    Ok(ScenarioReport::finish(
        "agents",
        start,
        creator,
        vec![format!(
            "Installing {} {} deployments took {:.2} seconds",
            deployments_count, blueprint_type, installed_secs
        )],
    ))
}

pub async fn tenants_with_resources(
    creator: &mut ConcurrentResourceCreator,
    target: &SimpleBlueprintTarget,
    tenants_count: usize,
) -> Result<ScenarioReport> {
    let start = Instant::now();
    let tenants = creator.create_tenants(tenants_count, 50).await?;
    create_tenants_resources(creator, target, &tenants).await?;
    creator.delete_all_tenants(&tenants, 10).await?;

    Ok(ScenarioReport::finish(
        "tenants_with_resources",
        start,
        creator,
        vec![format!("Created {} tenants", tenants_count)],
    ))
}

pub async fn many_tenants_creation(
    creator: &mut ConcurrentResourceCreator,
    target: &SimpleBlueprintTarget,
    tenants_count: usize,
    resource_tenants: usize,
) -> Result<ScenarioReport> {
    let start = Instant::now();
    let mut tenants = creator.create_tenants(tenants_count, 100).await?;
    tenants.truncate(resource_tenants);
    create_tenants_resources(creator, target, &tenants).await?;

    Ok(ScenarioReport::finish(
        "many_tenants_creation",
        start,
        creator,
        vec![format!(
            "Created {} tenants, {} of them with resources",
            tenants_count,
            tenants.len()
        )],
    ))
}

/// Plugins, a simple blueprint and one deployment in every tenant
pub async fn create_tenants_resources(
    creator: &mut ConcurrentResourceCreator,
    target: &SimpleBlueprintTarget,
    tenants: &[String],
) -> Result<()> {
    creator.upload_plugins(tenants, 10).await?;
    change_blueprint_to_simple(creator, target)?;
    creator.create_deployments_in_tenants(tenants, 50).await?;

    let Some(first_tenant) = tenants.first() else {
        return Ok(());
    };
    let deployments = creator
        .client()
        .for_tenant(first_tenant)
        .list_deployments(&ListParams::default())
        .await?;
    if deployments.total() != 1 {
        return Err(ScaleTestError::CountMismatch {
            resource: format!("deployments in tenant {}", first_tenant),
            expected: 1,
            actual: deployments.total(),
        });
    }
    Ok(())
}

fn change_blueprint_to_simple(
    creator: &mut ConcurrentResourceCreator,
    target: &SimpleBlueprintTarget,
) -> Result<()> {
    let example = creator.blueprint_example_mut();
    example.set_blueprint_path(SIMPLE_BLUEPRINT_PATH)?;
    example.set_inputs(serde_json::json!({
        "host_ip": target.host_ip,
        "agent_user": target.agent_user,
        "agent_private_key_path": target.agent_private_key_path,
    }));
    Ok(())
}

async fn wait_for_operator() -> Result<()> {
    eprintln!("Enter any key to end the test and tear the deployments down : ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    Ok(())
}
