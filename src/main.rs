use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scaletest::blueprint::{BlueprintExample, PluginPackage};
use scaletest::config::ScaleConfig;
use scaletest::constants::BlueprintType;
use scaletest::scenarios::{self, ScenarioReport, SimpleBlueprintTarget};
use scaletest::{report, ConcurrentResourceCreator, HttpManagerClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

#[derive(Parser, Debug)]
#[command(name = "scaletest")]
#[command(about = "Run load and scale tests against a manager's REST API")]
struct Cli {
    /// JSON attributes file (manager, credentials, blueprint paths, network attributes)
    #[arg(long, env = "SCALE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[arg(long, env = "SCALE_MANAGER_URL", global = true)]
    manager_url: Option<String>,

    #[arg(long, env = "SCALE_USERNAME", global = true)]
    username: Option<String>,

    #[arg(long, env = "SCALE_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "SCALE_TENANT", global = true)]
    tenant: Option<String>,

    /// Directory blueprint, inputs and plugin paths are relative to
    #[arg(long, global = true)]
    resources_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Show progress bars while calls are in flight
    #[arg(long, global = true)]
    progress: bool,

    /// Write the scenario report as JSON to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload many blueprints, then time a single deployment creation
    Blueprints {
        #[arg(long, default_value = "10")]
        blueprints_count: usize,
    },
    /// Create many deployments simultaneously, then delete them
    DeploymentsCreation {
        #[arg(long, default_value = "300")]
        deployments_count: usize,
        #[arg(long, default_value = "300")]
        threads: usize,
    },
    /// Create, install, uninstall and delete deployments simultaneously
    DeploymentsInstalls {
        #[arg(long, default_value = "10")]
        deployments_count: usize,
        #[arg(long, default_value = "10")]
        threads: usize,
    },
    /// Measure how agents of one blueprint type affect the manager
    Agents {
        /// One of: monitoring, no-monitoring, agentless
        #[arg(long, default_value = "monitoring")]
        blueprint_type: String,
        #[arg(long, default_value = "10")]
        deployments_count: usize,
        /// Tear down right after installing instead of waiting for input
        #[arg(long)]
        no_pause: bool,
    },
    /// Create tenants, give each a plugin and a deployment, delete them
    TenantsWithResources {
        #[arg(long, default_value = "10")]
        tenants_count: usize,
    },
    /// Create a very large number of tenants, populating the first ones
    ManyTenants {
        #[arg(long, default_value = "10000")]
        tenants_count: usize,
        #[arg(long, default_value = "1000")]
        resource_tenants: usize,
    },
}

impl Command {
    fn scenario_name(&self) -> &'static str {
        match self {
            Command::Blueprints { .. } => "many_blueprints_uploads",
            Command::DeploymentsCreation { .. } => "many_deployments_creation",
            Command::DeploymentsInstalls { .. } => "many_deployments_installs",
            Command::Agents { .. } => "agents",
            Command::TenantsWithResources { .. } => "tenants_with_resources",
            Command::ManyTenants { .. } => "many_tenants_creation",
        }
    }
}

impl Cli {
    fn resolve_config(&self) -> Result<ScaleConfig> {
        let mut config = ScaleConfig::load_or_default(self.config.as_deref())?;
        if let Some(url) = &self.manager_url {
            config.manager_url = url.clone();
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(tenant) = &self.tenant {
            config.tenant = tenant.clone();
        }
        if let Some(dir) = &self.resources_dir {
            config.resources_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    scaletest::logging::init_logging(cli.json_logs)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let config = cli.resolve_config()?;
    tracing::info!(manager = %config.manager_url, tenant = %config.tenant, "Starting scale test");

    let client = Arc::new(HttpManagerClient::from_config(&config)?);
    let blueprint_example = BlueprintExample::from_config(&config)
        .context("Failed to load the blueprint example")?;
    let mut creator =
        ConcurrentResourceCreator::new(client, blueprint_example, config.retry_policy())
            .with_progress(cli.progress);
    if let Some(plugin_path) = config.plugin_full_path() {
        creator = creator.with_plugin(PluginPackage::from_path(&plugin_path)?);
    }

    let target = SimpleBlueprintTarget {
        host_ip: config.manager_host()?,
        agent_user: config.agent_user.clone(),
        agent_private_key_path: config.attributes.remote_private_key_path.clone(),
    };

    let start = Instant::now();
    let scenario_span = tracing::info_span!("scenario", name = cli.command.scenario_name());
    let outcome: scaletest::Result<ScenarioReport> = async {
        match &cli.command {
            Command::Blueprints { blueprints_count } => {
                scenarios::many_blueprints_uploads(&mut creator, *blueprints_count).await
            }
            Command::DeploymentsCreation {
                deployments_count,
                threads,
            } => scenarios::many_deployments_creation(&mut creator, *deployments_count, *threads).await,
            Command::DeploymentsInstalls {
                deployments_count,
                threads,
            } => scenarios::many_deployments_installs(&mut creator, *deployments_count, *threads).await,
            Command::Agents {
                blueprint_type,
                deployments_count,
                no_pause,
            } => {
                match blueprint_type.parse::<BlueprintType>() {
                    Ok(blueprint_type) => {
                        scenarios::agents(&mut creator, blueprint_type, *deployments_count, !no_pause)
                            .await
                    }
                    Err(err) => Err(err),
                }
            }
            Command::TenantsWithResources { tenants_count } => {
                scenarios::tenants_with_resources(&mut creator, &target, *tenants_count).await
            }
            Command::ManyTenants {
                tenants_count,
                resource_tenants,
            } => {
                scenarios::many_tenants_creation(&mut creator, &target, *tenants_count, *resource_tenants)
                    .await
            }
        }
    }
    .instrument(scenario_span)
    .await;

    let (report, failure) = match outcome {
        Ok(report) => (report, None),
        Err(err) => {
            let report = ScenarioReport::failed(
                cli.command.scenario_name(),
                start.elapsed().as_secs_f64(),
                &creator,
                &err,
            );
            (report, Some(err))
        }
    };

    report::print_scenario_report(&report);

    if let Some(path) = &cli.output {
        report::save_report_json(&report, path)
            .with_context(|| format!("Failed to save report to {}", path.display()))?;
        println!("\n✅ Report saved to {}", path.display());
    }

    if let Some(err) = failure {
        return Err(anyhow::Error::new(err).context(format!("Scenario {} failed", report.name)));
    }
    Ok(())
}
