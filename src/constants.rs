// Centralized constants for the scale tests to avoid magic numbers

use crate::error::{Result, ScaleTestError};
use std::fmt;
use std::str::FromStr;

/// Blueprint with monitoring agents installed on every VM
pub const MONITORING_BLUEPRINT: &str = "monitoring";

/// Blueprint with agents but without the monitoring plugin
pub const NO_MONITORING_BLUEPRINT: &str = "no-monitoring";

/// Blueprint whose nodes run without an agent
pub const AGENTLESS_BLUEPRINT: &str = "agentless";

pub const BLUEPRINT_TYPES: [&str; 3] = [
    MONITORING_BLUEPRINT,
    NO_MONITORING_BLUEPRINT,
    AGENTLESS_BLUEPRINT,
];

/// Execution state that counts as drained when waiting for executions
pub const TERMINATED_STATE: &str = "terminated";

/// Pagination applied to every list call
pub const PAGINATION_OFFSET: u64 = 0;
pub const PAGINATION_SIZE: u64 = 1000;

/// Default number of polls while waiting for active executions
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;

/// Default fixed wait between polls in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const API_BASE_PATH: &str = "/api/v3.1";
pub const TENANT_HEADER: &str = "Tenant";
pub const DEFAULT_TENANT: &str = "default_tenant";

/// Blueprint used when populating tenants with resources
pub const SIMPLE_BLUEPRINT_PATH: &str = "blueprint-examples/simple-blueprint.yaml";
pub const SIMPLE_BLUEPRINT_AGENT_USER: &str = "centos";

pub const INSTALL_WORKFLOW: &str = "install";
pub const UNINSTALL_WORKFLOW: &str = "uninstall";

/// Typed view over [`BLUEPRINT_TYPES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlueprintType {
    #[default]
    Monitoring,
    NoMonitoring,
    Agentless,
}

impl BlueprintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitoring => MONITORING_BLUEPRINT,
            Self::NoMonitoring => NO_MONITORING_BLUEPRINT,
            Self::Agentless => AGENTLESS_BLUEPRINT,
        }
    }

    /// Path of the blueprint file, relative to the resources directory
    pub fn blueprint_path(&self) -> String {
        format!("blueprint-examples/{}-blueprint.yaml", self.as_str())
    }
}

impl fmt::Display for BlueprintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlueprintType {
    type Err = ScaleTestError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            MONITORING_BLUEPRINT => Ok(Self::Monitoring),
            NO_MONITORING_BLUEPRINT => Ok(Self::NoMonitoring),
            AGENTLESS_BLUEPRINT => Ok(Self::Agentless),
            other => Err(ScaleTestError::InvalidBlueprintType(other.to_string())),
        }
    }
}
