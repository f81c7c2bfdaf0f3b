/// Harness configuration: an attributes file overlaid with CLI/env values
use crate::blueprint::BlueprintAttributes;
use crate::constants::{
    DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TENANT, SIMPLE_BLUEPRINT_AGENT_USER, SIMPLE_BLUEPRINT_PATH,
};
use crate::error::{Result, ScaleTestError};
use crate::retry::RetryPolicy;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub manager_url: String,
    pub username: String,
    pub password: String,
    pub tenant: String,
    /// Root for blueprint, inputs and plugin paths
    pub resources_dir: PathBuf,
    pub blueprint_path: String,
    pub inputs_path: Option<String>,
    pub plugin_path: Option<String>,
    #[serde(flatten)]
    pub attributes: BlueprintAttributes,
    pub agent_user: String,
    pub request_timeout_secs: u64,
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            manager_url: "http://localhost".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            resources_dir: PathBuf::from("resources"),
            blueprint_path: SIMPLE_BLUEPRINT_PATH.to_string(),
            inputs_path: None,
            plugin_path: None,
            attributes: BlueprintAttributes::default(),
            agent_user: SIMPLE_BLUEPRINT_AGENT_USER.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl ScaleConfig {
    /// Load from a JSON attributes file; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScaleTestError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ScaleConfig = serde_json::from_str(&content).map_err(|e| {
            ScaleTestError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.parsed_manager_url()?;
        if self.poll_attempts == 0 {
            return Err(ScaleTestError::Config("poll_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Manager URL parsed and checked for an http(s) scheme and a host
    pub fn parsed_manager_url(&self) -> Result<Url> {
        let url = Url::parse(self.manager_url.trim()).map_err(|e| {
            ScaleTestError::Config(format!(
                "manager_url '{}' has invalid URL format: {}",
                self.manager_url, e
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScaleTestError::Config(format!(
                "manager_url must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ScaleTestError::Config(format!(
                "manager_url '{}' has no host",
                self.manager_url
            )));
        }
        Ok(url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.poll_attempts,
            Duration::from_secs(self.poll_interval_secs),
        )
    }

    /// Host part of the manager URL, used as the simple blueprint's host_ip.
    /// Credentials and port are never part of it.
    pub fn manager_host(&self) -> Result<String> {
        let url = self.parsed_manager_url()?;
        Ok(url.host_str().unwrap_or_default().to_string())
    }

    pub fn plugin_full_path(&self) -> Option<PathBuf> {
        self.plugin_path
            .as_ref()
            .map(|p| self.resources_dir.join(p))
    }
}
