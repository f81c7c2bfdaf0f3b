use crate::config::ScaleConfig;
use crate::error::{Result, ScaleTestError};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tar::Builder;

/// Environment-specific values injected into every blueprint's inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueprintAttributes {
    pub floating_network_id: String,
    pub keypair_name: String,
    pub network_name: String,
    pub remote_private_key_path: String,
}

/// Blueprint directory packed as a gzip-compressed tarball, ready for upload
#[derive(Debug, Clone)]
pub struct BlueprintArchive {
    /// Name of the main blueprint file inside the archive
    pub application_file_name: String,
    pub bytes: Vec<u8>,
}

/// Plugin package uploaded as-is into a tenant
#[derive(Debug, Clone)]
pub struct PluginPackage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PluginPackage {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(invalid(path, "no such file"));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plugin".to_string());
        Ok(Self {
            file_name,
            bytes: fs::read(path)?,
        })
    }
}

/// A blueprint file and its inputs, both living under the resources directory
#[derive(Debug, Clone)]
pub struct BlueprintExample {
    resources_dir: PathBuf,
    blueprint_path: PathBuf,
    inputs_path: Option<PathBuf>,
    attributes: BlueprintAttributes,
    inputs: Option<Value>,
}

impl BlueprintExample {
    pub fn new(
        resources_dir: &Path,
        blueprint_path: &str,
        inputs_path: Option<&str>,
        attributes: BlueprintAttributes,
    ) -> Result<Self> {
        let blueprint_path = resolve(resources_dir, blueprint_path)?;
        let inputs_path = inputs_path.map(|p| resolve(resources_dir, p)).transpose()?;

        Ok(Self {
            resources_dir: resources_dir.to_path_buf(),
            blueprint_path,
            inputs_path,
            attributes,
            inputs: None,
        })
    }

    pub fn from_config(config: &ScaleConfig) -> Result<Self> {
        Self::new(
            &config.resources_dir,
            &config.blueprint_path,
            config.inputs_path.as_deref(),
            config.attributes.clone(),
        )
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources_dir
    }

    pub fn blueprint_path(&self) -> &Path {
        &self.blueprint_path
    }

    /// Point at another blueprint, relative to the resources directory
    pub fn set_blueprint_path(&mut self, relative: &str) -> Result<()> {
        self.blueprint_path = resolve(&self.resources_dir, relative)?;
        Ok(())
    }

    pub fn inputs_path(&self) -> Option<&Path> {
        self.inputs_path.as_deref()
    }

    pub fn set_inputs_path(&mut self, relative: &str) -> Result<()> {
        self.inputs_path = Some(resolve(&self.resources_dir, relative)?);
        Ok(())
    }

    pub fn attributes(&self) -> &BlueprintAttributes {
        &self.attributes
    }

    /// Deployment inputs, loaded on first use and cached.
    ///
    /// The inputs file must hold a JSON object; the network and key pair
    /// attributes are merged into it.
    pub fn inputs(&mut self) -> Result<Option<Value>> {
        if self.inputs.is_none() {
            if let Some(path) = self.inputs_path.as_ref().filter(|p| p.is_file()) {
                let content = fs::read_to_string(path)?;
                let mut inputs: Value = serde_json::from_str(&content)?;
                let map = inputs
                    .as_object_mut()
                    .ok_or_else(|| invalid(path, "inputs must be a JSON object"))?;
                map.insert(
                    "floating_network_id".to_string(),
                    Value::from(self.attributes.floating_network_id.clone()),
                );
                map.insert(
                    "key_pair_name".to_string(),
                    Value::from(self.attributes.keypair_name.clone()),
                );
                map.insert(
                    "network_name".to_string(),
                    Value::from(self.attributes.network_name.clone()),
                );
                map.insert(
                    "private_key_path".to_string(),
                    Value::from(self.attributes.remote_private_key_path.clone()),
                );
                tracing::debug!(path = %path.display(), keys = map.len(), "Loaded blueprint inputs");
                self.inputs = Some(inputs);
            }
        }
        Ok(self.inputs.clone())
    }

    /// Replace the inputs wholesale, bypassing the inputs file
    pub fn set_inputs(&mut self, inputs: Value) {
        self.inputs = Some(inputs);
    }

    /// Pack the blueprint's directory under a single top-level folder
    pub fn archive(&self) -> Result<BlueprintArchive> {
        let application_file_name = self
            .blueprint_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid(&self.blueprint_path, "missing file name"))?;
        let source_dir = self
            .blueprint_path
            .parent()
            .ok_or_else(|| invalid(&self.blueprint_path, "missing parent directory"))?;
        let top_level = source_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "blueprint".to_string());

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut tar = Builder::new(encoder);
        tar.append_dir_all(&top_level, source_dir)?;
        let bytes = tar.into_inner()?.finish()?;

        tracing::debug!(
            blueprint = %application_file_name,
            size_bytes = bytes.len(),
            "Packed blueprint archive"
        );

        Ok(BlueprintArchive {
            application_file_name,
            bytes,
        })
    }
}

fn resolve(resources_dir: &Path, relative: &str) -> Result<PathBuf> {
    let path = resources_dir.join(relative);
    if path.is_file() {
        Ok(path)
    } else {
        Err(invalid(&path, "no such file"))
    }
}

fn invalid(path: &Path, reason: &str) -> ScaleTestError {
    ScaleTestError::InvalidResource {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
