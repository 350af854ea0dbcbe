//! Environment types and configs read from a JSON file.

use std::collections::HashMap;
use std::path::Path;

use eyre::WrapErr;
use serde::Deserialize;
use workbench_core::models::{EnvTypeConfig, EnvironmentType};
use workbench_provisioner::collaborators::{EnvTypeConfigService, EnvTypeService};
use workbench_provisioner::{BoxFuture, ProvisionerError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    env_types: Vec<EnvironmentType>,
    #[serde(default)]
    env_type_configs: Vec<CatalogConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogConfig {
    env_type_id: String,
    #[serde(flatten)]
    config: EnvTypeConfig,
}

/// Read-only environment-type catalog.
#[derive(Debug, Default)]
pub struct FileCatalog {
    env_types: HashMap<String, EnvironmentType>,
    configs: HashMap<(String, String), EnvTypeConfig>,
}

impl FileCatalog {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading catalog {}", path.display()))?;
        Self::from_json(&json).wrap_err_with(|| format!("parsing catalog {}", path.display()))
    }

    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let env_types = file
            .env_types
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();
        let configs = file
            .env_type_configs
            .into_iter()
            .map(|c| ((c.env_type_id, c.config.id.clone()), c.config))
            .collect();
        Ok(Self { env_types, configs })
    }
}

impl EnvTypeService for FileCatalog {
    fn must_find<'a>(
        &'a self,
        env_type_id: &'a str,
    ) -> BoxFuture<'a, Result<EnvironmentType, ProvisionerError>> {
        Box::pin(async move {
            self.env_types
                .get(env_type_id)
                .cloned()
                .ok_or_else(|| ProvisionerError::NotFound {
                    kind: "environment type",
                    id: env_type_id.to_string(),
                })
        })
    }
}

impl EnvTypeConfigService for FileCatalog {
    fn must_find<'a>(
        &'a self,
        env_type_id: &'a str,
        config_id: &'a str,
    ) -> BoxFuture<'a, Result<EnvTypeConfig, ProvisionerError>> {
        Box::pin(async move {
            self.configs
                .get(&(env_type_id.to_string(), config_id.to_string()))
                .cloned()
                .ok_or_else(|| ProvisionerError::NotFound {
                    kind: "environment type config",
                    id: format!("{env_type_id}/{config_id}"),
                })
        })
    }
}
