use serde::{Deserialize, Serialize};

/// Read-only view of an environment type, owned by the CRUD layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentType {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub product: ProductRef,
    pub provisioning_artifact: ProvisioningArtifactRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningArtifactRef {
    pub id: String,
}

/// A configuration of an environment type: templated input parameters and
/// tags, resolved against [`ResolvedVars`](super::ResolvedVars) at launch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvTypeConfig {
    pub id: String,
    #[serde(default)]
    pub params: Vec<ConfigParam>,
    #[serde(default)]
    pub tags: Vec<ConfigParam>,
}

/// A templated key/value pair, e.g. `{"key": "Namespace", "value": "${namespace}"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParam {
    pub key: String,
    pub value: String,
}

impl ConfigParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
