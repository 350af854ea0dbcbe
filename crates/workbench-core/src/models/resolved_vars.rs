use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tag::KeyValue;
use crate::error::CoreError;

/// Template names backed by the typed fields of [`ResolvedVars`].
pub const RESERVED_NAMES: &[&str] = &[
    "envId",
    "envTypeId",
    "envTypeConfigId",
    "namespace",
    "xAccEnvMgmtRoleArn",
    "externalId",
    "cidr",
    "tags",
];

/// The mutable variable context threaded through the provisioning steps.
///
/// Created by the read-environment-info step; later steps update
/// `namespace` and `tags` in place. Once launch-product has fixed the
/// namespace it is the CloudFormation stack name and must not change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVars {
    pub env_id: String,
    pub env_type_id: String,
    pub env_type_config_id: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_acc_env_mgmt_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub cidr: String,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    /// Variables contributed by plugins. Must not hold a [`RESERVED_NAMES`] key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResolvedVars {
    /// Look up a variable by its template name (`envId`, `namespace`, or
    /// any plugin-contributed key).
    ///
    /// Non-string plugin values are rendered as JSON.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "envId" => Some(self.env_id.clone()),
            "envTypeId" => Some(self.env_type_id.clone()),
            "envTypeConfigId" => Some(self.env_type_config_id.clone()),
            "namespace" => Some(self.namespace.clone()),
            "xAccEnvMgmtRoleArn" => self.x_acc_env_mgmt_role_arn.clone(),
            "externalId" => self.external_id.clone(),
            "cidr" => Some(self.cidr.clone()),
            "tags" => serde_json::to_string(&self.tags).ok(),
            other => self.extra.get(other).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// Record a plugin-contributed variable.
    ///
    /// Reserved names are rejected: an extra entry would shadow the typed
    /// field when the vars are written back to the payload.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<(), CoreError> {
        let name = name.into();
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(CoreError::ReservedVariable(name));
        }
        self.extra.insert(name, value.into());
        Ok(())
    }

    /// Extra entries that collide with a typed field.
    pub fn reserved_extras(&self) -> Vec<&str> {
        self.extra
            .keys()
            .map(String::as_str)
            .filter(|k| RESERVED_NAMES.contains(k))
            .collect()
    }
}
