use serde::{Deserialize, Serialize};

/// Runtime settings injected into every provisioning component.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Role in the home (main) account used for all environment management.
    pub env_mgmt_role_arn: String,
    /// Whether environments carry a data-egress store that must be cleaned
    /// up on termination.
    #[serde(default)]
    pub enable_egress_store: bool,
    pub region: String,
    /// Name template of the main-account egress-store role, e.g.
    /// `${envId}-egress-store`.
    #[serde(default = "default_egress_store_role_name")]
    pub egress_store_role_name: String,
    /// Prefix of every STS role session name.
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
}

pub fn default_egress_store_role_name() -> String {
    "${envId}-egress-store".to_string()
}

pub fn default_session_prefix() -> String {
    "workbench".to_string()
}

impl Settings {
    pub fn new(env_mgmt_role_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            env_mgmt_role_arn: env_mgmt_role_arn.into(),
            enable_egress_store: false,
            region: region.into(),
            egress_store_role_name: default_egress_store_role_name(),
            session_prefix: default_session_prefix(),
        }
    }

    pub fn with_egress_store(mut self, enabled: bool) -> Self {
        self.enable_egress_store = enabled;
        self
    }
}
