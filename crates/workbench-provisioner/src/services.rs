use std::sync::Arc;

use workbench_core::Settings;

use crate::aws::{ClientFactory, RoleTarget};
use crate::collaborators::{DataEgressService, EnvTypeConfigService, EnvTypeService};
use crate::plugins::PluginBus;

/// Everything a step needs besides its payload and state.
///
/// Built once per worker and shared by every workflow it drives.
#[derive(Clone)]
pub struct Services {
    pub settings: Settings,
    pub clients: Arc<dyn ClientFactory>,
    pub env_types: Arc<dyn EnvTypeService>,
    pub env_type_configs: Arc<dyn EnvTypeConfigService>,
    pub data_egress: Arc<dyn DataEgressService>,
    pub plugins: PluginBus,
}

impl Services {
    /// The environment-management role in the home account.
    pub fn home_target(&self) -> RoleTarget {
        RoleTarget::home(&self.settings.env_mgmt_role_arn)
    }

    /// The role that manages resources in the environment's account.
    ///
    /// Falls back to the home role when no cross-account role is set, which
    /// is the same-account case.
    pub fn target_for(&self, x_acc_role_arn: Option<&str>, external_id: Option<&str>) -> RoleTarget {
        match x_acc_role_arn.filter(|arn| !arn.is_empty()) {
            Some(arn) => RoleTarget::new(arn, external_id.map(String::from)),
            None => self.home_target(),
        }
    }
}
