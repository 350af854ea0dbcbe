//! Services owned by the CRUD layer that the provisioning steps call into.

use workbench_core::models::{EnvTypeConfig, EnvironmentType};

use crate::error::ProvisionerError;
use crate::BoxFuture;

pub trait EnvTypeService: Send + Sync {
    /// Fails with [`ProvisionerError::NotFound`] when the type is absent.
    fn must_find<'a>(
        &'a self,
        env_type_id: &'a str,
    ) -> BoxFuture<'a, Result<EnvironmentType, ProvisionerError>>;
}

pub trait EnvTypeConfigService: Send + Sync {
    fn must_find<'a>(
        &'a self,
        env_type_id: &'a str,
        config_id: &'a str,
    ) -> BoxFuture<'a, Result<EnvTypeConfig, ProvisionerError>>;
}

pub trait DataEgressService: Send + Sync {
    fn delete_main_account_egress_store_role<'a>(
        &'a self,
        env_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;
}
