//! Main-account egress-store role cleanup.

use std::sync::Arc;

use workbench_core::models::ResolvedVars;
use workbench_core::Settings;

use crate::aws::{ClientFactory, RoleTarget};
use crate::collaborators::DataEgressService;
use crate::error::ProvisionerError;
use crate::variables::resolve_expression;
use crate::BoxFuture;

/// [`DataEgressService`] that deletes the environment's egress-store role
/// from the home account.
pub struct IamEgressStoreCleanup {
    clients: Arc<dyn ClientFactory>,
    settings: Settings,
}

impl IamEgressStoreCleanup {
    pub fn new(clients: Arc<dyn ClientFactory>, settings: Settings) -> Self {
        Self { clients, settings }
    }

    /// The egress-store role name for `env_id`.
    pub fn role_name(&self, env_id: &str) -> Result<String, ProvisionerError> {
        let vars = ResolvedVars {
            env_id: env_id.to_string(),
            ..Default::default()
        };
        resolve_expression(&self.settings.egress_store_role_name, &vars)
    }
}

impl DataEgressService for IamEgressStoreCleanup {
    fn delete_main_account_egress_store_role<'a>(
        &'a self,
        env_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let role_name = self.role_name(env_id)?;
            let home = RoleTarget::home(&self.settings.env_mgmt_role_arn);
            let iam = self.clients.iam(&home).await?;

            if iam.get_role(&role_name).await?.is_none() {
                tracing::debug!(env_id = %env_id, role = %role_name, "egress store role already gone");
                return Ok(());
            }

            // IAM refuses to delete a role that still has policies.
            for policy_name in iam.list_role_policies(&role_name).await? {
                iam.delete_role_policy(&role_name, &policy_name).await?;
            }
            for attached in iam.list_attached_role_policies(&role_name).await? {
                iam.detach_role_policy(&role_name, &attached.arn).await?;
            }
            let deleted = iam.delete_role(&role_name).await?;

            tracing::info!(env_id = %env_id, role = %role_name, deleted, "deleted egress store role");
            Ok(())
        })
    }
}
