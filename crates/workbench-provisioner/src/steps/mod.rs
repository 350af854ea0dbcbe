//! The environment provisioning and termination steps.

pub mod launch_product;
pub mod read_environment_info;
pub mod replicate_launch_constraint;
pub mod share_portfolio;
pub mod terminate_product;

pub use launch_product::LaunchProduct;
pub use read_environment_info::ReadEnvironmentInfo;
pub use replicate_launch_constraint::ReplicateLaunchConstraint;
pub use share_portfolio::SharePortfolio;
pub use terminate_product::TerminateProduct;

use workbench_core::models::ResolvedVars;

use crate::error::ProvisionerError;
use crate::plugins::{Hook, LifecycleEvent};
use crate::services::Services;
use crate::step::Payload;

/// Workflow payload keys.
pub mod keys {
    pub const ENV_ID: &str = "envId";
    pub const ENV_TYPE_ID: &str = "envTypeId";
    pub const ENV_TYPE_CONFIG_ID: &str = "envTypeConfigId";
    pub const CIDR: &str = "cidr";
    pub const X_ACC_ENV_MGMT_ROLE_ARN: &str = "xAccEnvMgmtRoleArn";
    pub const EXTERNAL_ID: &str = "externalId";
    pub const TIMESTAMP: &str = "timestamp";
    pub const RESOLVED_VARS: &str = "resolvedVars";
    pub const LAUNCH_CONSTRAINT_ROLE: &str = "launchConstraintRole";
    pub const PORTFOLIO_ID: &str = "portfolioId";
    pub const PRODUCT_ID: &str = "productId";
    pub const PROVISIONED_PRODUCT_ID: &str = "provisionedProductId";
}

/// Step-local state keys.
pub mod state_keys {
    pub const RECORD_ID: &str = "recordId";
    pub const PROVISIONED_PRODUCT_ID: &str = "provisionedProductId";
    pub const STACK_NAME: &str = "stackName";
    pub const TERMINATE_TOKEN: &str = "terminateToken";
}

/// Resolved vars from the payload, if an earlier step produced them.
pub(crate) fn resolved_vars(payload: &Payload) -> Option<ResolvedVars> {
    payload.object(keys::RESOLVED_VARS).ok()
}

/// Tell plugins a step failed, then hand back the original error.
///
/// A failing plugin is logged and otherwise ignored here: the step error is
/// what the workflow must record.
pub(crate) async fn notify_failure(
    services: &Services,
    hook: Hook,
    mut event: LifecycleEvent,
    error: ProvisionerError,
) -> ProvisionerError {
    event.error = Some(error.to_string());
    if let Err(dispatch_err) = services.plugins.dispatch(hook, &event).await {
        tracing::warn!(
            env_id = %event.env_id,
            hook = hook.as_str(),
            error = %dispatch_err,
            "failed to notify plugins of step failure"
        );
    }
    error
}
