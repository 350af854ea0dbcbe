use workbench_core::arn;
use workbench_core::models::{EnvironmentStatus, ResolvedVars};

use super::{keys, notify_failure, resolved_vars};
use crate::catalog;
use crate::error::ProvisionerError;
use crate::plugins::{Hook, LifecycleEvent};
use crate::role_clone::clone_role;
use crate::services::Services;
use crate::step::{KeySpec, KeyType, Step, StepContext, StepOutcome};
use crate::BoxFuture;

const INPUTS: &[KeySpec] = &[KeySpec::new(keys::RESOLVED_VARS, KeyType::Object)];

const OUTPUTS: &[KeySpec] = &[
    KeySpec::new(keys::LAUNCH_CONSTRAINT_ROLE, KeyType::String),
    KeySpec::new(keys::PORTFOLIO_ID, KeyType::String),
    KeySpec::new(keys::PRODUCT_ID, KeyType::String),
];

/// Copies the product's launch-constraint role into the target account so
/// Service Catalog can assume it there.
pub struct ReplicateLaunchConstraint;

impl Step for ReplicateLaunchConstraint {
    fn name(&self) -> &'static str {
        "replicate-launch-constraint"
    }

    fn input_keys(&self) -> &'static [KeySpec] {
        INPUTS
    }

    fn output_keys(&self) -> &'static [KeySpec] {
        OUTPUTS
    }

    fn start<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome, ProvisionerError>> {
        Box::pin(async move {
            let vars: ResolvedVars = ctx.payload.object(keys::RESOLVED_VARS)?;
            let env_type = services.env_types.must_find(&vars.env_type_id).await?;
            let product_id = env_type.product.product_id;

            let home = services.home_target();
            let sc = services.clients.service_catalog(&home).await?;

            catalog::get_launch_path(sc.as_ref(), &product_id, &home.role_arn).await?;
            let portfolio = catalog::find_portfolio(sc.as_ref(), &product_id, &home.role_arn).await?;
            let role_name =
                catalog::find_launch_constraint_role_name(sc.as_ref(), &portfolio.id, &product_id)
                    .await?;

            let target = services.target_for(
                vars.x_acc_env_mgmt_role_arn.as_deref(),
                vars.external_id.as_deref(),
            );
            let target_account = arn::account_id(&target.role_arn)?;
            let source_iam = services.clients.iam(&home).await?;
            let target_iam = services.clients.iam(&target).await?;

            clone_role(source_iam.as_ref(), target_iam.as_ref(), &role_name, target_account).await?;

            tracing::info!(
                env_id = %vars.env_id,
                product_id = %product_id,
                portfolio_id = %portfolio.id,
                role_name = %role_name,
                target_account = %target_account,
                "launch constraint role replicated"
            );

            ctx.payload.set_key(keys::LAUNCH_CONSTRAINT_ROLE, &role_name)?;
            ctx.payload.set_key(keys::PORTFOLIO_ID, &portfolio.id)?;
            ctx.payload.set_key(keys::PRODUCT_ID, &product_id)?;
            Ok(StepOutcome::Done)
        })
    }

    fn on_fail<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
        error: ProvisionerError,
    ) -> BoxFuture<'a, ProvisionerError> {
        Box::pin(async move {
            let vars = resolved_vars(&ctx.payload);
            let env_id = vars.as_ref().map(|v| v.env_id.clone()).unwrap_or_default();
            let mut event = LifecycleEvent::new(env_id, EnvironmentStatus::Failed);
            event.resolved_vars = vars;
            notify_failure(services, Hook::ProvisioningFailure, event, error).await
        })
    }
}
