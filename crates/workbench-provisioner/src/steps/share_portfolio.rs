use workbench_core::arn;
use workbench_core::models::{EnvironmentStatus, ResolvedVars};

use super::{keys, notify_failure, resolved_vars};
use crate::error::ProvisionerError;
use crate::plugins::{Hook, LifecycleEvent};
use crate::services::Services;
use crate::step::{KeySpec, KeyType, Step, StepContext, StepOutcome};
use crate::BoxFuture;

const INPUTS: &[KeySpec] = &[
    KeySpec::new(keys::RESOLVED_VARS, KeyType::Object),
    KeySpec::new(keys::PORTFOLIO_ID, KeyType::String),
];

/// Makes the portfolio launchable by the target account's management role.
///
/// Every call here is safe to repeat: the step may be replayed after a
/// partial failure, and two environments in one target account may share
/// the same portfolio concurrently.
pub struct SharePortfolio;

impl Step for SharePortfolio {
    fn name(&self) -> &'static str {
        "share-portfolio"
    }

    fn input_keys(&self) -> &'static [KeySpec] {
        INPUTS
    }

    fn start<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome, ProvisionerError>> {
        Box::pin(async move {
            let vars: ResolvedVars = ctx.payload.object(keys::RESOLVED_VARS)?;
            let portfolio_id = ctx.payload.string(keys::PORTFOLIO_ID)?;

            let home = services.home_target();
            let target = services.target_for(
                vars.x_acc_env_mgmt_role_arn.as_deref(),
                vars.external_id.as_deref(),
            );
            let source_account = arn::account_id(&home.role_arn)?;
            let target_account = arn::account_id(&target.role_arn)?;

            if source_account == target_account {
                if target.role_arn != home.role_arn {
                    let sc = services.clients.service_catalog(&home).await?;
                    sc.associate_principal_with_portfolio(&portfolio_id, &target.role_arn)
                        .await?;
                    tracing::info!(
                        env_id = %vars.env_id,
                        portfolio_id = %portfolio_id,
                        principal = %target.role_arn,
                        "associated principal with portfolio"
                    );
                }
                return Ok(StepOutcome::Done);
            }

            let source_sc = services.clients.service_catalog(&home).await?;
            source_sc
                .describe_portfolio(&portfolio_id)
                .await?
                .ok_or_else(|| ProvisionerError::NotFound {
                    kind: "portfolio",
                    id: portfolio_id.clone(),
                })?;

            let target_sc = services.clients.service_catalog(&target).await?;
            let already_shared = target_sc.describe_portfolio(&portfolio_id).await?.is_some();
            if !already_shared {
                source_sc
                    .create_portfolio_share(&portfolio_id, target_account)
                    .await?;
                tracing::info!(
                    portfolio_id = %portfolio_id,
                    target_account = %target_account,
                    "portfolio shared"
                );
            }

            target_sc.accept_portfolio_share(&portfolio_id).await?;
            target_sc
                .associate_principal_with_portfolio(&portfolio_id, &target.role_arn)
                .await?;

            tracing::info!(
                env_id = %vars.env_id,
                portfolio_id = %portfolio_id,
                target_account = %target_account,
                principal = %target.role_arn,
                already_shared,
                "portfolio accepted and principal associated"
            );
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
