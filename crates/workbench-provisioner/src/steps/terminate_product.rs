use std::sync::Arc;

use uuid::Uuid;
use workbench_core::models::{classify_termination, EnvironmentStatus, StatusClass};

use super::launch_product::{MAX_POLL_ATTEMPTS, MAX_WAIT_DAYS, POLL_INTERVAL_SECS};
use super::{keys, notify_failure, state_keys};
use crate::aws::ServiceCatalogApi;
use crate::error::ProvisionerError;
use crate::plugins::{Hook, LifecycleEvent};
use crate::services::Services;
use crate::step::{KeySpec, KeyType, Payload, Step, StepContext, StepOutcome, WaitSpec};
use crate::BoxFuture;

const INPUTS: &[KeySpec] = &[
    KeySpec::new(keys::ENV_ID, KeyType::String),
    KeySpec::new(keys::PROVISIONED_PRODUCT_ID, KeyType::OptionalString),
    KeySpec::new(keys::X_ACC_ENV_MGMT_ROLE_ARN, KeyType::OptionalString),
    KeySpec::new(keys::EXTERNAL_ID, KeyType::OptionalString),
];

/// Terminates the environment's provisioned product and removes its
/// main-account egress-store role.
///
/// An empty `provisionedProductId` means creation failed before anything
/// was provisioned; the step then only cleans up and reports success.
pub struct TerminateProduct;

fn provisioned_product_id(payload: &Payload) -> Result<String, ProvisionerError> {
    Ok(payload
        .optional_string(keys::PROVISIONED_PRODUCT_ID)?
        .unwrap_or_default())
}

impl TerminateProduct {
    async fn client(
        services: &Services,
        payload: &Payload,
    ) -> Result<Arc<dyn ServiceCatalogApi>, ProvisionerError> {
        let role_arn = payload.optional_string(keys::X_ACC_ENV_MGMT_ROLE_ARN)?;
        let external_id = payload.optional_string(keys::EXTERNAL_ID)?;
        let target = services.target_for(role_arn.as_deref(), external_id.as_deref());
        services.clients.service_catalog(&target).await
    }

    async fn submit(
        services: &Services,
        ctx: &mut StepContext,
        env_id: &str,
        provisioned_product_id: &str,
        token: &str,
    ) -> Result<(), ProvisionerError> {
        let sc = Self::client(services, &ctx.payload).await?;
        let record = sc
            .terminate_provisioned_product(provisioned_product_id, token)
            .await?;
        tracing::info!(
            env_id = %env_id,
            provisioned_product_id = %provisioned_product_id,
            record_id = %record.record_id,
            "product termination submitted"
        );
        ctx.state.set_key(state_keys::RECORD_ID, &record.record_id)
    }
}

impl Step for TerminateProduct {
    fn name(&self) -> &'static str {
        "terminate-product"
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
            let env_id = ctx.payload.string(keys::ENV_ID)?;
            let provisioned_product_id = provisioned_product_id(&ctx.payload)?;

            let terminated = if provisioned_product_id.is_empty() {
                tracing::info!(env_id = %env_id, "no provisioned product to terminate");
                Ok(())
            } else {
                // One token per termination attempt, reused if start is replayed.
                let token = match ctx.state.optional_string(state_keys::TERMINATE_TOKEN)? {
                    Some(token) => token,
                    None => {
                        let token = Uuid::new_v4().to_string();
                        ctx.state.set_key(state_keys::TERMINATE_TOKEN, &token)?;
                        token
                    }
                };
                Self::submit(services, ctx, &env_id, &provisioned_product_id, &token).await
            };

            // Runs whether or not a product was terminated.
            let egress_cleaned = if services.settings.enable_egress_store {
                services
                    .data_egress
                    .delete_main_account_egress_store_role(&env_id)
                    .await
            } else {
                Ok(())
            };

            terminated?;
            egress_cleaned?;

            Ok(StepOutcome::Wait(WaitSpec {
                interval_secs: POLL_INTERVAL_SECS,
                max_attempts: MAX_POLL_ATTEMPTS,
            }))
        })
    }

    fn should_resume<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            let Some(record_id) = ctx.state.optional_string(state_keys::RECORD_ID)? else {
                return Ok(true);
            };

            let sc = Self::client(services, &ctx.payload).await?;
            let record = sc.describe_record(&record_id).await?;
            match classify_termination(&record.status) {
                StatusClass::InProgress => Ok(false),
                StatusClass::Succeeded => Ok(true),
                StatusClass::Failed => {
                    let detail = if record.record_errors.is_empty() {
                        "no error detail reported".to_string()
                    } else {
                        record.record_errors.join("; ")
                    };
                    Err(ProvisionerError::TerminationFailed {
                        target: provisioned_product_id(&ctx.payload)?,
                        message: format!("status {}: {detail}", record.status),
                    })
                }
            }
        })
    }

    fn on_successful_completion<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let env_id = ctx.payload.string(keys::ENV_ID)?;
            let mut event = LifecycleEvent::new(env_id, EnvironmentStatus::Terminated);
            event.provisioned_product_id = provisioned_product_id(&ctx.payload)?;

            if let Some(record_id) = ctx.state.optional_string(state_keys::RECORD_ID)? {
                let sc = Self::client(services, &ctx.payload).await?;
                event.record = Some(sc.describe_record(&record_id).await?);
            }

            services
                .plugins
                .dispatch(Hook::TerminationSuccess, &event)
                .await
        })
    }

    fn on_fail<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
        error: ProvisionerError,
    ) -> BoxFuture<'a, ProvisionerError> {
        Box::pin(async move {
            let env_id = ctx.payload.string(keys::ENV_ID).unwrap_or_default();
            let mut event = LifecycleEvent::new(env_id, EnvironmentStatus::TerminatingFailed);
            event.provisioned_product_id = provisioned_product_id(&ctx.payload).unwrap_or_default();
            notify_failure(services, Hook::TerminationFailure, event, error).await
        })
    }

    fn report_timeout(&self, ctx: &StepContext) -> ProvisionerError {
        let target = provisioned_product_id(&ctx.payload)
            .ok()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| ctx.workflow_id.clone());
        ProvisionerError::TimedOut {
            operation: "termination",
            target,
            days: MAX_WAIT_DAYS,
        }
    }
}
