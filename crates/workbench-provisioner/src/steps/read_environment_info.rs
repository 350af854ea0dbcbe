use workbench_core::models::{EnvironmentStatus, ResolvedVars};

use super::{keys, notify_failure};
use crate::error::ProvisionerError;
use crate::namespace;
use crate::plugins::{Hook, LifecycleEvent};
use crate::services::Services;
use crate::step::{KeySpec, KeyType, Step, StepContext, StepOutcome};
use crate::BoxFuture;

const INPUTS: &[KeySpec] = &[
    KeySpec::new(keys::ENV_ID, KeyType::String),
    KeySpec::new(keys::ENV_TYPE_ID, KeyType::String),
    KeySpec::new(keys::ENV_TYPE_CONFIG_ID, KeyType::String),
    KeySpec::new(keys::CIDR, KeyType::OptionalString),
    KeySpec::new(keys::X_ACC_ENV_MGMT_ROLE_ARN, KeyType::OptionalString),
    KeySpec::new(keys::EXTERNAL_ID, KeyType::OptionalString),
];

const OUTPUTS: &[KeySpec] = &[
    KeySpec::new(keys::RESOLVED_VARS, KeyType::Object),
    KeySpec::new(keys::TIMESTAMP, KeyType::Number),
];

/// Builds the initial [`ResolvedVars`] of a provisioning workflow.
///
/// Fixes the attempt timestamp, and with it the dynamic namespace, then
/// lets plugins contribute their own variables.
pub struct ReadEnvironmentInfo;

impl Step for ReadEnvironmentInfo {
    fn name(&self) -> &'static str {
        "read-environment-info"
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
            let payload = &ctx.payload;
            let timestamp = if payload.contains(keys::TIMESTAMP) {
                payload.number(keys::TIMESTAMP)?
            } else {
                ctx.now_ms
            };

            let namespace = namespace::dynamic_namespace(timestamp);
            let vars = ResolvedVars {
                env_id: payload.string(keys::ENV_ID)?,
                env_type_id: payload.string(keys::ENV_TYPE_ID)?,
                env_type_config_id: payload.string(keys::ENV_TYPE_CONFIG_ID)?,
                namespace: namespace.clone(),
                x_acc_env_mgmt_role_arn: payload
                    .optional_string(keys::X_ACC_ENV_MGMT_ROLE_ARN)?
                    .filter(|arn| !arn.is_empty()),
                external_id: payload
                    .optional_string(keys::EXTERNAL_ID)?
                    .filter(|id| !id.is_empty()),
                cidr: payload.optional_string(keys::CIDR)?.unwrap_or_default(),
                ..Default::default()
            };

            let vars = services.plugins.resolve_vars(vars).await?;
            let reserved = vars.reserved_extras();
            if !reserved.is_empty() {
                return Err(ProvisionerError::Configuration(format!(
                    "plugins may not set reserved variables: {}",
                    reserved.join(", ")
                )));
            }
            if vars.namespace != namespace {
                return Err(ProvisionerError::Configuration(format!(
                    "plugins may not change the namespace ({namespace} -> {})",
                    vars.namespace
                )));
            }

            tracing::info!(
                workflow_id = %ctx.workflow_id,
                env_id = %vars.env_id,
                namespace = %vars.namespace,
                "resolved environment variables"
            );

            ctx.payload.set_key(keys::TIMESTAMP, &timestamp)?;
            ctx.payload.set_key(keys::RESOLVED_VARS, &vars)?;
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
            let env_id = ctx.payload.string(keys::ENV_ID).unwrap_or_default();
            let event = LifecycleEvent::new(env_id, EnvironmentStatus::Failed);
            notify_failure(services, Hook::ProvisioningFailure, event, error).await
        })
    }
}
