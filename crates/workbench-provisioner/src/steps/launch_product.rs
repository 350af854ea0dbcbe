use std::sync::Arc;

use workbench_core::models::{
    classify_provisioning, union_by_key, EnvironmentStatus, ResolvedVars, StatusClass,
};

use super::{keys, notify_failure, resolved_vars, state_keys};
use crate::aws::{ProvisionRequest, RecordDetail, ServiceCatalogApi};
use crate::catalog;
use crate::error::ProvisionerError;
use crate::namespace;
use crate::plugins::{Hook, LifecycleEvent};
use crate::services::Services;
use crate::step::{KeySpec, KeyType, Step, StepContext, StepOutcome, WaitSpec};
use crate::variables::resolve_params;
use crate::BoxFuture;

pub const POLL_INTERVAL_SECS: u64 = 5;
/// Coupled to [`POLL_INTERVAL_SECS`] and [`MAX_WAIT_DAYS`]; change together.
pub const MAX_POLL_ATTEMPTS: u64 = 1_296_000;
pub const MAX_WAIT_DAYS: u64 = 15;

const INPUTS: &[KeySpec] = &[
    KeySpec::new(keys::RESOLVED_VARS, KeyType::Object),
    KeySpec::new(keys::TIMESTAMP, KeyType::Number),
];

const OUTPUTS: &[KeySpec] = &[KeySpec::new(keys::PROVISIONED_PRODUCT_ID, KeyType::String)];

/// Provision tokens allow `[a-zA-Z0-9_-]`, at most 128 characters.
fn provision_token(stack_name: &str) -> String {
    stack_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(128)
        .collect()
}

fn failure_message(status_message: Option<&str>, record: Option<&RecordDetail>) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(msg) = status_message.filter(|m| !m.is_empty()) {
        parts.push(msg.to_string());
    }
    if let Some(record) = record {
        parts.extend(record.record_errors.iter().cloned());
    }
    if parts.is_empty() {
        "no error detail reported".to_string()
    } else {
        parts.join("; ")
    }
}

/// Provisions the environment's Service Catalog product and waits for the
/// provisioned product to become available.
pub struct LaunchProduct;

impl LaunchProduct {
    async fn client(
        services: &Services,
        vars: &ResolvedVars,
    ) -> Result<Arc<dyn ServiceCatalogApi>, ProvisionerError> {
        let target = services.target_for(
            vars.x_acc_env_mgmt_role_arn.as_deref(),
            vars.external_id.as_deref(),
        );
        services.clients.service_catalog(&target).await
    }
}

impl Step for LaunchProduct {
    fn name(&self) -> &'static str {
        "launch-product"
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
            let mut vars: ResolvedVars = ctx.payload.object(keys::RESOLVED_VARS)?;
            let timestamp = ctx.payload.number(keys::TIMESTAMP)?;

            let env_type = services.env_types.must_find(&vars.env_type_id).await?;
            let config = services
                .env_type_configs
                .must_find(&vars.env_type_id, &vars.env_type_config_id)
                .await?;

            let target = services.target_for(
                vars.x_acc_env_mgmt_role_arn.as_deref(),
                vars.external_id.as_deref(),
            );
            let sc = services.clients.service_catalog(&target).await?;

            // The guard must see the resolved value: a template can put a
            // static name back over the dynamic default.
            let mut parameters = resolve_params(&config.params, &vars)?;
            if let Some(stack_name) = namespace::apply(&mut parameters, timestamp) {
                vars.namespace = stack_name;
            }
            let stack_name = vars.namespace.clone();

            let custom_tags = resolve_params(&config.tags, &vars)?;
            let default_tags = services.plugins.default_tags(&vars, Vec::new()).await?;
            let tags = union_by_key(&custom_tags, &default_tags);
            vars.tags = tags.clone();

            let launch_path =
                catalog::get_launch_path(sc.as_ref(), &env_type.product.product_id, &target.role_arn)
                    .await?;

            let request = ProvisionRequest {
                product_id: env_type.product.product_id.clone(),
                provisioned_product_name: stack_name.clone(),
                provisioning_artifact_id: env_type.provisioning_artifact.id.clone(),
                path_id: launch_path.id,
                provisioning_parameters: parameters,
                tags,
                provision_token: provision_token(&stack_name),
            };
            let record = sc.provision_product(&request).await?;
            let provisioned_product_id = record.provisioned_product_id.clone().ok_or_else(|| {
                ProvisionerError::Aws(format!(
                    "ProvisionProduct for {stack_name} returned no provisioned product id"
                ))
            })?;

            tracing::info!(
                env_id = %vars.env_id,
                stack_name = %stack_name,
                record_id = %record.record_id,
                provisioned_product_id = %provisioned_product_id,
                "product provisioning submitted"
            );

            ctx.state.set_key(state_keys::RECORD_ID, &record.record_id)?;
            ctx.state
                .set_key(state_keys::PROVISIONED_PRODUCT_ID, &provisioned_product_id)?;
            ctx.state.set_key(state_keys::STACK_NAME, &stack_name)?;
            ctx.payload.set_key(keys::RESOLVED_VARS, &vars)?;
            ctx.payload
                .set_key(keys::PROVISIONED_PRODUCT_ID, &provisioned_product_id)?;

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
            let vars: ResolvedVars = ctx.payload.object(keys::RESOLVED_VARS)?;
            let provisioned_product_id = ctx.state.string(state_keys::PROVISIONED_PRODUCT_ID)?;
            let stack_name = ctx.state.string(state_keys::STACK_NAME)?;
            let sc = Self::client(services, &vars).await?;

            // Not visible yet right after submission.
            let Some(product) = sc.describe_provisioned_product(&provisioned_product_id).await?
            else {
                return Ok(false);
            };

            match classify_provisioning(&product.status) {
                StatusClass::InProgress => Ok(false),
                StatusClass::Succeeded => Ok(true),
                StatusClass::Failed => {
                    let record_id = match product.last_record_id.as_deref() {
                        Some(id) if !id.is_empty() => id.to_string(),
                        _ => ctx.state.string(state_keys::RECORD_ID)?,
                    };
                    let record = sc.describe_record(&record_id).await.ok();
                    Err(ProvisionerError::ProvisioningFailed {
                        stack_name,
                        message: format!(
                            "status {}: {}",
                            product.status,
                            failure_message(product.status_message.as_deref(), record.as_ref())
                        ),
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
            let vars: ResolvedVars = ctx.payload.object(keys::RESOLVED_VARS)?;
            let record_id = ctx.state.string(state_keys::RECORD_ID)?;
            let sc = Self::client(services, &vars).await?;
            let record = sc.describe_record(&record_id).await?;

            let mut event = LifecycleEvent::new(vars.env_id.clone(), EnvironmentStatus::Completed);
            event.provisioned_product_id = ctx.state.string(state_keys::PROVISIONED_PRODUCT_ID)?;
            event.outputs = record.outputs.clone();
            event.record = Some(record);
            event.resolved_vars = Some(vars);

            services
                .plugins
                .dispatch(Hook::ProvisioningSuccess, &event)
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
            let vars = resolved_vars(&ctx.payload);
            let env_id = vars.as_ref().map(|v| v.env_id.clone()).unwrap_or_default();
            let mut event = LifecycleEvent::new(env_id, EnvironmentStatus::Failed);
            event.provisioned_product_id = ctx
                .state
                .optional_string(state_keys::PROVISIONED_PRODUCT_ID)
                .ok()
                .flatten()
                .unwrap_or_default();
            event.resolved_vars = vars;
            notify_failure(services, Hook::ProvisioningFailure, event, error).await
        })
    }

    fn report_timeout(&self, ctx: &StepContext) -> ProvisionerError {
        let target = ctx
            .state
            .optional_string(state_keys::STACK_NAME)
            .ok()
            .flatten()
            .unwrap_or_else(|| ctx.workflow_id.clone());
        ProvisionerError::TimedOut {
            operation: "provisioning",
            target,
            days: MAX_WAIT_DAYS,
        }
    }
}
