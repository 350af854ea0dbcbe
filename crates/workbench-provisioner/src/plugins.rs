//! The `env-provisioning` extension point.
//!
//! Observers are visited in registration order. The first error stops the
//! dispatch and is returned to the caller: observers persist environment
//! records, so a failed hook is never silently skipped.

use std::sync::Arc;

use serde::Serialize;
use workbench_core::models::{EnvironmentStatus, KeyValue, ResolvedVars};

use crate::aws::{RecordDetail, RecordOutput};
use crate::error::ProvisionerError;
use crate::BoxFuture;

pub const EXTENSION_POINT: &str = "env-provisioning";

/// Terminal lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    ProvisioningSuccess,
    ProvisioningFailure,
    TerminationSuccess,
    TerminationFailure,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProvisioningSuccess => "onEnvProvisioningSuccess",
            Self::ProvisioningFailure => "onEnvProvisioningFailure",
            Self::TerminationSuccess => "onEnvTerminationSuccess",
            Self::TerminationFailure => "onEnvTerminationFailure",
        }
    }
}

/// What observers learn about a terminal transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub env_id: String,
    pub status: EnvironmentStatus,
    /// Empty when the product was never provisioned.
    pub provisioned_product_id: String,
    pub outputs: Vec<RecordOutput>,
    pub resolved_vars: Option<ResolvedVars>,
    pub record: Option<RecordDetail>,
    pub error: Option<String>,
}

impl LifecycleEvent {
    pub fn new(env_id: impl Into<String>, status: EnvironmentStatus) -> Self {
        Self {
            env_id: env_id.into(),
            status,
            provisioned_product_id: String::new(),
            outputs: Vec::new(),
            resolved_vars: None,
            record: None,
            error: None,
        }
    }
}

/// A plugin on the `env-provisioning` extension point.
///
/// Every hook is optional. The two accumulating hooks receive the value
/// produced by the previous observer and return the value for the next.
pub trait ProvisioningObserver: Send + Sync {
    fn name(&self) -> &str;

    fn resolve_vars<'a>(
        &'a self,
        vars: ResolvedVars,
    ) -> BoxFuture<'a, Result<ResolvedVars, ProvisionerError>> {
        Box::pin(async move { Ok(vars) })
    }

    fn default_tags<'a>(
        &'a self,
        _vars: &'a ResolvedVars,
        tags: Vec<KeyValue>,
    ) -> BoxFuture<'a, Result<Vec<KeyValue>, ProvisionerError>> {
        Box::pin(async move { Ok(tags) })
    }

    fn on_env_provisioning_success<'a>(
        &'a self,
        _event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async { Ok(()) })
    }

    fn on_env_provisioning_failure<'a>(
        &'a self,
        _event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async { Ok(()) })
    }

    fn on_env_termination_success<'a>(
        &'a self,
        _event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async { Ok(()) })
    }

    fn on_env_termination_failure<'a>(
        &'a self,
        _event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async { Ok(()) })
    }
}

fn plugin_err(plugin: &str, hook: &'static str, err: ProvisionerError) -> ProvisionerError {
    match err {
        already @ ProvisionerError::Plugin { .. } => already,
        other => ProvisionerError::Plugin {
            plugin: plugin.to_string(),
            hook,
            message: other.to_string(),
        },
    }
}

/// Ordered registry of observers.
#[derive(Clone, Default)]
pub struct PluginBus {
    observers: Vec<Arc<dyn ProvisioningObserver>>,
}

impl PluginBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn ProvisioningObserver>) {
        tracing::debug!(plugin = %observer.name(), extension_point = EXTENSION_POINT, "plugin registered");
        self.observers.push(observer);
    }

    pub fn with(mut self, observer: Arc<dyn ProvisioningObserver>) -> Self {
        self.register(observer);
        self
    }

    /// Thread `vars` through every observer's `resolve_vars` hook.
    pub async fn resolve_vars(&self, mut vars: ResolvedVars) -> Result<ResolvedVars, ProvisionerError> {
        for observer in &self.observers {
            vars = observer
                .resolve_vars(vars)
                .await
                .map_err(|e| plugin_err(observer.name(), "resolveVars", e))?;
        }
        Ok(vars)
    }

    /// Collect default tags, threading the accumulator through each observer.
    pub async fn default_tags(
        &self,
        vars: &ResolvedVars,
        mut tags: Vec<KeyValue>,
    ) -> Result<Vec<KeyValue>, ProvisionerError> {
        for observer in &self.observers {
            tags = observer
                .default_tags(vars, tags)
                .await
                .map_err(|e| plugin_err(observer.name(), "defaultTags", e))?;
        }
        Ok(tags)
    }

    /// Invoke a lifecycle hook on every observer in order.
    pub async fn dispatch(&self, hook: Hook, event: &LifecycleEvent) -> Result<(), ProvisionerError> {
        tracing::info!(
            hook = hook.as_str(),
            env_id = %event.env_id,
            status = event.status.as_str(),
            observers = self.observers.len(),
            "dispatching lifecycle hook"
        );
        for observer in &self.observers {
            let result = match hook {
                Hook::ProvisioningSuccess => observer.on_env_provisioning_success(event).await,
                Hook::ProvisioningFailure => observer.on_env_provisioning_failure(event).await,
                Hook::TerminationSuccess => observer.on_env_termination_success(event).await,
                Hook::TerminationFailure => observer.on_env_termination_failure(event).await,
            };
            result.map_err(|e| plugin_err(observer.name(), hook.as_str(), e))?;
        }
        Ok(())
    }
}
