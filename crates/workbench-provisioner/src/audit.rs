use serde::Serialize;
use tracing::info;

use crate::error::ProvisionerError;
use crate::plugins::{LifecycleEvent, ProvisioningObserver};
use crate::BoxFuture;

/// A structured audit event for an environment lifecycle transition.
///
/// Logged via `tracing` so it lands next to the worker's other structured
/// logs. CloudTrail captures the underlying AWS API calls; these events add
/// the environment-level context.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub actor: String,
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            actor: actor.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Emit this audit event via tracing.
    pub fn emit(&self) {
        info!(
            audit.action = %self.action,
            audit.resource_type = %self.resource_type,
            audit.resource_id = %self.resource_id,
            audit.actor = %self.actor,
            audit.details = ?self.details,
            "audit event"
        );
    }
}

/// Observer that records every terminal transition as an [`AuditEvent`].
pub struct AuditObserver {
    actor: String,
}

impl AuditObserver {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    fn record(&self, action: &str, event: &LifecycleEvent) -> AuditEvent {
        let details = serde_json::json!({
            "status": event.status,
            "provisionedProductId": event.provisioned_product_id,
            "error": event.error,
        });
        let audit = AuditEvent::new(action, "environment", &event.env_id, &self.actor)
            .with_details(details);
        audit.emit();
        audit
    }
}

impl ProvisioningObserver for AuditObserver {
    fn name(&self) -> &str {
        "audit"
    }

    fn on_env_provisioning_success<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record("environment.provisioned", event);
            Ok(())
        })
    }

    fn on_env_provisioning_failure<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record("environment.provisioning_failed", event);
            Ok(())
        })
    }

    fn on_env_termination_success<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record("environment.terminated", event);
            Ok(())
        })
    }

    fn on_env_termination_failure<'a>(
        &'a self,
        event: &'a LifecycleEvent,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.record("environment.termination_failed", event);
            Ok(())
        })
    }
}
