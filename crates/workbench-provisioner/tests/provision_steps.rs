mod common;

use std::sync::Arc;

use common::*;
use workbench_core::models::ResolvedVars;
use workbench_provisioner::step::Payload;
use workbench_provisioner::steps::{ReadEnvironmentInfo, ReplicateLaunchConstraint};
use workbench_provisioner::{
    BoxFuture, PluginBus, ProvisionerError, ProvisioningObserver, Step, StepOutcome,
};

#[tokio::test]
async fn read_info_builds_resolved_vars() {
    let mut observer = RecordingObserver::named("projects");
    observer.extra_vars = vec![("projectId".into(), "proj-a".into())];
    let h = Harness::with_observer(observer);
    let services = h.services();
    let mut ctx = ctx(provision_payload(Some(TARGET_ROLE)));

    let outcome = ReadEnvironmentInfo.start(&services, &mut ctx).await.unwrap();
    assert_eq!(outcome, StepOutcome::Done);

    assert_eq!(ctx.payload.number("timestamp").unwrap(), NOW);
    let vars: ResolvedVars = ctx.payload.object("resolvedVars").unwrap();
    assert_eq!(vars.env_id, "env-1");
    assert_eq!(vars.namespace, format!("analysis-{NOW}"));
    assert_eq!(vars.x_acc_env_mgmt_role_arn.as_deref(), Some(TARGET_ROLE));
    assert_eq!(vars.external_id.as_deref(), Some("ext-1"));
    assert_eq!(vars.cidr, "10.0.0.0/16");
    assert_eq!(vars.lookup("projectId").as_deref(), Some("proj-a"));
}

#[tokio::test]
async fn read_info_keeps_an_existing_timestamp() {
    let h = Harness::new();
    let services = h.services();
    let mut payload = provision_payload(None);
    payload.set_key("timestamp", &1_600_000_000_000_i64).unwrap();
    let mut ctx = ctx(payload);

    ReadEnvironmentInfo.start(&services, &mut ctx).await.unwrap();

    let vars: ResolvedVars = ctx.payload.object("resolvedVars").unwrap();
    assert_eq!(vars.namespace, "analysis-1600000000000");
    assert_eq!(vars.x_acc_env_mgmt_role_arn, None);
}

#[tokio::test]
async fn replication_same_account_reuses_the_home_role() {
    let h = Harness::new();
    h.seed_home_catalog();
    let services = h.services();
    let mut ctx = ctx(vars_payload(None));

    ReplicateLaunchConstraint
        .start(&services, &mut ctx)
        .await
        .unwrap();

    assert_eq!(ctx.payload.string("launchConstraintRole").unwrap(), LAUNCH_ROLE);
    assert_eq!(ctx.payload.string("portfolioId").unwrap(), PORTFOLIO_ID);
    assert_eq!(ctx.payload.string("productId").unwrap(), PRODUCT_ID);
    assert_eq!(h.log.count("createRole"), 0);
}

#[tokio::test]
async fn replication_cross_account_clones_launch_role() {
    let h = Harness::new();
    h.seed_home_catalog();
    let services = h.services();
    let mut ctx = ctx(vars_payload(Some(TARGET_ROLE)));

    ReplicateLaunchConstraint
        .start(&services, &mut ctx)
        .await
        .unwrap();

    let target_iam = h.clients.iam_of(TARGET_ACCOUNT);
    assert!(target_iam.with(|s| s.roles.contains_key(LAUNCH_ROLE)));
    let assumed = h.clients.assumed.lock().unwrap().clone();
    assert!(assumed.iter().any(|t| t.role_arn == TARGET_ROLE
        && t.external_id.as_deref() == Some("ext-1")));
}

#[tokio::test]
async fn replication_unknown_env_type_is_not_found() {
    let h = Harness::new();
    let services = h.services();
    let mut vars = resolved_vars(None);
    vars.env_type_id = "missing".into();
    let mut payload = Payload::new();
    payload.set_key("resolvedVars", &vars).unwrap();
    let mut ctx = ctx(payload);

    let err = ReplicateLaunchConstraint
        .start(&services, &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionerError::NotFound { kind: "environment type", .. }));
}

#[tokio::test]
async fn read_info_rejects_a_plugin_namespace() {
    let mut observer = RecordingObserver::named("static-namespace");
    observer.extra_vars = vec![("namespace".into(), "static-ns".into())];
    let h = Harness::with_observer(observer);
    let services = h.services();
    let mut ctx = ctx(provision_payload(None));

    let err = ReadEnvironmentInfo.start(&services, &mut ctx).await.unwrap_err();

    assert!(matches!(err, ProvisionerError::Plugin { ref message, .. } if message.contains("reserved")));
    assert!(!ctx.payload.contains("resolvedVars"));
}

struct ShadowingObserver;

impl ProvisioningObserver for ShadowingObserver {
    fn name(&self) -> &str {
        "shadowing"
    }

    fn resolve_vars<'a>(
        &'a self,
        mut vars: ResolvedVars,
    ) -> BoxFuture<'a, Result<ResolvedVars, ProvisionerError>> {
        Box::pin(async move {
            vars.extra.insert("namespace".into(), "static-ns".into());
            Ok(vars)
        })
    }
}

#[tokio::test]
async fn read_info_rejects_reserved_extras_written_directly() {
    let h = Harness::new();
    let mut services = h.services();
    services.plugins = PluginBus::new().with(Arc::new(ShadowingObserver));
    let mut ctx = ctx(provision_payload(None));

    let err = ReadEnvironmentInfo.start(&services, &mut ctx).await.unwrap_err();

    assert!(matches!(err, ProvisionerError::Configuration(ref msg) if msg.contains("namespace")));
    assert!(!ctx.payload.contains("resolvedVars"));
}
