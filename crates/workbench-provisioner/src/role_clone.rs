//! Replicate an IAM role from one account into another.
//!
//! Create-or-update throughout: the same role may be cloned concurrently by
//! two environments launching into one target account, so every write is
//! safe to repeat.

use workbench_core::arn;

use crate::aws::{IamApi, ManagedPolicy, RoleDetail};
use crate::error::ProvisionerError;

/// Compare two policy documents structurally, ignoring formatting.
fn same_document(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(a),
        serde_json::from_str::<serde_json::Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Clone `role_name` from `source` into `target`, returning the target role.
///
/// Copies the trust policy, inline policies and attached managed policies.
/// Customer-managed policies are recreated under the same path and name in
/// `target_account_id`.
pub async fn clone_role(
    source: &dyn IamApi,
    target: &dyn IamApi,
    role_name: &str,
    target_account_id: &str,
) -> Result<RoleDetail, ProvisionerError> {
    let source_role = source
        .get_role(role_name)
        .await?
        .ok_or_else(|| ProvisionerError::NotFound {
            kind: "source role",
            id: role_name.to_string(),
        })?;

    let target_role = match target.get_role(role_name).await? {
        Some(existing) => {
            if !same_document(
                &existing.assume_role_policy_document,
                &source_role.assume_role_policy_document,
            ) {
                tracing::info!(role_name = %role_name, "updating trust policy of cloned role");
                target
                    .update_assume_role_policy(role_name, &source_role.assume_role_policy_document)
                    .await?;
            }
            existing
        }
        None => {
            let desired = RoleDetail {
                arn: arn::build_role_arn(target_account_id, &source_role.path, role_name),
                ..source_role.clone()
            };
            let created = target.create_role(&desired).await?;
            if !created {
                // Lost a race with a concurrent clone; converge the trust policy.
                target
                    .update_assume_role_policy(role_name, &source_role.assume_role_policy_document)
                    .await?;
            }
            tracing::info!(
                role_name = %role_name,
                target_account = %target_account_id,
                created,
                "cloned role into target account"
            );
            desired
        }
    };

    for policy_name in source.list_role_policies(role_name).await? {
        let document = source.get_role_policy(role_name, &policy_name).await?;
        target
            .put_role_policy(role_name, &policy_name, &document)
            .await?;
        tracing::debug!(role_name = %role_name, policy = %policy_name, "inline policy replicated");
    }

    let already_attached: Vec<String> = target
        .list_attached_role_policies(role_name)
        .await?
        .into_iter()
        .map(|p| p.arn)
        .collect();

    for attached in source.list_attached_role_policies(role_name).await? {
        let target_arn = if arn::is_aws_managed_policy(&attached.arn) {
            attached.arn.clone()
        } else {
            let target_arn = arn::policy_arn_in_account(&attached.arn, target_account_id)?;
            replicate_managed_policy(source, target, &attached.arn, &target_arn).await?;
            target_arn
        };

        if !already_attached.contains(&target_arn) {
            target.attach_role_policy(role_name, &target_arn).await?;
            tracing::info!(role_name = %role_name, policy_arn = %target_arn, "managed policy attached");
        }
    }

    Ok(target_role)
}

async fn replicate_managed_policy(
    source: &dyn IamApi,
    target: &dyn IamApi,
    source_arn: &str,
    target_arn: &str,
) -> Result<(), ProvisionerError> {
    let policy = source
        .get_managed_policy(source_arn)
        .await?
        .ok_or_else(|| ProvisionerError::NotFound {
            kind: "managed policy",
            id: source_arn.to_string(),
        })?;

    match target.get_managed_policy(target_arn).await? {
        Some(existing) if same_document(&existing.document, &policy.document) => Ok(()),
        Some(_) => target.set_managed_policy_document(target_arn, &policy.document).await,
        None => {
            let desired = ManagedPolicy {
                arn: target_arn.to_string(),
                ..policy
            };
            if !target.create_managed_policy(&desired).await? {
                target
                    .set_managed_policy_document(target_arn, &desired.document)
                    .await?;
            }
            Ok(())
        }
    }
}
