use aws_sdk_iam::types::Tag;
use aws_sdk_iam::Client;
use serde::{Deserialize, Serialize};
use workbench_core::models::KeyValue;

use crate::error::{aws_err, ProvisionerError};
use crate::BoxFuture;

/// IAM allows at most five versions of a managed policy.
const MAX_POLICY_VERSIONS: usize = 5;

/// An IAM role as far as cloning is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDetail {
    pub name: String,
    pub path: String,
    pub arn: String,
    /// Decoded trust policy JSON.
    pub assume_role_policy_document: String,
    pub description: Option<String>,
    pub max_session_duration: Option<i32>,
    pub permissions_boundary: Option<String>,
    pub tags: Vec<KeyValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedPolicy {
    pub name: String,
    pub arn: String,
}

/// A managed policy together with its default version's document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedPolicy {
    pub arn: String,
    pub name: String,
    pub path: String,
    pub description: Option<String>,
    pub document: String,
}

/// The IAM calls role cloning and egress-store cleanup need.
///
/// All documents crossing this boundary are decoded JSON strings.
pub trait IamApi: Send + Sync {
    fn get_role<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<RoleDetail>, ProvisionerError>>;

    /// Returns `false` when the role already existed.
    fn create_role<'a>(&'a self, role: &'a RoleDetail)
    -> BoxFuture<'a, Result<bool, ProvisionerError>>;

    fn update_assume_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    /// Returns `false` when the role did not exist.
    fn delete_role<'a>(&'a self, role_name: &'a str) -> BoxFuture<'a, Result<bool, ProvisionerError>>;

    fn list_role_policies<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>>;

    fn get_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<String, ProvisionerError>>;

    fn put_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn delete_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn list_attached_role_policies<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AttachedPolicy>, ProvisionerError>>;

    fn attach_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn detach_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    fn get_managed_policy<'a>(
        &'a self,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<Option<ManagedPolicy>, ProvisionerError>>;

    /// Returns `false` when a policy with that name already existed.
    fn create_managed_policy<'a>(
        &'a self,
        policy: &'a ManagedPolicy,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>>;

    /// Publish `document` as the new default version of a managed policy.
    fn set_managed_policy_document<'a>(
        &'a self,
        policy_arn: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>>;
}

/// IAM returns policy documents URL-encoded.
fn decode_document(raw: &str) -> String {
    percent_encoding::percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// [`IamApi`] over the AWS SDK.
pub struct SdkIam {
    client: Client,
}

impl SdkIam {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl IamApi for SdkIam {
    fn get_role<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<RoleDetail>, ProvisionerError>> {
        Box::pin(async move {
            match self.client.get_role().role_name(role_name).send().await {
                Ok(resp) => Ok(resp.role().map(|r| RoleDetail {
                    name: r.role_name().to_string(),
                    path: r.path().to_string(),
                    arn: r.arn().to_string(),
                    assume_role_policy_document: decode_document(
                        r.assume_role_policy_document().unwrap_or_default(),
                    ),
                    description: r.description().map(String::from),
                    max_session_duration: r.max_session_duration(),
                    permissions_boundary: r
                        .permissions_boundary()
                        .and_then(|b| b.permissions_boundary_arn())
                        .map(String::from),
                    tags: r
                        .tags()
                        .iter()
                        .map(|t| KeyValue::new(t.key(), t.value()))
                        .collect(),
                })),
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_no_such_entity_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(None);
                    }
                    Err(aws_err("iam:GetRole", &e))
                }
            }
        })
    }

    fn create_role<'a>(
        &'a self,
        role: &'a RoleDetail,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            let tags = role
                .tags
                .iter()
                .map(|t| Tag::builder().key(&t.key).value(&t.value).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ProvisionerError::Configuration(format!("invalid role tag: {e}")))?;

            let result = self
                .client
                .create_role()
                .role_name(&role.name)
                .path(&role.path)
                .assume_role_policy_document(&role.assume_role_policy_document)
                .set_description(role.description.clone())
                .set_max_session_duration(role.max_session_duration)
                .set_permissions_boundary(role.permissions_boundary.clone())
                .set_tags((!tags.is_empty()).then_some(tags))
                .send()
                .await;

            match result {
                Ok(_) => {
                    tracing::info!(role_name = %role.name, "IAM role created");
                    Ok(true)
                }
                Err(e) => {
                    let exists = e
                        .as_service_error()
                        .map(|se| se.is_entity_already_exists_exception())
                        .unwrap_or(false);
                    if exists {
                        return Ok(false);
                    }
                    Err(aws_err("iam:CreateRole", &e))
                }
            }
        })
    }

    fn update_assume_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .update_assume_role_policy()
                .role_name(role_name)
                .policy_document(document)
                .send()
                .await
                .map_err(|e| aws_err("iam:UpdateAssumeRolePolicy", &e))?;
            Ok(())
        })
    }

    fn delete_role<'a>(&'a self, role_name: &'a str) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            match self.client.delete_role().role_name(role_name).send().await {
                Ok(_) => {
                    tracing::info!(role_name = %role_name, "IAM role deleted");
                    Ok(true)
                }
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_no_such_entity_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(false);
                    }
                    Err(aws_err("iam:DeleteRole", &e))
                }
            }
        })
    }

    fn list_role_policies<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ProvisionerError>> {
        Box::pin(async move {
            let mut names = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let resp = self
                    .client
                    .list_role_policies()
                    .role_name(role_name)
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| aws_err("iam:ListRolePolicies", &e))?;
                names.extend(resp.policy_names().iter().cloned());
                if !resp.is_truncated() {
                    break;
                }
                marker = resp.marker().map(String::from);
                if marker.is_none() {
                    break;
                }
            }
            Ok(names)
        })
    }

    fn get_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<String, ProvisionerError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get_role_policy()
                .role_name(role_name)
                .policy_name(policy_name)
                .send()
                .await
                .map_err(|e| aws_err("iam:GetRolePolicy", &e))?;
            Ok(decode_document(resp.policy_document()))
        })
    }

    fn put_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .put_role_policy()
                .role_name(role_name)
                .policy_name(policy_name)
                .policy_document(document)
                .send()
                .await
                .map_err(|e| aws_err("iam:PutRolePolicy", &e))?;
            Ok(())
        })
    }

    fn delete_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_name: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            match self
                .client
                .delete_role_policy()
                .role_name(role_name)
                .policy_name(policy_name)
                .send()
                .await
            {
                Ok(_) => Ok(()),
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_no_such_entity_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(());
                    }
                    Err(aws_err("iam:DeleteRolePolicy", &e))
                }
            }
        })
    }

    fn list_attached_role_policies<'a>(
        &'a self,
        role_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AttachedPolicy>, ProvisionerError>> {
        Box::pin(async move {
            let mut policies = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let resp = self
                    .client
                    .list_attached_role_policies()
                    .role_name(role_name)
                    .set_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| aws_err("iam:ListAttachedRolePolicies", &e))?;
                policies.extend(resp.attached_policies().iter().filter_map(|p| {
                    Some(AttachedPolicy {
                        name: p.policy_name()?.to_string(),
                        arn: p.policy_arn()?.to_string(),
                    })
                }));
                if !resp.is_truncated() {
                    break;
                }
                marker = resp.marker().map(String::from);
                if marker.is_none() {
                    break;
                }
            }
            Ok(policies)
        })
    }

    fn attach_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            self.client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map_err(|e| aws_err("iam:AttachRolePolicy", &e))?;
            Ok(())
        })
    }

    fn detach_role_policy<'a>(
        &'a self,
        role_name: &'a str,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            match self
                .client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send()
                .await
            {
                Ok(_) => Ok(()),
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_no_such_entity_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(());
                    }
                    Err(aws_err("iam:DetachRolePolicy", &e))
                }
            }
        })
    }

    fn get_managed_policy<'a>(
        &'a self,
        policy_arn: &'a str,
    ) -> BoxFuture<'a, Result<Option<ManagedPolicy>, ProvisionerError>> {
        Box::pin(async move {
            let resp = match self.client.get_policy().policy_arn(policy_arn).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    let is_not_found = e
                        .as_service_error()
                        .map(|se| se.is_no_such_entity_exception())
                        .unwrap_or(false);
                    if is_not_found {
                        return Ok(None);
                    }
                    return Err(aws_err("iam:GetPolicy", &e));
                }
            };
            let Some(policy) = resp.policy() else {
                return Ok(None);
            };

            let version_id = policy.default_version_id().unwrap_or("v1");
            let version_resp = self
                .client
                .get_policy_version()
                .policy_arn(policy_arn)
                .version_id(version_id)
                .send()
                .await
                .map_err(|e| aws_err("iam:GetPolicyVersion", &e))?;
            let document = version_resp
                .policy_version()
                .and_then(|v| v.document())
                .map(decode_document)
                .unwrap_or_default();

            Ok(Some(ManagedPolicy {
                arn: policy_arn.to_string(),
                name: policy.policy_name().unwrap_or_default().to_string(),
                path: policy.path().unwrap_or("/").to_string(),
                description: policy.description().map(String::from),
                document,
            }))
        })
    }

    fn create_managed_policy<'a>(
        &'a self,
        policy: &'a ManagedPolicy,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async move {
            let result = self
                .client
                .create_policy()
                .policy_name(&policy.name)
                .path(&policy.path)
                .policy_document(&policy.document)
                .set_description(policy.description.clone())
                .send()
                .await;
            match result {
                Ok(_) => {
                    tracing::info!(policy_arn = %policy.arn, "managed policy created");
                    Ok(true)
                }
                Err(e) => {
                    let exists = e
                        .as_service_error()
                        .map(|se| se.is_entity_already_exists_exception())
                        .unwrap_or(false);
                    if exists {
                        return Ok(false);
                    }
                    Err(aws_err("iam:CreatePolicy", &e))
                }
            }
        })
    }

    fn set_managed_policy_document<'a>(
        &'a self,
        policy_arn: &'a str,
        document: &'a str,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let versions = self
                .client
                .list_policy_versions()
                .policy_arn(policy_arn)
                .send()
                .await
                .map_err(|e| aws_err("iam:ListPolicyVersions", &e))?;

            let mut stale: Vec<_> = versions
                .versions()
                .iter()
                .filter(|v| !v.is_default_version())
                .collect();
            if versions.versions().len() >= MAX_POLICY_VERSIONS {
                stale.sort_by_key(|v| v.create_date().map(|d| d.secs()).unwrap_or_default());
                if let Some(oldest) = stale.first().and_then(|v| v.version_id()) {
                    self.client
                        .delete_policy_version()
                        .policy_arn(policy_arn)
                        .version_id(oldest)
                        .send()
                        .await
                        .map_err(|e| aws_err("iam:DeletePolicyVersion", &e))?;
                }
            }

            self.client
                .create_policy_version()
                .policy_arn(policy_arn)
                .policy_document(document)
                .set_as_default(true)
                .send()
                .await
                .map_err(|e| aws_err("iam:CreatePolicyVersion", &e))?;

            tracing::info!(policy_arn = %policy_arn, "managed policy updated");
            Ok(())
        })
    }
}
