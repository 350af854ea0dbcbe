//! AWS access for the provisioning steps.
//!
//! Steps never talk to the SDK directly. They ask a [`ClientFactory`] for a
//! narrow, role-scoped API object ([`ServiceCatalogApi`], [`IamApi`]) so
//! the same step code runs against real accounts or in-memory fakes.

pub mod iam;
pub mod service_catalog;

use std::sync::Arc;

use aws_sdk_sts::config::Credentials;

use crate::error::{aws_err, ProvisionerError};
use crate::BoxFuture;

pub use iam::{AttachedPolicy, IamApi, ManagedPolicy, RoleDetail, SdkIam};
pub use service_catalog::{
    ConstraintDetail, LaunchPath, Page, PortfolioDetail, ProvisionRequest, ProvisionedProduct,
    RecordDetail, RecordOutput, SdkServiceCatalog, ServiceCatalogApi,
};

/// The role a client acts as. `external_id` is present for cross-account
/// roles and absent for home-account calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTarget {
    pub role_arn: String,
    pub external_id: Option<String>,
}

impl RoleTarget {
    pub fn new(role_arn: impl Into<String>, external_id: Option<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            external_id: external_id.filter(|id| !id.is_empty()),
        }
    }

    /// A home-account role, assumed without an external ID.
    pub fn home(role_arn: impl Into<String>) -> Self {
        Self::new(role_arn, None)
    }
}

/// Vends role-scoped AWS clients.
pub trait ClientFactory: Send + Sync {
    fn service_catalog<'a>(
        &'a self,
        target: &'a RoleTarget,
    ) -> BoxFuture<'a, Result<Arc<dyn ServiceCatalogApi>, ProvisionerError>>;

    fn iam<'a>(
        &'a self,
        target: &'a RoleTarget,
    ) -> BoxFuture<'a, Result<Arc<dyn IamApi>, ProvisionerError>>;
}

/// [`ClientFactory`] backed by STS `AssumeRole`.
///
/// Assume-role failures are configuration or permission problems and are
/// surfaced immediately; nothing here retries.
pub struct AwsClientFactory {
    base: aws_config::SdkConfig,
    region: String,
    session_name: String,
}

impl AwsClientFactory {
    pub fn new(base: aws_config::SdkConfig, region: impl Into<String>, session_name: String) -> Self {
        Self {
            base,
            region: region.into(),
            session_name,
        }
    }

    /// Derive the role session name from the calling principal.
    pub async fn from_caller(
        base: aws_config::SdkConfig,
        region: impl Into<String>,
        session_prefix: &str,
    ) -> Result<Self, ProvisionerError> {
        let sts = aws_sdk_sts::Client::new(&base);
        let resp = sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| aws_err("sts:GetCallerIdentity", &e))?;
        let caller_arn = resp.arn().unwrap_or_default();
        let session_name = session_name_for(session_prefix, caller_arn);

        tracing::debug!(caller_arn = %caller_arn, session = %session_name, "resolved role session name");
        Ok(Self::new(base, region, session_name))
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    async fn assume(&self, target: &RoleTarget) -> Result<aws_config::SdkConfig, ProvisionerError> {
        let sts = aws_sdk_sts::Client::new(&self.base);

        tracing::debug!(
            role_arn = %target.role_arn,
            cross_account = target.external_id.is_some(),
            "assuming role"
        );

        let resp = sts
            .assume_role()
            .role_arn(&target.role_arn)
            .role_session_name(&self.session_name)
            .set_external_id(target.external_id.clone())
            .send()
            .await
            .map_err(|e| ProvisionerError::AssumeRole {
                role_arn: target.role_arn.clone(),
                message: crate::error::format_err_chain(&e),
            })?;

        let creds = resp.credentials().ok_or_else(|| ProvisionerError::AssumeRole {
            role_arn: target.role_arn.clone(),
            message: "AssumeRole returned no credentials".into(),
        })?;

        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            None,
            "workbench-assume-role",
        );

        Ok(aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await)
    }
}

impl ClientFactory for AwsClientFactory {
    fn service_catalog<'a>(
        &'a self,
        target: &'a RoleTarget,
    ) -> BoxFuture<'a, Result<Arc<dyn ServiceCatalogApi>, ProvisionerError>> {
        Box::pin(async move {
            let config = self.assume(target).await?;
            let client = aws_sdk_servicecatalog::Client::new(&config);
            Ok(Arc::new(SdkServiceCatalog::new(client)) as Arc<dyn ServiceCatalogApi>)
        })
    }

    fn iam<'a>(
        &'a self,
        target: &'a RoleTarget,
    ) -> BoxFuture<'a, Result<Arc<dyn IamApi>, ProvisionerError>> {
        Box::pin(async move {
            let config = self.assume(target).await?;
            let client = aws_sdk_iam::Client::new(&config);
            Ok(Arc::new(SdkIam::new(client)) as Arc<dyn IamApi>)
        })
    }
}

/// Build an STS role session name from a prefix and the caller's ARN.
///
/// Session names allow `[\w+=,.@-]` and at most 64 characters.
pub fn session_name_for(prefix: &str, caller_arn: &str) -> String {
    let principal = caller_arn.rsplit(['/', ':']).next().unwrap_or_default();
    let raw = if principal.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}-{principal}")
    };
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || "+=,.@-_".contains(*c))
        .take(64)
        .collect()
}
