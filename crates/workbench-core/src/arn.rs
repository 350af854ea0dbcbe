//! ARN helpers.
//!
//! Role and policy ARNs carry the account ID in the fifth field:
//! `arn:aws:iam::123456789012:role/path/Name`.

use crate::error::CoreError;

/// Extract the 12-digit account ID from an IAM or STS ARN.
pub fn account_id(arn: &str) -> Result<&str, CoreError> {
    let mut parts = arn.split(':');
    if parts.next() != Some("arn") {
        return Err(CoreError::InvalidArn(arn.to_string()));
    }
    match parts.nth(3) {
        Some(account) if !account.is_empty() => Ok(account),
        _ => Err(CoreError::InvalidArn(arn.to_string())),
    }
}

/// Build a role ARN from an account ID, IAM path and role name.
///
/// An empty path is the root path `/`.
pub fn build_role_arn(account_id: &str, path: &str, role_name: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("arn:aws:iam::{account_id}:role/{role_name}")
    } else {
        format!("arn:aws:iam::{account_id}:role/{path}/{role_name}")
    }
}

/// AWS-managed policies live in the pseudo-account `aws` and exist in
/// every account.
pub fn is_aws_managed_policy(arn: &str) -> bool {
    arn.starts_with("arn:aws:iam::aws:policy/")
}

/// Rewrite the account field of a customer-managed policy ARN.
pub fn policy_arn_in_account(arn: &str, account_id: &str) -> Result<String, CoreError> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() != 6 || parts[0] != "arn" {
        return Err(CoreError::InvalidArn(arn.to_string()));
    }
    Ok(format!(
        "{}:{}:{}:{}:{account_id}:{}",
        parts[0], parts[1], parts[2], parts[3], parts[5]
    ))
}
