//! Stack-name uniqueness for statically configured namespaces.
//!
//! An environment type config may pin the `Namespace` template parameter
//! to a fixed string. Deploying it twice would collide on the
//! CloudFormation stack name, and IAM policies only grant access to stacks
//! named `analysis-*`, so the guard forces both the prefix and a
//! per-attempt timestamp suffix.

use workbench_core::models::KeyValue;

pub const NAMESPACE_PARAM: &str = "Namespace";
pub const NAMESPACE_PREFIX: &str = "analysis-";

/// The namespace generated for every workflow attempt.
pub fn dynamic_namespace(timestamp_ms: i64) -> String {
    format!("{NAMESPACE_PREFIX}{timestamp_ms}")
}

/// Make a namespace value prefix-compliant and unique for `timestamp_ms`.
pub fn unique_namespace(value: &str, timestamp_ms: i64) -> String {
    let stamp = timestamp_ms.to_string();
    let mut namespace = if value.starts_with(NAMESPACE_PREFIX) {
        value.to_string()
    } else {
        format!("{NAMESPACE_PREFIX}{value}")
    };
    if !namespace.ends_with(&stamp) {
        namespace.push('-');
        namespace.push_str(&stamp);
    }
    namespace
}

/// Rewrite the `Namespace` parameter in place, if present.
///
/// Must run after template resolution: resolution can reintroduce a static
/// name over the dynamic default. Returns the final namespace when the
/// parameter exists.
pub fn apply(params: &mut [KeyValue], timestamp_ms: i64) -> Option<String> {
    let param = params.iter_mut().find(|p| p.key == NAMESPACE_PARAM)?;
    param.value = unique_namespace(&param.value, timestamp_ms);
    Some(param.value.clone())
}
