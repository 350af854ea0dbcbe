use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A concrete key/value pair in AWS shape, used for both provisioning
/// parameters and resource tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Stable union by `Key`: walks `first` then `second`, keeping the first
/// occurrence of each key.
///
/// On collision the entry from `first` wins.
pub fn union_by_key(first: &[KeyValue], second: &[KeyValue]) -> Vec<KeyValue> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second)
        .filter(|kv| seen.insert(kv.key.clone()))
        .cloned()
        .collect()
}
