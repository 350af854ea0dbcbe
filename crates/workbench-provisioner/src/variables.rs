//! `${var}` template expressions over [`ResolvedVars`].

use std::sync::LazyLock;

use regex::Regex;
use workbench_core::models::{ConfigParam, KeyValue, ResolvedVars};

use crate::error::ProvisionerError;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}").expect("variable pattern is valid")
});

/// Resolve every `${name}` in `expression`.
///
/// Referencing a variable that is not set is a configuration error.
pub fn resolve_expression(expression: &str, vars: &ResolvedVars) -> Result<String, ProvisionerError> {
    let mut out = String::with_capacity(expression.len());
    let mut last = 0;
    for caps in VARIABLE.captures_iter(expression) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .lookup(name.as_str())
            .ok_or_else(|| ProvisionerError::UnresolvedVariable {
                name: name.as_str().to_string(),
                expression: expression.to_string(),
            })?;
        out.push_str(&expression[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&expression[last..]);
    Ok(out)
}

/// Resolve a templated parameter list into concrete AWS key/value pairs.
pub fn resolve_params(
    params: &[ConfigParam],
    vars: &ResolvedVars,
) -> Result<Vec<KeyValue>, ProvisionerError> {
    params
        .iter()
        .map(|p| Ok(KeyValue::new(p.key.clone(), resolve_expression(&p.value, vars)?)))
        .collect()
}
