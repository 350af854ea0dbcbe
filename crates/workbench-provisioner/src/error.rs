use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("product {product_id} is not shared with role {role_arn}")]
    NotShared { product_id: String, role_arn: String },

    #[error(
        "ambiguous portfolio: product {product_id} is shared with role {role_arn} through more than one {kind}: {}",
        .candidates.join(", ")
    )]
    AmbiguousPortfolio {
        product_id: String,
        role_arn: String,
        kind: &'static str,
        candidates: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("failed to assume role {role_arn}: {message}")]
    AssumeRole { role_arn: String, message: String },

    #[error("AWS error: {0}")]
    Aws(String),

    #[error("provisioning of {stack_name} failed: {message}")]
    ProvisioningFailed { stack_name: String, message: String },

    #[error("termination of {target} failed: {message}")]
    TerminationFailed { target: String, message: String },

    #[error("{operation} of {target} did not finish within {days} days")]
    TimedOut {
        operation: &'static str,
        target: String,
        days: u64,
    },

    #[error("missing payload key: {0}")]
    MissingInput(String),

    #[error("payload key {key} is not a valid {expected}")]
    InvalidInput { key: String, expected: &'static str },

    #[error("unresolved variable ${{{name}}} in expression {expression:?}")]
    UnresolvedVariable { name: String, expression: String },

    #[error("plugin {plugin} failed in {hook}: {message}")]
    Plugin {
        plugin: String,
        hook: &'static str,
        message: String,
    },

    #[error("state error: {0}")]
    State(String),

    #[error("core error: {0}")]
    Core(#[from] workbench_core::CoreError),

    #[error("storage error: {0}")]
    Storage(#[from] workbench_storage::error::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Walk the full error chain and join all causes into one string.
///
/// AWS SDK errors often have terse `Display` impls (e.g. "service error")
/// but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Wrap an AWS SDK failure with the operation that produced it.
pub(crate) fn aws_err(operation: &str, err: &dyn std::error::Error) -> ProvisionerError {
    ProvisionerError::Aws(format!("{operation} failed: {}", format_err_chain(err)))
}
