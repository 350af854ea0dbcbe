use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid ARN: {0}")]
    InvalidArn(String),

    #[error("variable {0} is reserved")]
    ReservedVariable(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}
