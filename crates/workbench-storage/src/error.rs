use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("state object is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("reading s3://{bucket}/{key} failed: {message}")]
    Read {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("writing s3://{bucket}/{key} failed: {message}")]
    Write {
        bucket: String,
        key: String,
        message: String,
    },
}
