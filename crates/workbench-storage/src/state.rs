use aws_sdk_s3::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::StorageError;
use crate::objects;

/// Load a JSON state document. Returns the value and its ETag.
pub async fn load_state<T: DeserializeOwned>(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<(T, String), StorageError> {
    let object = objects::get_object(client, bucket, key).await?;
    let value: T = serde_json::from_slice(&object.body)?;
    tracing::debug!(bucket = %bucket, key = %key, bytes = object.body.len(), "state object loaded");
    Ok((value, object.etag.unwrap_or_default()))
}

/// Save a JSON state document. Returns the new ETag.
pub async fn save_state<T: Serialize>(
    client: &Client,
    bucket: &str,
    key: &str,
    value: &T,
) -> Result<String, StorageError> {
    let body = serde_json::to_vec_pretty(value)?;
    objects::put_json(client, bucket, key, body).await
}
