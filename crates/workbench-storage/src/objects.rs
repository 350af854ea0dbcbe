use aws_sdk_s3::Client;
use aws_smithy_types::byte_stream::ByteStream;

use crate::error::StorageError;

/// Body and ETag of a fetched object.
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

pub async fn get_object(client: &Client, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
    let read_err = |message: String| StorageError::Read {
        bucket: bucket.to_string(),
        key: key.to_string(),
        message,
    };

    let resp = match client.get_object().bucket(bucket).key(key).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let err = e.into_service_error();
            if err.is_no_such_key() {
                return Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            return Err(read_err(err.to_string()));
        }
    };

    let etag = resp.e_tag().map(String::from);
    let body = resp
        .body
        .collect()
        .await
        .map_err(|e| read_err(e.to_string()))?
        .into_bytes()
        .to_vec();

    Ok(StoredObject { body, etag })
}

/// Upload `body` as a JSON object. Returns the new ETag.
pub async fn put_json(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
) -> Result<String, StorageError> {
    let resp = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type("application/json")
        .body(ByteStream::from(body))
        .send()
        .await
        .map_err(|e| StorageError::Write {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: e.into_service_error().to_string(),
        })?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}
