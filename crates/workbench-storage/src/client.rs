use aws_sdk_s3::Client;

/// Build an S3 client from an already-loaded SDK config.
pub fn from_config(config: &aws_config::SdkConfig) -> Client {
    Client::new(config)
}
