//! workbench-storage
//!
//! S3 operations for durable workflow state. Thin wrapper around the AWS S3 SDK.

pub mod client;
pub mod error;
pub mod objects;
pub mod state;
