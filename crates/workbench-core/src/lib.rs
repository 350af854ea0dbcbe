//! workbench-core
//!
//! Pure domain types for environment provisioning: resolved variables,
//! environment type records, tags, status vocabularies and settings.
//! No AWS SDK dependency: this is the shared vocabulary of the workbench.

pub mod arn;
pub mod error;
pub mod models;
pub mod settings;

pub use crate::error::CoreError;
pub use crate::settings::Settings;
