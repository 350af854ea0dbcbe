//! workbench-provisioner
//!
//! Workflow engine for standing up and tearing down per-user workspace
//! environments through AWS Service Catalog.
//!
//! Public API:
//! - `workflows::provision_environment()`: read-info, replicate launch
//!   constraint, share portfolio, launch product
//! - `workflows::terminate_environment()`: terminate product
//! - `WorkflowRunner::tick()`: advance a persisted workflow as far as it
//!   can go without blocking, returning when it completes or must wait
//! - `WorkflowPersistence`: durable workflow state (local disk + S3)

use std::future::Future;
use std::pin::Pin;

pub mod audit;
pub mod aws;
pub mod catalog;
pub mod collaborators;
pub mod egress;
pub mod error;
pub mod namespace;
pub mod persistence;
pub mod plugins;
pub mod role_clone;
pub mod runner;
pub mod services;
pub mod step;
pub mod steps;
pub mod variables;
pub mod workflows;

pub use crate::error::ProvisionerError;
pub use crate::persistence::WorkflowPersistence;
pub use crate::plugins::{Hook, LifecycleEvent, PluginBus, ProvisioningObserver};
pub use crate::runner::{StepPhase, TickOutcome, WorkflowRunner, WorkflowState, WorkflowStatus};
pub use crate::services::Services;
pub use crate::step::{Payload, Step, StepContext, StepOutcome, WaitSpec};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
