pub mod env_type;
pub mod resolved_vars;
pub mod status;
pub mod tag;

pub use env_type::{ConfigParam, EnvTypeConfig, EnvironmentType, ProductRef, ProvisioningArtifactRef};
pub use resolved_vars::{ResolvedVars, RESERVED_NAMES};
pub use status::{classify_provisioning, classify_termination, EnvironmentStatus, StatusClass};
pub use tag::{union_by_key, KeyValue};
