use serde::{Deserialize, Serialize};

/// Environment lifecycle status as recorded by the CRUD layer.
///
/// The provisioning core never persists this itself; it only reports
/// transitions to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvironmentStatus {
    Pending,
    Completed,
    Failed,
    Terminating,
    Terminated,
    TerminatingFailed,
}

impl EnvironmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::TerminatingFailed => "TERMINATING_FAILED",
        }
    }
}

/// Classification of a Service Catalog status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Succeeded,
    Failed,
    InProgress,
}

/// Provisioned product statuses that end a launch in failure.
pub const PROVISIONING_FAILURE: &[&str] = &["TAINTED", "ERROR"];
/// Provisioned product statuses that end a launch successfully.
pub const PROVISIONING_SUCCESS: &[&str] = &["AVAILABLE"];
/// Record statuses that end a termination in failure.
pub const TERMINATION_FAILURE: &[&str] = &["FAILED", "IN_PROGRESS_IN_ERROR"];
/// Record statuses that end a termination successfully.
pub const TERMINATION_SUCCESS: &[&str] = &["SUCCEEDED"];

fn classify(status: &str, success: &[&str], failure: &[&str]) -> StatusClass {
    if failure.contains(&status) {
        StatusClass::Failed
    } else if success.contains(&status) {
        StatusClass::Succeeded
    } else {
        StatusClass::InProgress
    }
}

/// Classify a provisioned product status during a launch.
pub fn classify_provisioning(status: &str) -> StatusClass {
    classify(status, PROVISIONING_SUCCESS, PROVISIONING_FAILURE)
}

/// Classify a record status during a termination.
pub fn classify_termination(status: &str) -> StatusClass {
    classify(status, TERMINATION_SUCCESS, TERMINATION_FAILURE)
}
