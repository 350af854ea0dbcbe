//! Workflow definitions: ordered step lists, looked up by name.

use crate::step::Step;
use crate::steps::{
    LaunchProduct, ReadEnvironmentInfo, ReplicateLaunchConstraint, SharePortfolio,
    TerminateProduct,
};

pub const PROVISION_ENVIRONMENT: &str = "provision-environment";
pub const TERMINATE_ENVIRONMENT: &str = "terminate-environment";

pub struct Workflow {
    pub name: &'static str,
    pub steps: Vec<Box<dyn Step>>,
}

impl Workflow {
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

pub fn provision_environment() -> Workflow {
    Workflow {
        name: PROVISION_ENVIRONMENT,
        steps: vec![
            Box::new(ReadEnvironmentInfo),
            Box::new(ReplicateLaunchConstraint),
            Box::new(SharePortfolio),
            Box::new(LaunchProduct),
        ],
    }
}

pub fn terminate_environment() -> Workflow {
    Workflow {
        name: TERMINATE_ENVIRONMENT,
        steps: vec![Box::new(TerminateProduct)],
    }
}

pub fn by_name(name: &str) -> Option<Workflow> {
    match name {
        PROVISION_ENVIRONMENT => Some(provision_environment()),
        TERMINATE_ENVIRONMENT => Some(terminate_environment()),
        _ => None,
    }
}
