//! Durable, tick-driven workflow execution.
//!
//! A workflow never blocks waiting for AWS. Each [`WorkflowRunner::tick`]
//! advances the persisted [`WorkflowState`] as far as it can and returns
//! when the workflow completes or a step must wait. The caller persists the
//! state after every tick (success or failure) and schedules the next tick,
//! possibly on a different worker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProvisionerError;
use crate::services::Services;
use crate::step::{Payload, Step, StepContext, StepOutcome};
use crate::workflows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Waiting,
    Completed,
    Failed,
}

/// Where the current step is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum StepPhase {
    Start,
    Polling {
        attempts: u64,
        max_attempts: u64,
        interval_secs: u64,
        next_check_at_ms: i64,
    },
}

/// Everything needed to resume a workflow on any worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub workflow: String,
    pub status: WorkflowStatus,
    pub step_index: usize,
    pub phase: StepPhase,
    pub payload: Payload,
    /// Private state of each step, keyed by step name.
    #[serde(default)]
    pub step_states: BTreeMap<String, Payload>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    /// Bumped by every tick; orders copies written within the same millisecond.
    #[serde(default)]
    pub revision: u64,
}

impl WorkflowState {
    pub fn new(
        workflow_id: impl Into<String>,
        workflow: impl Into<String>,
        payload: Payload,
        now_ms: i64,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow: workflow.into(),
            status: WorkflowStatus::Running,
            step_index: 0,
            phase: StepPhase::Start,
            payload,
            step_states: BTreeMap::new(),
            error: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            revision: 0,
        }
    }

    /// Whether this copy was written after `other`.
    pub fn is_newer_than(&self, other: &WorkflowState) -> bool {
        (self.revision, self.updated_at_ms) > (other.revision, other.updated_at_ms)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Waiting { next_check_at_ms: i64 },
}

/// What happened to the current step during one pass of the tick loop.
enum Advance {
    Next,
    Wait(i64),
}

pub struct WorkflowRunner {
    services: Services,
}

impl WorkflowRunner {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Advance `state` as far as possible at `now_ms`.
    ///
    /// On failure the state is marked [`WorkflowStatus::Failed`] before the
    /// error is returned, so the caller can persist it either way.
    pub async fn tick(
        &self,
        state: &mut WorkflowState,
        now_ms: i64,
    ) -> Result<TickOutcome, ProvisionerError> {
        match state.status {
            WorkflowStatus::Completed => return Ok(TickOutcome::Completed),
            WorkflowStatus::Failed => {
                return Err(ProvisionerError::State(format!(
                    "workflow {} already failed: {}",
                    state.workflow_id,
                    state.error.as_deref().unwrap_or("unknown error")
                )));
            }
            WorkflowStatus::Running | WorkflowStatus::Waiting => {}
        }

        let workflow = workflows::by_name(&state.workflow).ok_or_else(|| {
            ProvisionerError::State(format!("unknown workflow {}", state.workflow))
        })?;

        state.updated_at_ms = now_ms;
        state.revision += 1;
        state.status = WorkflowStatus::Running;

        while state.step_index < workflow.steps.len() {
            let step = workflow.steps[state.step_index].as_ref();
            let mut ctx = StepContext {
                workflow_id: state.workflow_id.clone(),
                payload: std::mem::take(&mut state.payload),
                state: state.step_states.remove(step.name()).unwrap_or_default(),
                now_ms,
            };

            let result = match self.advance(step, &mut state.phase, &mut ctx).await {
                Ok(advance) => Ok(advance),
                Err(err) => Err(step.on_fail(&self.services, &mut ctx, err).await),
            };

            state.payload = ctx.payload;
            state.step_states.insert(step.name().to_string(), ctx.state);

            match result {
                Ok(Advance::Next) => {
                    tracing::info!(
                        workflow_id = %state.workflow_id,
                        step = step.name(),
                        "step completed"
                    );
                    state.step_index += 1;
                    state.phase = StepPhase::Start;
                }
                Ok(Advance::Wait(next_check_at_ms)) => {
                    state.status = WorkflowStatus::Waiting;
                    return Ok(TickOutcome::Waiting { next_check_at_ms });
                }
                Err(err) => {
                    state.status = WorkflowStatus::Failed;
                    state.error = Some(err.to_string());
                    tracing::error!(
                        workflow_id = %state.workflow_id,
                        step = step.name(),
                        error = %err,
                        "workflow failed"
                    );
                    return Err(err);
                }
            }
        }

        state.status = WorkflowStatus::Completed;
        tracing::info!(workflow_id = %state.workflow_id, workflow = %state.workflow, "workflow completed");
        Ok(TickOutcome::Completed)
    }

    async fn advance(
        &self,
        step: &dyn Step,
        phase: &mut StepPhase,
        ctx: &mut StepContext,
    ) -> Result<Advance, ProvisionerError> {
        if let StepPhase::Start = phase {
            ctx.payload.validate(step.input_keys())?;
            tracing::debug!(workflow_id = %ctx.workflow_id, step = step.name(), "starting step");

            match step.start(&self.services, ctx).await? {
                StepOutcome::Done => return self.finish(step, ctx),
                StepOutcome::Wait(wait) => {
                    let next_check_at_ms = ctx.now_ms + interval_ms(wait.interval_secs);
                    *phase = StepPhase::Polling {
                        attempts: 0,
                        max_attempts: wait.max_attempts,
                        interval_secs: wait.interval_secs,
                        next_check_at_ms,
                    };
                    return Ok(Advance::Wait(next_check_at_ms));
                }
            }
        }

        let StepPhase::Polling {
            attempts,
            max_attempts,
            interval_secs,
            next_check_at_ms,
        } = phase
        else {
            return Err(ProvisionerError::State("unreachable step phase".into()));
        };

        if ctx.now_ms < *next_check_at_ms {
            return Ok(Advance::Wait(*next_check_at_ms));
        }

        *attempts += 1;
        if step.should_resume(&self.services, ctx).await? {
            step.on_successful_completion(&self.services, ctx).await?;
            return self.finish(step, ctx);
        }

        if *attempts >= *max_attempts {
            return Err(step.report_timeout(ctx));
        }

        *next_check_at_ms = ctx.now_ms + interval_ms(*interval_secs);
        tracing::debug!(
            workflow_id = %ctx.workflow_id,
            step = step.name(),
            attempts = *attempts,
            "step still in progress"
        );
        Ok(Advance::Wait(*next_check_at_ms))
    }

    fn finish(&self, step: &dyn Step, ctx: &StepContext) -> Result<Advance, ProvisionerError> {
        ctx.payload.validate(step.output_keys())?;
        step.on_pass(ctx);
        Ok(Advance::Next)
    }
}

fn interval_ms(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

