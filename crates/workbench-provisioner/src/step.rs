//! The contract between a workflow step and the runner that drives it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProvisionerError;
use crate::services::Services;
use crate::BoxFuture;

/// Type tag of a declared payload key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Object,
    String,
    /// A string that may be absent or null.
    OptionalString,
    Boolean,
    Number,
}

impl KeyType {
    fn accepts(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Self::OptionalString, None | Some(Value::Null | Value::String(_))) => true,
            (_, None) => false,
            (Self::Object, Some(v)) => v.is_object(),
            (Self::String, Some(v)) => v.is_string(),
            (Self::Boolean, Some(v)) => v.is_boolean(),
            (Self::Number, Some(v)) => v.is_number(),
            (Self::OptionalString, Some(_)) => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::String => "string",
            Self::OptionalString => "optionalString",
            Self::Boolean => "boolean",
            Self::Number => "number",
        }
    }
}

/// A payload key a step reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub key: &'static str,
    pub ty: KeyType,
}

impl KeySpec {
    pub const fn new(key: &'static str, ty: KeyType) -> Self {
        Self { key, ty }
    }
}

/// A JSON object of named values, used both for the workflow payload shared
/// by all steps and for each step's private state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

/// Step-local state. Survives across ticks of the same step.
pub type StepState = Payload;

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from a JSON object.
    pub fn from_value(value: Value) -> Result<Self, ProvisionerError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ProvisionerError::State(format!(
                "payload must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn string(&self, key: &str) -> Result<String, ProvisionerError> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(invalid(key, KeyType::String)),
            None => Err(ProvisionerError::MissingInput(key.to_string())),
        }
    }

    /// Absent and null both read as `None`.
    pub fn optional_string(&self, key: &str) -> Result<Option<String>, ProvisionerError> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(invalid(key, KeyType::OptionalString)),
        }
    }

    pub fn boolean(&self, key: &str) -> Result<bool, ProvisionerError> {
        match self.0.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(invalid(key, KeyType::Boolean)),
            None => Err(ProvisionerError::MissingInput(key.to_string())),
        }
    }

    pub fn number(&self, key: &str) -> Result<i64, ProvisionerError> {
        match self.0.get(key) {
            Some(v) => v.as_i64().ok_or_else(|| invalid(key, KeyType::Number)),
            None => Err(ProvisionerError::MissingInput(key.to_string())),
        }
    }

    pub fn object<T: DeserializeOwned>(&self, key: &str) -> Result<T, ProvisionerError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ProvisionerError::MissingInput(key.to_string()))?;
        if !value.is_object() {
            return Err(invalid(key, KeyType::Object));
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn set_key<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ProvisionerError> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Check every declared key against its type tag.
    pub fn validate(&self, specs: &[KeySpec]) -> Result<(), ProvisionerError> {
        for spec in specs {
            let value = self.0.get(spec.key);
            if value.is_none() && spec.ty != KeyType::OptionalString {
                return Err(ProvisionerError::MissingInput(spec.key.to_string()));
            }
            if !spec.ty.accepts(value) {
                return Err(invalid(spec.key, spec.ty));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, ty: KeyType) -> ProvisionerError {
    ProvisionerError::InvalidInput {
        key: key.to_string(),
        expected: ty.describe(),
    }
}

/// What a step invocation sees.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub workflow_id: String,
    /// The workflow payload. Output keys written here are visible to every
    /// later step.
    pub payload: Payload,
    pub state: StepState,
    /// Wall-clock time of this tick, ms since the epoch.
    pub now_ms: i64,
}

/// How long to wait between polls and how many polls to allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    pub interval_secs: u64,
    pub max_attempts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step finished inside `start`.
    Done,
    /// Suspend and re-check `should_resume` on the given cadence.
    Wait(WaitSpec),
}

/// One unit of a workflow.
///
/// `start` runs once. A step that returns [`StepOutcome::Wait`] is suspended
/// by the runner and polled through `should_resume` until it returns `true`
/// (then `on_successful_completion`), errors, or exhausts its attempts
/// (then `report_timeout`). Any error is routed through `on_fail`, whose
/// returned error is what the runner records.
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    fn input_keys(&self) -> &'static [KeySpec] {
        &[]
    }

    fn output_keys(&self) -> &'static [KeySpec] {
        &[]
    }

    fn start<'a>(
        &'a self,
        services: &'a Services,
        ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<StepOutcome, ProvisionerError>>;

    fn should_resume<'a>(
        &'a self,
        _services: &'a Services,
        _ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<bool, ProvisionerError>> {
        Box::pin(async { Ok(true) })
    }

    fn on_successful_completion<'a>(
        &'a self,
        _services: &'a Services,
        _ctx: &'a mut StepContext,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async { Ok(()) })
    }

    fn on_fail<'a>(
        &'a self,
        _services: &'a Services,
        _ctx: &'a mut StepContext,
        error: ProvisionerError,
    ) -> BoxFuture<'a, ProvisionerError> {
        Box::pin(async move { error })
    }

    fn report_timeout(&self, ctx: &StepContext) -> ProvisionerError {
        ProvisionerError::State(format!(
            "step {} of workflow {} ran out of poll attempts",
            self.name(),
            ctx.workflow_id
        ))
    }

    fn on_pass(&self, _ctx: &StepContext) {}
}
