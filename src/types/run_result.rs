//! What a flow run reports across the engine boundary.

use serde::{Deserialize, Serialize};

use super::{ExecutedStep, RunState, Variables};

/// Result of one top-level flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRunResult {
  pub state: RunState,
  /// Human-readable reason; `None` for completed and canceled runs.
  pub failure_reason: Option<String>,
  pub executed_steps: Vec<ExecutedStep>,
  /// Raw code of the last step that ran, if any.
  pub last_code: Option<i32>,
  /// Display name of the step the run failed on.
  pub failed_step: Option<String>,
  /// Name of the flow the run failed in.
  pub failed_flow: Option<String>,
  /// Variables at the end of the run.
  pub variables: Variables,
}

impl FlowRunResult {
  /// Variables seeding a failure flow started because this run failed.
  pub fn failure_flow_variables(&self) -> Variables {
    let mut v = Variables::new();
    v.insert("FailedStep", self.failed_step.clone().unwrap_or_default());
    v.insert("FailedFlow", self.failed_flow.clone().unwrap_or_default());
    v.insert("FailureReason", self.failure_reason.clone().unwrap_or_default());
    v
  }
}
