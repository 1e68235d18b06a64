//! DTO for run.log.json: the record of one flow run against one file.

use serde::{Deserialize, Serialize};

use super::{ExecutedStep, FlowRunResult, RunState};

/// Root structure for run.log.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
  /// Log format version.
  pub version: u32,
  /// Name of the flow that ran.
  pub flow: String,
  /// File the run processed.
  pub file: String,
  /// RFC 3339 timestamp when the run started.
  pub started_at: String,
  /// RFC 3339 timestamp when the run finished (None while in progress).
  pub finished_at: Option<String>,
  /// Final state when the run ended.
  pub final_state: Option<RunState>,
  pub failure_reason: Option<String>,
  /// Visible steps in execution order.
  pub steps: Vec<ExecutedStep>,
  /// Result of the failure flow, when one was dispatched.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure_flow_state: Option<RunState>,
}

impl RunLog {
  pub const VERSION: u32 = 1;

  /// An in-progress log for `flow` processing `file`.
  pub fn started(flow: impl Into<String>, file: impl Into<String>, started_at: String) -> Self {
    Self {
      version: Self::VERSION,
      flow: flow.into(),
      file: file.into(),
      started_at,
      finished_at: None,
      final_state: None,
      failure_reason: None,
      steps: vec![],
      failure_flow_state: None,
    }
  }

  /// Fills in the outcome of a finished run.
  pub fn finish(&mut self, result: &FlowRunResult, finished_at: String) {
    self.finished_at = Some(finished_at);
    self.final_state = Some(result.state);
    self.failure_reason = result.failure_reason.clone();
    self.steps = result.executed_steps.clone();
  }
}
