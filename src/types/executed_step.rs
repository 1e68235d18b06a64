//! Telemetry record for one executed step.

use serde::{Deserialize, Serialize};

/// One executed (visible) step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
  /// 1-based visible step number across the whole run.
  pub step: u32,
  /// Display name of the part.
  pub name: String,
  /// Element designation of the part.
  pub element: String,
  /// Raw result code (see [crate::types::StepResult::code]).
  pub result_code: i32,
  /// Execution time in milliseconds.
  pub duration_ms: u64,
  /// Sub-flow nesting depth; 0 for the top-level flow.
  pub depth: u32,
}

impl ExecutedStep {
  /// Display name indented two spaces per nesting level.
  pub fn indented_name(&self) -> String {
    format!("{}{}", "  ".repeat(self.depth as usize), self.name)
  }
}
