//! Sets one variable for later steps.

use serde_json::Value;
use tracing::debug;

use super::{ModelBinder, NativeStep, Step};
use crate::context::ExecutionContext;
use crate::types::StepResult;

/// Sets `Variable` to `Value`; string values have `{placeholders}` expanded.
#[derive(Debug, Default)]
pub struct SetVariable {
  pub variable: String,
  pub value: Value,
}

impl NativeStep for SetVariable {
  const TYPE_NAME: &'static str = "Basic.SetVariable";

  fn bind(&mut self, binder: &mut ModelBinder<'_>) {
    binder
      .field("Variable", &mut self.variable)
      .field("Value", &mut self.value);
  }
}

impl Step for SetVariable {
  fn pre_execute(&mut self, ctx: &mut ExecutionContext) -> bool {
    if self.variable.trim().is_empty() {
      ctx.set_failure_reason("SetVariable: no variable name configured");
      return false;
    }
    true
  }

  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    let value = match &self.value {
      Value::String(s) => Value::String(ctx.variables.expand(s)),
      other => other.clone(),
    };
    debug!(variable = %self.variable, value = %value, "setting variable");
    ctx.variables.insert(self.variable.trim(), value);
    StepResult::SUCCESS
  }
}
