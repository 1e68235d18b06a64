//! Fails the current step with a configured reason.

use super::{ModelBinder, NativeStep, Step};
use crate::context::ExecutionContext;
use crate::types::StepResult;

#[derive(Debug, Default)]
pub struct FailFlow {
  pub reason: String,
}

impl NativeStep for FailFlow {
  const TYPE_NAME: &'static str = "Basic.FailFlow";

  fn bind(&mut self, binder: &mut ModelBinder<'_>) {
    binder.field("Reason", &mut self.reason);
  }
}

impl Step for FailFlow {
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    let reason = ctx.variables.expand(&self.reason);
    if reason.trim().is_empty() {
      return ctx.fail("Flow failed");
    }
    ctx.fail(reason)
  }
}
