//! Writes a message to the run log.

use tracing::info;

use super::{ModelBinder, NativeStep, Step};
use crate::context::ExecutionContext;
use crate::types::StepResult;

#[derive(Debug, Default)]
pub struct Log {
  pub message: String,
}

impl NativeStep for Log {
  const TYPE_NAME: &'static str = "Basic.Log";

  fn bind(&mut self, binder: &mut ModelBinder<'_>) {
    binder.field("Message", &mut self.message);
  }
}

impl Step for Log {
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    info!(target: "flow", "{}", ctx.variables.expand(&self.message));
    StepResult::SUCCESS
  }
}
