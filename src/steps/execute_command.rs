//! Runs an external command: output 1 on exit 0, output 2 otherwise.

use std::process::Command;
use std::time::Instant;

use tracing::{info, instrument, warn};

use super::{ModelBinder, NativeStep, Step};
use crate::context::ExecutionContext;
use crate::types::StepResult;

/// Runs `Command` with whitespace-separated `Arguments` (placeholders expanded).
///
/// A command naming a configured tool (e.g. `ffmpeg`) runs that tool's path.
/// Publishes `ExecuteCommand.ExitCode` and `ExecuteCommand.Output` (trimmed stdout).
#[derive(Debug, Default)]
pub struct ExecuteCommand {
  pub command: String,
  pub arguments: String,
}

impl NativeStep for ExecuteCommand {
  const TYPE_NAME: &'static str = "Basic.ExecuteCommand";

  fn bind(&mut self, binder: &mut ModelBinder<'_>) {
    binder
      .field("Command", &mut self.command)
      .field("Arguments", &mut self.arguments);
  }
}

impl Step for ExecuteCommand {
  fn pre_execute(&mut self, ctx: &mut ExecutionContext) -> bool {
    if self.command.trim().is_empty() {
      ctx.set_failure_reason("ExecuteCommand: no command configured");
      return false;
    }
    true
  }

  #[instrument(level = "trace", skip(self, ctx), fields(command = %self.command))]
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    let command = ctx.variables.expand(self.command.trim());
    let program = ctx
      .tool_path(&command)
      .map(|p| p.to_string_lossy().into_owned())
      .unwrap_or(command);
    let args: Vec<String> = ctx
      .variables
      .expand(&self.arguments)
      .split_whitespace()
      .map(String::from)
      .collect();

    info!(program = %program, args = ?args, "running");
    let started = Instant::now();
    let output = match Command::new(&program).args(&args).output() {
      Ok(o) => o,
      Err(e) => return ctx.fail(format!("failed to start '{}': {}", program, e)),
    };
    ctx.record_statistic(
      "ExecuteCommand.Duration",
      started.elapsed().as_millis() as u64,
    );

    let code = output.status.code().unwrap_or(-1);
    ctx.variables.insert("ExecuteCommand.ExitCode", code);
    ctx.variables.insert(
      "ExecuteCommand.Output",
      String::from_utf8_lossy(&output.stdout).trim().to_string(),
    );
    if output.status.success() {
      info!(program = %program, "finished: success");
      StepResult::Output(1)
    } else {
      warn!(program = %program, code, "finished: non-zero exit");
      StepResult::Output(2)
    }
  }
}
