//! Executable units a part resolves to, and the built-in native steps.

mod binder;
mod directory_iterator;
#[cfg(test)]
mod directory_iterator_test;
mod execute_command;
#[cfg(test)]
mod execute_command_test;
mod fail_flow;
mod file_pattern;
mod log;
mod plugin;
#[cfg(test)]
mod plugin_test;
mod script;
mod set_variable;

use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::types::{Flow, StepResult, Variables};

pub(crate) use binder::convert as convert_model_value;
pub use binder::ModelBinder;
pub use directory_iterator::{DirectoryIterator, OUTPUT_NOTHING_TO_DO, OUTPUT_PROCESSED};
pub use execute_command::ExecuteCommand;
pub use fail_flow::FailFlow;
pub use file_pattern::{FilePattern, InvalidPattern};
pub use log::Log;
pub use plugin::BasicPlugin;
pub use script::ScriptStep;
pub use set_variable::SetVariable;

/// Capability every executable unit provides.
pub trait Step: Send {
  /// Optional gate run before [Step::execute]; `false` fails the run.
  fn pre_execute(&mut self, _ctx: &mut ExecutionContext) -> bool {
    true
  }

  /// Runs the step and returns the result that decides the next part.
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult;
}

/// A compiled step type that can be registered by name and configured from a part's model.
pub trait NativeStep: Step + Default {
  /// Fully-qualified type name parts refer to.
  const TYPE_NAME: &'static str;

  /// Copies configuration fields out of the model.
  fn bind(&mut self, binder: &mut ModelBinder<'_>);
}

/// Call into another flow with a property map seeding its variables.
pub struct SubFlowStep {
  pub flow: Arc<Flow>,
  pub properties: Variables,
}

/// Switch the run over to another flow; control does not come back.
pub struct GotoFlowStep {
  pub flow: Arc<Flow>,
}

/// What a part resolves to.
pub enum ResolvedStep {
  Native(Box<dyn Step>),
  Script(ScriptStep),
  SubFlow(SubFlowStep),
  GotoFlow(GotoFlowStep),
  /// Pass-through entry marker of a sub-flow.
  SubFlowInput,
  /// Exit marker reporting a fixed result to the calling flow.
  SubFlowOutput(StepResult),
}

impl ResolvedStep {
  /// Short kind name, for logging.
  pub fn kind(&self) -> &'static str {
    match self {
      ResolvedStep::Native(_) => "native",
      ResolvedStep::Script(_) => "script",
      ResolvedStep::SubFlow(_) => "sub_flow",
      ResolvedStep::GotoFlow(_) => "goto_flow",
      ResolvedStep::SubFlowInput => "sub_flow_input",
      ResolvedStep::SubFlowOutput(_) => "sub_flow_output",
    }
  }
}
