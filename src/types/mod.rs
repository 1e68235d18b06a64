//! Graph model and run-result types.
//!
//! A [Flow] is read-only for the duration of a run; [FlowRunResult] is what a run
//! reports back to its caller.

mod connection;
mod executed_step;
mod flow;
mod part;
mod run_log;
mod run_result;
mod run_state;
mod step_ref;
#[cfg(test)]
mod step_ref_test;
mod step_result;
mod variables;

pub use connection::Connection;
pub use executed_step::ExecutedStep;
pub use flow::{Flow, FlowKind, GraphError};
pub use part::{ConfigModel, Part};
pub use run_log::RunLog;
pub use run_result::FlowRunResult;
pub use run_state::RunState;
pub use step_ref::{InvalidFlowRef, StepRef};
pub use step_result::{
  CODE_CANCELED, CODE_COMPLETED, CODE_FAILURE, CODE_TERMINAL_EXIT, InvalidResultCode, MAX_OUTPUTS,
  StepResult,
};
pub(crate) use variables::value_to_text;
pub use variables::Variables;
