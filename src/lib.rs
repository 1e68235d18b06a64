//! # streamweave-flows
//!
//! Graph interpreter for file-processing flows.
//!
//! ## Architecture
//!
//! A [Flow] is a directed graph of [Part]s. Running a flow against a file walks
//! the graph from its entry part: each part is resolved through the injected
//! [Registry] into a step (native, script, sub-flow, goto-flow or a sub-flow
//! marker), executed against the [ExecutionContext], and its [StepResult]
//! selects the next part.
//!
//! - `types`: graph model, step results and run results.
//! - `steps`: the step trait and the built-in steps, including the directory iterator.
//! - `resolver`: part → executable step.
//! - `engine`: the execution loop, sub-flow recursion and the step ceiling.
//! - `runner`: async worker entry point with failure-flow dispatch and the run log.

pub mod config;
pub mod context;
pub mod engine;
pub mod flow_io;
pub mod registry;
pub mod resolver;
#[cfg(test)]
mod resolver_test;
pub mod run_log_io;
pub mod runner;
pub mod steps;
pub mod types;

pub use config::{ConfigError, EngineConfig};
pub use context::{CancelSignal, ContextBuilder, ExecutionContext, RunSettings};
pub use engine::{FlowExit, execute_flow, run_flow};
pub use flow_io::FlowLoadError;
pub use registry::{Plugin, Registry, RegistryBuilder, StepRegistry};
pub use resolver::{ResolutionError, resolve};
pub use runner::{RunOptions, RunnerError, find_flow, run_file};
pub use steps::{BasicPlugin, ModelBinder, NativeStep, Step};
pub use types::{
  Connection, ExecutedStep, Flow, FlowKind, FlowRunResult, GraphError, Part, RunLog, RunState,
  StepResult, Variables,
};
