//! Worker-facing entry point: run one flow against one file.
//!
//! - [run_file]: run the engine on a blocking thread, dispatch the failure flow
//!   when the run failed, write `run.log.json`, return the top-level result.
//! - [find_flow]: look a flow up by uuid or by name.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::context::{CancelSignal, ExecutionContext, ProgressFn, RunSettings};
use crate::engine;
use crate::registry::Registry;
use crate::run_log_io::write_run_log;
use crate::types::{Flow, FlowRunResult, RunLog, RunState, Variables};

/// Options for [run_file].
#[derive(Clone, Default)]
pub struct RunOptions {
  /// If set, `run.log.json` is written here when the run ends.
  pub run_dir: Option<PathBuf>,
  /// Dispatch the registry's failure flow when the run fails.
  pub failure_flow: bool,
  pub cancel: CancelSignal,
  pub settings: RunSettings,
  pub progress: Option<ProgressFn>,
  /// Variables seeded before the flow's own.
  pub variables: Variables,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
  #[error("flow {0} not found")]
  FlowNotFound(String),
  #[error("cannot write run log: {0}")]
  RunLog(#[from] std::io::Error),
  #[error("engine task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

/// Flow by uuid, else by case-insensitive name.
pub fn find_flow(registry: &Registry, reference: &str) -> Option<Arc<Flow>> {
  match Uuid::parse_str(reference.trim()) {
    Ok(uid) => registry.flow(&uid),
    Err(_) => registry.flow_by_name(reference.trim()),
  }
}

fn now() -> String {
  chrono::Utc::now().to_rfc3339()
}

/// Runs `flow` against `file`; the main run's result is returned even when a
/// failure flow ran afterwards.
#[instrument(level = "trace", skip(registry, file, options), fields(file = %file.display()))]
pub async fn run_file(
  registry: Arc<Registry>,
  flow: Uuid,
  file: PathBuf,
  options: RunOptions,
) -> Result<FlowRunResult, RunnerError> {
  let flow = registry
    .flow(&flow)
    .ok_or_else(|| RunnerError::FlowNotFound(flow.to_string()))?;
  let mut log = RunLog::started(flow.name.clone(), file.display().to_string(), now());
  let run_dir = options.run_dir.clone();

  let (result, failure_state) =
    tokio::task::spawn_blocking(move || run_blocking(registry, flow, file, options)).await?;

  log.finish(&result, now());
  log.failure_flow_state = failure_state;
  if let Some(dir) = run_dir {
    let path = write_run_log(&dir, &log)?;
    info!(path = %path.display(), "run log written");
  }
  Ok(result)
}

fn run_blocking(
  registry: Arc<Registry>,
  flow: Arc<Flow>,
  file: PathBuf,
  options: RunOptions,
) -> (FlowRunResult, Option<RunState>) {
  let RunOptions {
    failure_flow,
    cancel,
    settings,
    progress,
    variables,
    ..
  } = options;
  let mut ctx = ExecutionContext::builder(Arc::clone(&registry), &file)
    .settings(settings.clone())
    .cancel_signal(cancel.clone())
    .progress_fn(progress)
    .variables(variables)
    .build();
  let result = engine::run_flow(flow, &mut ctx);

  if !failure_flow || !result.state.is_failure() {
    return (result, None);
  }
  let Some(handler) = registry.failure_flow() else {
    warn!("run failed and no failure flow is registered");
    return (result, None);
  };

  info!(flow = %handler.name, "dispatching failure flow");
  let mut failure_ctx = ExecutionContext::builder(registry, &file)
    .settings(settings)
    .cancel_signal(cancel)
    .variables(result.failure_flow_variables())
    .build();
  if let Some(reason) = &result.failure_reason {
    failure_ctx.set_failure_reason(reason.clone());
  }
  let handled = engine::run_flow(handler, &mut failure_ctx);
  if handled.state != RunState::Completed {
    warn!(state = %handled.state, reason = handled.failure_reason.as_deref().unwrap_or(""), "failure flow did not complete");
  }
  (result, Some(handled.state))
}
