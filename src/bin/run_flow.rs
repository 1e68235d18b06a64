//! CLI: run one flow against one file.
//!
//! Loads flow definitions and scripts from the configured directories, runs the
//! flow, dispatches the failure flow when the run fails and writes
//! `run.log.json` to the run directory.
//!
//! Usage: `run_flow [OPTIONS] <flow> <file>`
//! Example: run_flow --flows-dir ./flows "Encode Movies" /media/in/movie.mkv
//!
//! Exit codes: 0 completed, 1 failed, 2 canceled, 3 terminal exit.
//!
//! Set RUST_LOG=streamweave_flows=trace for TRACE-level span enter/exit and events.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use streamweave_flows::{
  BasicPlugin, CancelSignal, EngineConfig, Registry, RunOptions, RunState, find_flow, run_file,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

/// Run one flow against one file.
#[derive(Parser, Debug)]
#[command(name = "run_flow")]
#[command(
  after_help = r#"Environment variables (override the config file, overridden by flags):
  FLOWS_FLOWS_DIR              Directory of *.json flow definitions (default: flows).
  FLOWS_SCRIPTS_DIR            Directory of *.rhai scripts (default: scripts).
  FLOWS_RUN_DIR                Directory run.log.json is written to (default: .flows).
  FLOWS_MAX_NODES              Node count assumed when a flow sets none (default: 50).
  FLOWS_STEP_LIMIT_MULTIPLIER  Step ceiling = max nodes x multiplier (default: 10).

Examples:
  run_flow "Encode Movies" /media/in/movie.mkv
  run_flow --config engine.json --no-failure-flow 6f1c1b0e-4b7a-4d1e-9a55-2f0c7f1d9a10 ./in"#
)]
struct Args {
  /// JSON engine configuration file.
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Directory of flow definitions.
  #[arg(long, value_name = "DIR")]
  flows_dir: Option<PathBuf>,

  /// Directory of scripts.
  #[arg(long, value_name = "DIR")]
  scripts_dir: Option<PathBuf>,

  /// Directory for run.log.json.
  #[arg(long, value_name = "DIR")]
  run_dir: Option<PathBuf>,

  /// Do not run the failure flow when the run fails.
  #[arg(long)]
  no_failure_flow: bool,

  /// Flow uuid or name
  #[arg(value_name = "flow")]
  flow: String,

  /// File the flow processes
  #[arg(value_name = "file")]
  file: PathBuf,
}

fn exit_code(state: RunState) -> i32 {
  match state {
    RunState::Completed => 0,
    RunState::Failed => 1,
    RunState::Canceled => 2,
    RunState::TerminalExit => 3,
  }
}

fn fail(message: impl std::fmt::Display) -> ! {
  eprintln!("Error: {}", message);
  process::exit(1);
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .init();

  info!("run_flow starting");
  let args = Args::parse();

  let mut config = EngineConfig::resolve(args.config.as_deref()).unwrap_or_else(|e| fail(e));
  if let Some(dir) = args.flows_dir {
    config.flows_dir = dir;
  }
  if let Some(dir) = args.scripts_dir {
    config.scripts_dir = dir;
  }
  if let Some(dir) = args.run_dir {
    config.run_dir = dir;
  }
  info!(flows_dir = %config.flows_dir.display(), scripts_dir = %config.scripts_dir.display(), run_dir = %config.run_dir.display(), "options (config, env or flags)");

  let mut builder = Registry::builder()
    .plugin(&BasicPlugin)
    .flows_dir(&config.flows_dir)
    .unwrap_or_else(|e| fail(e));
  if config.scripts_dir.is_dir() {
    builder = builder
      .scripts_dir(&config.scripts_dir)
      .unwrap_or_else(|e| fail(e));
  }
  if let Some(uid) = config.failure_flow {
    builder = builder.failure_flow(uid);
  }
  let registry = Arc::new(builder.build());

  let flow = find_flow(&registry, &args.flow)
    .unwrap_or_else(|| fail(format!("flow '{}' not found", args.flow)));

  let cancel = CancelSignal::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      warn!("interrupt received, canceling run");
      on_interrupt.cancel();
    }
  });

  let options = RunOptions {
    run_dir: Some(config.run_dir.clone()),
    failure_flow: !args.no_failure_flow,
    cancel,
    settings: config.run_settings(),
    ..RunOptions::default()
  };
  let result = match run_file(registry, flow.uid, args.file, options).await {
    Ok(r) => r,
    Err(e) => {
      error!(error = %e, "run aborted");
      fail(e);
    }
  };

  println!("Run finished.");
  println!("  Flow: {}", flow.name);
  println!("  State: {}", result.state);
  if let Some(reason) = &result.failure_reason {
    println!("  Reason: {}", reason);
  }
  if let Some(step) = &result.failed_step {
    println!("  Failed step: {}", step);
  }
  for step in &result.executed_steps {
    println!("  {:>3} {} -> {}", step.step, step.indented_name(), step.result_code);
  }
  process::exit(exit_code(result.state));
}
