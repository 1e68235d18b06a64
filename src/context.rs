//! Execution context: the mutable per-run state threaded through every step.
//!
//! A context owns the working file, the variable store and the failure reason.
//! Everything that must survive a [fork](ExecutionContext::fork) lives behind one
//! shared `Arc`: the registry, run settings, cancellation signal, callbacks, the
//! executed-step counter and the step recorder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, instrument};

use crate::registry::Registry;
use crate::types::{ExecutedStep, Variables};

/// Progress callback; receives a percentage in `0.0..=100.0`.
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;
/// Statistics callback; receives a statistic name and value.
pub type StatisticFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Caller-driven cancellation flag, cheap to clone and share across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_canceled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Static, per-node settings copied into every context of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
  /// Scratch directory steps may use.
  pub temp_dir: PathBuf,
  /// External tool locations by tool name (e.g. `ffmpeg`).
  pub tool_paths: BTreeMap<String, PathBuf>,
  pub is_linux: bool,
  pub is_windows: bool,
  pub is_docker: bool,
  /// Node count assumed for flows that do not set `max_nodes`.
  pub default_max_nodes: usize,
  /// Step ceiling = max nodes × this multiplier.
  pub step_limit_multiplier: usize,
}

impl Default for RunSettings {
  fn default() -> Self {
    Self {
      temp_dir: std::env::temp_dir(),
      tool_paths: BTreeMap::new(),
      is_linux: cfg!(target_os = "linux"),
      is_windows: cfg!(target_os = "windows"),
      is_docker: false,
      default_max_nodes: 50,
      step_limit_multiplier: 10,
    }
  }
}

impl RunSettings {
  /// Maximum number of executed parts allowed in one run of a flow.
  pub fn step_ceiling(&self, max_nodes: Option<usize>) -> usize {
    max_nodes
      .unwrap_or(self.default_max_nodes)
      .max(1)
      .saturating_mul(self.step_limit_multiplier.max(1))
  }
}

/// State shared by a context and all of its forks.
pub(crate) struct SharedState {
  registry: Arc<Registry>,
  settings: RunSettings,
  cancel: CancelSignal,
  progress: Option<ProgressFn>,
  statistic: Option<StatisticFn>,
  step_ceiling: AtomicUsize,
  steps_executed: AtomicUsize,
  visible_steps: AtomicU32,
  records: Mutex<Vec<ExecutedStep>>,
}

/// Mutable bag of per-run state threaded through every step call.
pub struct ExecutionContext {
  working_file: PathBuf,
  original_file: PathBuf,
  /// Variables visible to every step.
  pub variables: Variables,
  failure_reason: Option<String>,
  failed_step: Option<String>,
  failed_flow: Option<String>,
  last_code: Option<i32>,
  pub(crate) depth: u32,
  shared: Arc<SharedState>,
}

/// Builder for a top-level [ExecutionContext].
pub struct ContextBuilder {
  registry: Arc<Registry>,
  file: PathBuf,
  settings: RunSettings,
  cancel: CancelSignal,
  progress: Option<ProgressFn>,
  statistic: Option<StatisticFn>,
  variables: Variables,
}

impl ContextBuilder {
  pub fn settings(mut self, settings: RunSettings) -> Self {
    self.settings = settings;
    self
  }

  pub fn cancel_signal(mut self, cancel: CancelSignal) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn on_progress(mut self, f: impl Fn(f32) + Send + Sync + 'static) -> Self {
    self.progress = Some(Arc::new(f));
    self
  }

  pub fn progress_fn(mut self, f: Option<ProgressFn>) -> Self {
    self.progress = f;
    self
  }

  pub fn on_statistic(mut self, f: impl Fn(&str, &Value) + Send + Sync + 'static) -> Self {
    self.statistic = Some(Arc::new(f));
    self
  }

  /// Variables present before the flow's own variables are applied.
  pub fn variables(mut self, variables: Variables) -> Self {
    self.variables = variables;
    self
  }

  pub fn build(self) -> ExecutionContext {
    let shared = SharedState {
      registry: self.registry,
      settings: self.settings,
      cancel: self.cancel,
      progress: self.progress,
      statistic: self.statistic,
      step_ceiling: AtomicUsize::new(usize::MAX),
      steps_executed: AtomicUsize::new(0),
      visible_steps: AtomicU32::new(0),
      records: Mutex::new(vec![]),
    };
    let mut ctx = ExecutionContext {
      working_file: self.file.clone(),
      original_file: self.file,
      variables: self.variables,
      failure_reason: None,
      failed_step: None,
      failed_flow: None,
      last_code: None,
      depth: 0,
      shared: Arc::new(shared),
    };
    ctx.publish_original_file_variables();
    ctx.publish_working_file_variables();
    ctx
  }
}

fn file_name(p: &Path) -> String {
  p.file_name()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default()
}

fn file_stem(p: &Path) -> String {
  p.file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// Extension including the leading dot, or empty.
fn file_extension(p: &Path) -> String {
  p.extension()
    .map(|s| format!(".{}", s.to_string_lossy()))
    .unwrap_or_default()
}

impl ExecutionContext {
  pub fn builder(registry: Arc<Registry>, file: impl Into<PathBuf>) -> ContextBuilder {
    ContextBuilder {
      registry,
      file: file.into(),
      settings: RunSettings::default(),
      cancel: CancelSignal::new(),
      progress: None,
      statistic: None,
      variables: Variables::new(),
    }
  }

  /// Child context for processing `file` in isolation.
  ///
  /// The child gets its own working file, original file and a copy of the variable
  /// store; the registry, settings, callbacks, cancellation signal, step counter and
  /// recorder stay shared with the parent.
  #[instrument(level = "trace", skip(self))]
  pub fn fork(&self, file: &Path) -> ExecutionContext {
    let mut child = ExecutionContext {
      working_file: file.to_path_buf(),
      original_file: file.to_path_buf(),
      variables: self.variables.clone(),
      failure_reason: None,
      failed_step: None,
      failed_flow: None,
      last_code: None,
      depth: self.depth,
      shared: Arc::clone(&self.shared),
    };
    child.publish_original_file_variables();
    child.publish_working_file_variables();
    child
  }

  fn publish_original_file_variables(&mut self) {
    let p = self.original_file.clone();
    self
      .variables
      .insert("file.Orig.FullName", p.to_string_lossy().into_owned());
    self.variables.insert("file.Orig.Name", file_name(&p));
    self.variables.insert("file.Orig.NameNoExtension", file_stem(&p));
    self.variables.insert("file.Orig.Extension", file_extension(&p));
  }

  fn publish_working_file_variables(&mut self) {
    let p = self.working_file.clone();
    self
      .variables
      .insert("file.FullName", p.to_string_lossy().into_owned());
    self.variables.insert("file.Name", file_name(&p));
    self.variables.insert("file.NameNoExtension", file_stem(&p));
    self.variables.insert("file.Extension", file_extension(&p));
    let folder = p
      .parent()
      .map(|d| d.to_string_lossy().into_owned())
      .unwrap_or_default();
    self.variables.insert("folder.FullName", folder);
  }

  pub fn working_file(&self) -> &Path {
    &self.working_file
  }

  pub fn original_file(&self) -> &Path {
    &self.original_file
  }

  /// Replaces the working file (a step produced a new file) and republishes the file variables.
  pub fn set_working_file(&mut self, file: impl Into<PathBuf>) {
    self.working_file = file.into();
    debug!(file = %self.working_file.display(), "working file changed");
    self.publish_working_file_variables();
  }

  pub fn registry(&self) -> &Registry {
    &self.shared.registry
  }

  pub fn settings(&self) -> &RunSettings {
    &self.shared.settings
  }

  /// Location of an external tool configured for this node.
  pub fn tool_path(&self, tool: &str) -> Option<&Path> {
    self.shared.settings.tool_paths.get(tool).map(PathBuf::as_path)
  }

  pub fn cancel_signal(&self) -> &CancelSignal {
    &self.shared.cancel
  }

  pub fn is_canceled(&self) -> bool {
    self.shared.cancel.is_canceled()
  }

  pub fn failure_reason(&self) -> Option<&str> {
    self.failure_reason.as_deref()
  }

  pub fn set_failure_reason(&mut self, reason: impl Into<String>) {
    self.failure_reason = Some(reason.into());
  }

  /// Records `reason` and returns the failure result, for `return ctx.fail(..)` in steps.
  pub fn fail(&mut self, reason: impl Into<String>) -> crate::types::StepResult {
    self.set_failure_reason(reason);
    crate::types::StepResult::Failure
  }

  /// Clears the failure state at the start of a step.
  pub(crate) fn clear_failure(&mut self) {
    self.failure_reason = None;
    self.failed_step = None;
    self.failed_flow = None;
  }

  /// Remembers where the run failed; the innermost location wins.
  pub(crate) fn mark_failed_at(&mut self, step: &str, flow: &str) {
    if self.failed_step.is_none() {
      self.failed_step = Some(step.to_string());
      self.failed_flow = Some(flow.to_string());
    }
  }

  pub(crate) fn take_failed_location(&mut self) -> (Option<String>, Option<String>) {
    (self.failed_step.take(), self.failed_flow.take())
  }

  /// Copies a child's failure reason and location onto this context.
  pub(crate) fn adopt_failure(&mut self, child: &mut ExecutionContext) {
    if let Some(r) = child.failure_reason.take() {
      self.failure_reason = Some(r);
    }
    if let (Some(step), Some(flow)) = child.take_failed_location() {
      self.failed_step = Some(step);
      self.failed_flow = Some(flow);
    }
  }

  pub fn last_code(&self) -> Option<i32> {
    self.last_code
  }

  pub(crate) fn set_last_code(&mut self, code: i32) {
    self.last_code = Some(code);
  }

  /// Current sub-flow nesting depth.
  pub fn depth(&self) -> u32 {
    self.depth
  }

  pub fn report_progress(&self, percent: f32) {
    if let Some(f) = &self.shared.progress {
      f(percent.clamp(0.0, 100.0));
    }
  }

  pub fn record_statistic(&self, name: &str, value: impl Into<Value>) {
    if let Some(f) = &self.shared.statistic {
      f(name, &value.into());
    }
  }

  pub(crate) fn set_step_ceiling(&self, ceiling: usize) {
    self.shared.step_ceiling.store(ceiling, Ordering::SeqCst);
  }

  pub(crate) fn step_ceiling(&self) -> usize {
    self.shared.step_ceiling.load(Ordering::SeqCst)
  }

  /// Counts one executed part; returns the new total.
  pub(crate) fn count_step(&self) -> usize {
    self.shared.steps_executed.fetch_add(1, Ordering::SeqCst) + 1
  }

  /// Total parts executed so far, including hidden plumbing parts.
  pub fn steps_executed(&self) -> usize {
    self.shared.steps_executed.load(Ordering::SeqCst)
  }

  /// Next 1-based visible step number.
  pub(crate) fn next_visible_step(&self) -> u32 {
    self.shared.visible_steps.fetch_add(1, Ordering::SeqCst) + 1
  }

  pub(crate) fn record(&self, step: ExecutedStep) {
    self
      .shared
      .records
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(step);
  }

  /// Visible steps executed so far by this context and its forks.
  pub fn executed_steps(&self) -> Vec<ExecutedStep> {
    self
      .shared
      .records
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }
}
