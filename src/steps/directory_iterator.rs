//! Runs a sub-flow once per file found under a directory.
//!
//! Each file gets a forked context so working file and transient variables never
//! leak between files; cancellation, callbacks and the step ceiling stay shared.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{FilePattern, ModelBinder, NativeStep, Step};
use crate::context::ExecutionContext;
use crate::engine::{self, FlowExit};
use crate::types::StepResult;

/// Output when every matched file was processed.
pub const OUTPUT_PROCESSED: u32 = 1;
/// Output when no file matched.
pub const OUTPUT_NOTHING_TO_DO: u32 = 2;

#[derive(Debug, Default)]
pub struct DirectoryIterator {
  /// Directory to scan; placeholders are expanded.
  pub path: String,
  /// Preset (`images`, `videos`, `audio`), glob or regular expression.
  pub pattern: String,
  /// Descend into sub-directories.
  pub recursive: bool,
  /// Flow run for each file.
  pub flow: Option<Uuid>,
}

impl NativeStep for DirectoryIterator {
  const TYPE_NAME: &'static str = "Basic.DirectoryIterator";

  fn bind(&mut self, binder: &mut ModelBinder<'_>) {
    binder
      .field("Path", &mut self.path)
      .field("Pattern", &mut self.pattern)
      .field("Recursive", &mut self.recursive)
      .field("Flow", &mut self.flow);
  }
}

/// Matching files under `dir`, sorted by path within each directory level.
///
/// Symbolic links to files are listed; symbolic links to directories are never
/// descended into.
pub(crate) fn enumerate_files(
  dir: &Path,
  pattern: &FilePattern,
  recursive: bool,
) -> io::Result<Vec<PathBuf>> {
  let mut entries: Vec<(PathBuf, fs::FileType)> = fs::read_dir(dir)?
    .filter_map(|e| e.ok())
    .filter_map(|e| e.file_type().ok().map(|t| (e.path(), t)))
    .collect();
  entries.sort_by(|a, b| a.0.cmp(&b.0));

  let mut files = vec![];
  let mut sub_dirs = vec![];
  for (path, file_type) in entries {
    if file_type.is_dir() {
      sub_dirs.push(path);
      continue;
    }
    let is_file = file_type.is_file() || (file_type.is_symlink() && path.is_file());
    if is_file
      && path
        .file_name()
        .is_some_and(|n| pattern.matches(&n.to_string_lossy()))
    {
      files.push(path);
    }
  }
  if recursive {
    for sub in sub_dirs {
      match enumerate_files(&sub, pattern, true) {
        Ok(mut found) => files.append(&mut found),
        Err(e) => warn!(dir = %sub.display(), error = %e, "skipping unreadable directory"),
      }
    }
  }
  Ok(files)
}

impl Step for DirectoryIterator {
  fn pre_execute(&mut self, ctx: &mut ExecutionContext) -> bool {
    if self.path.trim().is_empty() {
      ctx.set_failure_reason("DirectoryIterator: no path configured");
      return false;
    }
    if self.flow.is_none() {
      ctx.set_failure_reason("DirectoryIterator: no flow configured");
      return false;
    }
    true
  }

  #[instrument(level = "trace", skip(self, ctx))]
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    let dir = PathBuf::from(ctx.variables.expand(self.path.trim()));
    if !dir.is_dir() {
      return ctx.fail(format!("directory not found: {}", dir.display()));
    }
    let pattern = match FilePattern::parse(&self.pattern) {
      Ok(p) => p,
      Err(e) => return ctx.fail(e.to_string()),
    };
    let Some(flow_uid) = self.flow else {
      return ctx.fail("DirectoryIterator: no flow configured");
    };
    let Some(flow) = ctx.registry().flow(&flow_uid) else {
      return ctx.fail(format!("flow {} not found", flow_uid));
    };
    let files = match enumerate_files(&dir, &pattern, self.recursive) {
      Ok(f) => f,
      Err(e) => return ctx.fail(format!("cannot read {}: {}", dir.display(), e)),
    };

    if files.is_empty() {
      info!(dir = %dir.display(), "no matching files");
      return StepResult::Output(OUTPUT_NOTHING_TO_DO);
    }

    let total = files.len();
    info!(dir = %dir.display(), files = total, flow = %flow.name, "iterating directory");
    for (i, file) in files.iter().enumerate() {
      if ctx.is_canceled() {
        return StepResult::Canceled;
      }
      let mut child = ctx.fork(file);
      child.depth = ctx.depth + 1;
      child.variables.merge(&flow.variables);

      match engine::execute_flow(flow.clone(), &mut child) {
        FlowExit::Completed
        | FlowExit::Returned(StepResult::Completed)
        | FlowExit::Returned(StepResult::SUCCESS) => {}
        FlowExit::Canceled | FlowExit::Returned(StepResult::Canceled) => {
          return StepResult::Canceled;
        }
        FlowExit::TerminalExit | FlowExit::Returned(StepResult::TerminalExit) => {
          ctx.adopt_failure(&mut child);
          return StepResult::TerminalExit;
        }
        other => {
          warn!(file = %file.display(), outcome = ?other, "file failed, aborting iteration");
          let fallback = format!("processing {} ended with {:?}", file.display(), other);
          ctx.adopt_failure(&mut child);
          if ctx.failure_reason().is_none() {
            ctx.set_failure_reason(fallback);
          }
          return StepResult::Failure;
        }
      }
      ctx.report_progress((i + 1) as f32 / total as f32 * 100.0);
    }
    StepResult::Output(OUTPUT_PROCESSED)
  }
}
