//! Tests for `DirectoryIterator`.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{DirectoryIterator, FilePattern, OUTPUT_NOTHING_TO_DO, OUTPUT_PROCESSED, Step};
use crate::context::{CancelSignal, ExecutionContext};
use crate::registry::{Plugin, Registry, StepRegistry};
use crate::steps::directory_iterator::enumerate_files;
use crate::types::{Flow, FlowKind, Part, StepResult};

type Seen = Arc<Mutex<Vec<String>>>;

/// Records each file name it sees; fails on the configured one.
struct Recorder {
  seen: Seen,
  reject: Option<String>,
}

impl Step for Recorder {
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    let name = ctx.variables.get_str("file.Name").unwrap_or_default();
    self.seen.lock().unwrap().push(name.clone());
    ctx.variables.insert("LastSeen", name.clone());
    if self.reject.as_deref() == Some(name.as_str()) {
      return ctx.fail(format!("recorder rejected {}", name));
    }
    StepResult::SUCCESS
  }
}

struct RecorderPlugin {
  seen: Seen,
  reject: Option<String>,
}

impl Plugin for RecorderPlugin {
  fn name(&self) -> &str {
    "recorder"
  }

  fn register(&self, steps: &mut StepRegistry) {
    let seen = Arc::clone(&self.seen);
    let reject = self.reject.clone();
    steps.register_factory(
      "Test.Recorder",
      Arc::new(move |_model| {
        Box::new(Recorder {
          seen: Arc::clone(&seen),
          reject: reject.clone(),
        }) as Box<dyn Step>
      }),
    );
  }
}

struct Setup {
  ctx: ExecutionContext,
  seen: Seen,
  progress: Arc<Mutex<Vec<f32>>>,
  step: DirectoryIterator,
}

fn setup(dir: &Path, reject: Option<&str>, cancel: CancelSignal) -> Setup {
  let seen: Seen = Arc::default();
  let flow = Flow::new("per-file", FlowKind::SubFlow).with_part(Part::new("Test.Recorder").entry());
  let flow_uid = flow.uid;
  let registry = Registry::builder()
    .plugin(&RecorderPlugin {
      seen: Arc::clone(&seen),
      reject: reject.map(String::from),
    })
    .flow(flow)
    .build();
  let progress: Arc<Mutex<Vec<f32>>> = Arc::default();
  let sink = Arc::clone(&progress);
  let ctx = ExecutionContext::builder(Arc::new(registry), dir.join("batch.txt"))
    .cancel_signal(cancel)
    .on_progress(move |p| sink.lock().unwrap().push(p))
    .build();
  Setup {
    ctx,
    seen,
    progress,
    step: DirectoryIterator {
      path: dir.to_string_lossy().into_owned(),
      pattern: String::new(),
      recursive: false,
      flow: Some(flow_uid),
    },
  }
}

fn touch(dir: &Path, name: &str) {
  fs::write(dir.join(name), b"x").unwrap();
}

#[test]
fn empty_directory_takes_nothing_to_do_output() {
  let dir = tempfile::tempdir().unwrap();
  let mut s = setup(dir.path(), None, CancelSignal::new());
  let r = s.step.execute(&mut s.ctx);
  assert_eq!(r, StepResult::Output(OUTPUT_NOTHING_TO_DO));
  assert!(s.seen.lock().unwrap().is_empty());
  assert!(s.progress.lock().unwrap().is_empty());
}

#[test]
fn every_file_runs_in_order_with_progress() {
  let dir = tempfile::tempdir().unwrap();
  for n in ["c.txt", "a.txt", "b.txt"] {
    touch(dir.path(), n);
  }
  let mut s = setup(dir.path(), None, CancelSignal::new());
  let r = s.step.execute(&mut s.ctx);
  assert_eq!(r, StepResult::Output(OUTPUT_PROCESSED));
  assert_eq!(*s.seen.lock().unwrap(), vec!["a.txt", "b.txt", "c.txt"]);

  let progress = s.progress.lock().unwrap().clone();
  assert_eq!(progress.len(), 3);
  assert!((progress[0] - 33.33).abs() < 0.1);
  assert!((progress[1] - 66.67).abs() < 0.1);
  assert!((progress[2] - 100.0).abs() < f32::EPSILON);
}

#[test]
fn files_do_not_leak_variables_into_parent() {
  let dir = tempfile::tempdir().unwrap();
  touch(dir.path(), "a.txt");
  let mut s = setup(dir.path(), None, CancelSignal::new());
  s.step.execute(&mut s.ctx);
  assert!(!s.ctx.variables.contains_key("LastSeen"));
  assert_eq!(s.ctx.variables.get_str("file.Name").as_deref(), Some("batch.txt"));
}

#[test]
fn pattern_filters_file_names() {
  let dir = tempfile::tempdir().unwrap();
  for n in ["a.mkv", "b.txt", "C.MKV"] {
    touch(dir.path(), n);
  }
  let mut s = setup(dir.path(), None, CancelSignal::new());
  s.step.pattern = "*.mkv".into();
  let r = s.step.execute(&mut s.ctx);
  assert_eq!(r, StepResult::Output(OUTPUT_PROCESSED));
  assert_eq!(*s.seen.lock().unwrap(), vec!["C.MKV", "a.mkv"]);
}

#[test]
fn sub_directories_only_when_recursive() {
  let dir = tempfile::tempdir().unwrap();
  touch(dir.path(), "top.txt");
  fs::create_dir(dir.path().join("nested")).unwrap();
  touch(&dir.path().join("nested"), "deep.txt");

  let flat = enumerate_files(dir.path(), &FilePattern::Any, false).unwrap();
  assert_eq!(flat, vec![dir.path().join("top.txt")]);

  let mut s = setup(dir.path(), None, CancelSignal::new());
  s.step.recursive = true;
  s.step.execute(&mut s.ctx);
  assert_eq!(*s.seen.lock().unwrap(), vec!["top.txt", "deep.txt"]);
}

#[cfg(unix)]
#[test]
fn recursive_scan_does_not_follow_directory_links() {
  let dir = tempfile::tempdir().unwrap();
  touch(dir.path(), "a.mkv");
  fs::create_dir(dir.path().join("nested")).unwrap();
  touch(&dir.path().join("nested"), "b.mkv");
  std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
  std::os::unix::fs::symlink(dir.path(), dir.path().join("nested").join("up")).unwrap();
  std::os::unix::fs::symlink(dir.path().join("a.mkv"), dir.path().join("alias.mkv")).unwrap();

  let found = enumerate_files(dir.path(), &FilePattern::Any, true).unwrap();
  assert_eq!(
    found,
    vec![
      dir.path().join("a.mkv"),
      dir.path().join("alias.mkv"),
      dir.path().join("nested").join("b.mkv"),
    ]
  );
}

#[test]
fn failing_file_aborts_iteration() {
  let dir = tempfile::tempdir().unwrap();
  for n in ["a.txt", "b.txt", "c.txt"] {
    touch(dir.path(), n);
  }
  let mut s = setup(dir.path(), Some("b.txt"), CancelSignal::new());
  let r = s.step.execute(&mut s.ctx);
  assert_eq!(r, StepResult::Failure);
  assert_eq!(*s.seen.lock().unwrap(), vec!["a.txt", "b.txt"]);
  assert_eq!(s.ctx.failure_reason(), Some("recorder rejected b.txt"));
  assert_eq!(s.progress.lock().unwrap().len(), 1);
}

#[test]
fn canceled_run_stops_before_first_file() {
  let dir = tempfile::tempdir().unwrap();
  touch(dir.path(), "a.txt");
  let cancel = CancelSignal::new();
  let mut s = setup(dir.path(), None, cancel.clone());
  cancel.cancel();
  assert_eq!(s.step.execute(&mut s.ctx), StepResult::Canceled);
  assert!(s.seen.lock().unwrap().is_empty());
}

#[test]
fn missing_directory_fails() {
  let dir = tempfile::tempdir().unwrap();
  let mut s = setup(&dir.path().join("gone"), None, CancelSignal::new());
  assert_eq!(s.step.execute(&mut s.ctx), StepResult::Failure);
  assert!(s.ctx.failure_reason().unwrap().starts_with("directory not found"));
}

#[test]
fn pre_check_requires_flow() {
  let dir = tempfile::tempdir().unwrap();
  let mut s = setup(dir.path(), None, CancelSignal::new());
  s.step.flow = None;
  assert!(!s.step.pre_execute(&mut s.ctx));
  assert_eq!(
    s.ctx.failure_reason(),
    Some("DirectoryIterator: no flow configured")
  );
}
