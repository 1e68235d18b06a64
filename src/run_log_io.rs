//! Load and write run.log.json under a run directory.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::types::RunLog;

/// Default filename for the run log under a run directory.
pub const RUN_LOG_FILENAME: &str = "run.log.json";

/// Path of the run log inside `run_dir`.
pub fn run_log_path(run_dir: &Path) -> PathBuf {
  run_dir.join(RUN_LOG_FILENAME)
}

/// Loads a run log from `path`. Returns error if file is missing or invalid JSON.
#[instrument(level = "trace", skip(path))]
pub fn load_run_log(path: &Path) -> Result<RunLog, std::io::Error> {
  let bytes = std::fs::read(path)?;
  serde_json::from_slice(&bytes)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Writes `log` to `run.log.json` in `run_dir`, creating the directory if needed.
#[instrument(level = "trace", skip(run_dir, log))]
pub fn write_run_log(run_dir: &Path, log: &RunLog) -> Result<PathBuf, std::io::Error> {
  let json = serde_json::to_string_pretty(log)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  std::fs::create_dir_all(run_dir)?;
  let path = run_log_path(run_dir);
  std::fs::write(&path, json)?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::{RUN_LOG_FILENAME, load_run_log, write_run_log};
  use crate::types::{RunLog, RunState};

  #[test]
  fn write_then_load_keeps_outcome() {
    let mut log = RunLog::started("Movies", "/in/a.mkv", "2026-02-14T10:00:00Z".to_string());
    log.final_state = Some(RunState::Failed);
    log.failure_reason = Some("bad codec".to_string());
    log.failure_flow_state = Some(RunState::Completed);

    let dir = tempfile::tempdir().expect("tempdir");
    let run_dir = dir.path().join("runs").join("a");
    let path = write_run_log(&run_dir, &log).expect("write");
    assert_eq!(path, run_dir.join(RUN_LOG_FILENAME));

    let loaded = load_run_log(&path).expect("load");
    assert_eq!(loaded.flow, "Movies");
    assert_eq!(loaded.final_state, Some(RunState::Failed));
    assert_eq!(loaded.failure_reason.as_deref(), Some("bad codec"));
    assert_eq!(loaded.failure_flow_state, Some(RunState::Completed));
  }

  #[test]
  fn load_rejects_invalid_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(RUN_LOG_FILENAME);
    std::fs::write(&path, "{ not json").unwrap();
    let err = load_run_log(&path).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
  }
}
