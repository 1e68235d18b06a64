//! Loading flow definitions (`*.json`) and script sources (`*.rhai`) from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{instrument, trace};

use crate::types::Flow;

/// Extension of flow definition files.
pub const FLOW_EXTENSION: &str = "json";
/// Extension of script source files.
pub const SCRIPT_EXTENSION: &str = "rhai";

#[derive(Debug, thiserror::Error)]
pub enum FlowLoadError {
  #[error("cannot read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("invalid flow definition {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

fn read(path: &Path) -> Result<String, FlowLoadError> {
  fs::read_to_string(path).map_err(|source| FlowLoadError::Io {
    path: path.to_path_buf(),
    source,
  })
}

/// Files in `dir` with extension `ext` (case-insensitive), sorted by path.
fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, FlowLoadError> {
  let entries = fs::read_dir(dir).map_err(|source| FlowLoadError::Io {
    path: dir.to_path_buf(),
    source,
  })?;
  let mut files: Vec<PathBuf> = entries
    .filter_map(|e| e.ok().map(|e| e.path()))
    .filter(|p| p.is_file())
    .filter(|p| {
      p.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
    })
    .collect();
  files.sort();
  Ok(files)
}

/// Parses one flow definition file.
#[instrument(level = "trace")]
pub fn load_flow(path: &Path) -> Result<Flow, FlowLoadError> {
  let text = read(path)?;
  serde_json::from_str(&text).map_err(|source| FlowLoadError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// Loads every `*.json` flow definition in `dir` (not recursive).
pub fn load_flows_dir(dir: &Path) -> Result<Vec<Flow>, FlowLoadError> {
  files_with_extension(dir, FLOW_EXTENSION)?
    .iter()
    .map(|p| {
      let flow = load_flow(p)?;
      trace!(path = %p.display(), flow = %flow.name, "flow loaded");
      Ok(flow)
    })
    .collect()
}

/// Loads every `*.rhai` script in `dir` as `(file stem, source)`.
pub fn load_scripts_dir(dir: &Path) -> Result<Vec<(String, String)>, FlowLoadError> {
  files_with_extension(dir, SCRIPT_EXTENSION)?
    .iter()
    .map(|p| {
      let name = p
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
      Ok((name, read(p)?))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::{FlowLoadError, load_flow, load_flows_dir, load_scripts_dir};
  use crate::types::{FlowKind, StepRef};

  const FLOW_JSON: &str = r#"{
    "uid": "6f1c1b0e-4b7a-4d1e-9a55-2f0c7f1d9a10",
    "name": "Movies",
    "kind": "failure",
    "max_nodes": 5,
    "variables": { "Quality": 22 },
    "parts": [
      {
        "uid": "0a2d6c0c-8a5e-4b43-9a3b-3c0a8f2e1d01",
        "name": "Announce",
        "element": "Basic.Log",
        "outputs": 1,
        "model": { "Message": "starting {file.Name}" }
      }
    ]
  }"#;

  #[test]
  fn parses_flow_definition() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("movies.json");
    std::fs::write(&path, FLOW_JSON).unwrap();

    let flow = load_flow(&path).expect("load");
    assert_eq!(flow.name, "Movies");
    assert_eq!(flow.kind, FlowKind::Failure);
    assert_eq!(flow.max_nodes, Some(5));
    let entry = flow.entry_part().expect("entry");
    assert_eq!(entry.inputs, 0);
    assert_eq!(entry.step_ref().unwrap(), StepRef::Native("Basic.Log".into()));
  }

  #[test]
  fn loads_only_matching_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("movies.json"), FLOW_JSON).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    std::fs::write(dir.path().join("tag.rhai"), "1").unwrap();
    std::fs::write(dir.path().join("Clean.RHAI"), "2").unwrap();

    assert_eq!(load_flows_dir(dir.path()).unwrap().len(), 1);
    let scripts = load_scripts_dir(dir.path()).unwrap();
    assert_eq!(
      scripts,
      vec![
        ("Clean".to_string(), "2".to_string()),
        ("tag".to_string(), "1".to_string())
      ]
    );
  }

  #[test]
  fn reports_bad_json_with_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{").unwrap();
    let err = load_flows_dir(dir.path()).unwrap_err();
    assert!(matches!(err, FlowLoadError::Parse { .. }));
    assert!(err.to_string().contains("broken.json"));
  }

  #[test]
  fn missing_dir_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = load_flows_dir(&dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, FlowLoadError::Io { .. }));
  }
}
