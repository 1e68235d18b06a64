//! A flow: the graph of parts one run walks.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Part, Variables};

/// What a flow is used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
  #[default]
  Normal,
  /// Run externally after another run fails.
  Failure,
  /// Only invoked from other flows.
  SubFlow,
}

impl fmt::Display for FlowKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FlowKind::Normal => write!(f, "normal"),
      FlowKind::Failure => write!(f, "failure"),
      FlowKind::SubFlow => write!(f, "sub_flow"),
    }
  }
}

/// Structural problems in a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
  #[error("flow '{0}' has no entry part")]
  NoEntryPart(String),
  #[error("flow '{flow}' has {count} entry parts")]
  MultipleEntryParts { flow: String, count: usize },
  #[error("flow '{flow}' has duplicate part {part}")]
  DuplicatePart { flow: String, part: Uuid },
  #[error("part {part} connects output {output} but declares {outputs} outputs")]
  OutputOutOfRange { part: Uuid, output: i32, outputs: u32 },
  #[error("part {part} connects to missing part {target}")]
  DanglingConnection { part: Uuid, target: Uuid },
}

/// Immutable-per-run description of one processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
  pub uid: Uuid,
  pub name: String,
  #[serde(default)]
  pub kind: FlowKind,
  /// Maximum node count used to derive the step ceiling; engine default when unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_nodes: Option<usize>,
  /// Variables available to every step in this flow.
  #[serde(default)]
  pub variables: Variables,
  #[serde(default)]
  pub parts: Vec<Part>,
}

impl Flow {
  pub fn new(name: impl Into<String>, kind: FlowKind) -> Self {
    Self {
      uid: Uuid::new_v4(),
      name: name.into(),
      kind,
      max_nodes: None,
      variables: Variables::new(),
      parts: vec![],
    }
  }

  pub fn with_part(mut self, part: Part) -> Self {
    self.parts.push(part);
    self
  }

  pub fn part(&self, uid: &Uuid) -> Option<&Part> {
    self.parts.iter().find(|p| &p.uid == uid)
  }

  /// The unique zero-input part.
  pub fn entry_part(&self) -> Result<&Part, GraphError> {
    let mut entries = self.parts.iter().filter(|p| p.is_entry());
    let first = entries
      .next()
      .ok_or_else(|| GraphError::NoEntryPart(self.name.clone()))?;
    let extra = entries.count();
    if extra > 0 {
      return Err(GraphError::MultipleEntryParts {
        flow: self.name.clone(),
        count: extra + 1,
      });
    }
    Ok(first)
  }

  /// Collects every structural problem; an empty list means the graph is well formed.
  pub fn validate(&self) -> Vec<GraphError> {
    let mut errors = vec![];
    if let Err(e) = self.entry_part() {
      errors.push(e);
    }
    let mut seen = HashSet::new();
    for p in &self.parts {
      if !seen.insert(p.uid) {
        errors.push(GraphError::DuplicatePart {
          flow: self.name.clone(),
          part: p.uid,
        });
      }
    }
    for p in &self.parts {
      for c in &p.output_connections {
        if c.output < 1 || c.output as u32 > p.outputs {
          errors.push(GraphError::OutputOutOfRange {
            part: p.uid,
            output: c.output,
            outputs: p.outputs,
          });
        }
      }
      for c in p.output_connections.iter().chain(p.error_connection.iter()) {
        if self.part(&c.target).is_none() {
          errors.push(GraphError::DanglingConnection {
            part: p.uid,
            target: c.target,
          });
        }
      }
    }
    errors
  }
}
