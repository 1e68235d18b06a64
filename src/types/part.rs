//! One node in a flow's graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Connection, InvalidFlowRef, StepRef};

/// User-supplied step parameters, keyed by field name.
pub type ConfigModel = BTreeMap<String, serde_json::Value>;

/// One node in a flow's graph; resolves to an executable unit at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
  pub uid: Uuid,
  /// User-visible name, also usable as a variable-override key.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  /// Element designation, see [StepRef::parse].
  pub element: String,
  /// Declared input count; `0` marks the entry part.
  #[serde(default)]
  pub inputs: u32,
  /// Declared output count.
  #[serde(default)]
  pub outputs: u32,
  #[serde(default)]
  pub output_connections: Vec<Connection>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_connection: Option<Connection>,
  #[serde(default)]
  pub model: ConfigModel,
}

impl Part {
  /// A part with one input and no connections.
  pub fn new(element: impl Into<String>) -> Self {
    Self {
      uid: Uuid::new_v4(),
      name: None,
      label: None,
      element: element.into(),
      inputs: 1,
      outputs: 1,
      output_connections: vec![],
      error_connection: None,
      model: ConfigModel::new(),
    }
  }

  pub fn step_ref(&self) -> Result<StepRef, InvalidFlowRef> {
    StepRef::parse(&self.element)
  }

  /// Label, else name, else the last segment of the element designation.
  pub fn display_name(&self) -> String {
    if let Some(l) = self.label.as_deref().filter(|l| !l.is_empty()) {
      return l.to_string();
    }
    if let Some(n) = self.name.as_deref().filter(|n| !n.is_empty()) {
      return n.to_string();
    }
    self
      .element
      .rsplit(['.', ':'])
      .next()
      .unwrap_or(&self.element)
      .to_string()
  }

  pub fn is_entry(&self) -> bool {
    self.inputs == 0
  }

  /// Output connection for the given index, if any.
  pub fn connection_for(&self, output: u32) -> Option<&Connection> {
    self
      .output_connections
      .iter()
      .find(|c| c.output == output as i32)
  }

  pub fn with_uid(mut self, uid: Uuid) -> Self {
    self.uid = uid;
    self
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Marks this part as the flow's entry point.
  pub fn entry(mut self) -> Self {
    self.inputs = 0;
    self
  }

  pub fn with_outputs(mut self, outputs: u32) -> Self {
    self.outputs = outputs;
    self
  }

  pub fn connect(mut self, output: u32, target: Uuid) -> Self {
    self.output_connections.push(Connection::new(output as i32, target));
    if self.outputs < output {
      self.outputs = output;
    }
    self
  }

  pub fn on_error(mut self, target: Uuid) -> Self {
    self.error_connection = Some(Connection::error(target));
    self
  }

  pub fn with_model(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    self.model.insert(key.into(), value.into());
    self
  }
}
