//! What a part's `element` designation refers to.

use std::fmt;

use uuid::Uuid;

const SCRIPT_PREFIX: &str = "Script:";
const SUB_FLOW_PREFIX: &str = "SubFlow:";
const GOTO_FLOW_PREFIX: &str = "GotoFlow:";
const SUB_FLOW_INPUT: &str = "SubFlowInput";
const SUB_FLOW_OUTPUT: &str = "SubFlowOutput";

/// Parsed form of a part's `element` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRef {
  /// Compiled step, by fully-qualified type name.
  Native(String),
  /// Interpreted script, by script name.
  Script(String),
  /// Call into another flow.
  SubFlow(Uuid),
  /// Switch to another flow without returning.
  GotoFlow(Uuid),
  /// Entry marker of a sub-flow.
  SubFlowInput,
  /// Exit marker of a sub-flow; carries the numeric suffix of its name if any.
  SubFlowOutput(Option<u32>),
}

/// Returned when a flow reference does not hold a valid uuid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid flow reference '{0}'")]
pub struct InvalidFlowRef(pub String);

impl StepRef {
  /// Parses an element designation such as `Script:tag`, `SubFlow:<uuid>` or `Basic.Log`.
  pub fn parse(element: &str) -> Result<Self, InvalidFlowRef> {
    let element = element.trim();
    if let Some(name) = element.strip_prefix(SCRIPT_PREFIX) {
      return Ok(StepRef::Script(name.trim().to_string()));
    }
    if let Some(id) = element.strip_prefix(SUB_FLOW_PREFIX) {
      return parse_uuid(id).map(StepRef::SubFlow);
    }
    if let Some(id) = element.strip_prefix(GOTO_FLOW_PREFIX) {
      return parse_uuid(id).map(StepRef::GotoFlow);
    }
    if element == SUB_FLOW_INPUT {
      return Ok(StepRef::SubFlowInput);
    }
    if let Some(suffix) = element.strip_prefix(SUB_FLOW_OUTPUT) {
      return Ok(StepRef::SubFlowOutput(suffix.parse().ok()));
    }
    Ok(StepRef::Native(element.to_string()))
  }

  /// Flow-boundary markers and flow dispatch parts are hidden from the visible step counter.
  pub fn is_exempt(&self) -> bool {
    !matches!(self, StepRef::Native(_) | StepRef::Script(_))
  }
}

fn parse_uuid(s: &str) -> Result<Uuid, InvalidFlowRef> {
  Uuid::parse_str(s.trim()).map_err(|_| InvalidFlowRef(s.to_string()))
}

impl fmt::Display for StepRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepRef::Native(name) => write!(f, "{}", name),
      StepRef::Script(name) => write!(f, "{}{}", SCRIPT_PREFIX, name),
      StepRef::SubFlow(uid) => write!(f, "{}{}", SUB_FLOW_PREFIX, uid),
      StepRef::GotoFlow(uid) => write!(f, "{}{}", GOTO_FLOW_PREFIX, uid),
      StepRef::SubFlowInput => write!(f, "{}", SUB_FLOW_INPUT),
      StepRef::SubFlowOutput(Some(n)) => write!(f, "{}{}", SUB_FLOW_OUTPUT, n),
      StepRef::SubFlowOutput(None) => write!(f, "{}", SUB_FLOW_OUTPUT),
    }
  }
}
