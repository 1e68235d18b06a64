//! Step resolution: turns a part into a ready-to-run executable unit.
//!
//! Resolution is pure given the part, a variable snapshot and the registry; it
//! never mutates the graph.

use tracing::{instrument, trace};

use crate::registry::Registry;
use crate::steps::{GotoFlowStep, ResolvedStep, ScriptStep, SubFlowStep};
use crate::types::{ConfigModel, Part, StepRef, StepResult, Variables};

/// Model key an output marker reads its code from before falling back to its name suffix.
pub const OUTPUT_MODEL_KEY: &str = "Output";

/// Why a part could not be turned into an executable unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
  #[error("script '{0}' not found")]
  ScriptNotFound(String),
  #[error("flow '{0}' not found")]
  FlowNotFound(String),
  #[error("flow element '{0}' not found")]
  ElementNotFound(String),
  #[error("sub-flow output has invalid code {0}")]
  InvalidOutputCode(i64),
}

/// Variable namespaces filled in by the engine and built-in steps.
const RESERVED_NAMESPACES: [&str; 3] = ["file", "folder", "ExecuteCommand"];

/// The part's model with variable overrides applied.
///
/// A variable named `<part uid>.<Field>` or `<part name>.<Field>` replaces `Field`
/// in the model, so runtime variables win over design-time configuration.
/// Parts named after a standard variable namespace (`file`, `folder`,
/// `ExecuteCommand`) only take uid-keyed overrides.
pub fn effective_model(part: &Part, variables: &Variables) -> ConfigModel {
  let mut model = part.model.clone();
  let uid_prefix = format!("{}.", part.uid);
  let name_prefix = part
    .name
    .as_deref()
    .filter(|n| !n.is_empty())
    .filter(|n| {
      !RESERVED_NAMESPACES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(n))
    })
    .map(|n| format!("{}.", n));
  for (key, value) in variables.iter() {
    let field = key.strip_prefix(&uid_prefix).or_else(|| {
      name_prefix
        .as_deref()
        .and_then(|prefix| key.strip_prefix(prefix))
    });
    if let Some(field) = field.filter(|f| !f.is_empty()) {
      trace!(part = %part.uid, field, "model field overridden by variable");
      model.insert(field.to_string(), value.clone());
    }
  }
  model
}

/// Sub-flow property map: the model as variables, with string values expanded.
fn properties(model: &ConfigModel, variables: &Variables) -> Variables {
  model
    .iter()
    .map(|(k, v)| {
      let v = match v {
        serde_json::Value::String(s) => serde_json::Value::String(variables.expand(s)),
        other => other.clone(),
      };
      (k.clone(), v)
    })
    .collect()
}

fn output_code(model: &ConfigModel, suffix: Option<u32>) -> i64 {
  model
    .get(OUTPUT_MODEL_KEY)
    .and_then(|v| crate::steps::convert_model_value::<i64>(v).ok())
    .or(suffix.map(i64::from))
    .unwrap_or(1)
}

/// Resolves `part` into an executable unit.
#[instrument(level = "trace", skip(part, variables, registry), fields(part = %part.uid, element = %part.element))]
pub fn resolve(
  part: &Part,
  variables: &Variables,
  registry: &Registry,
) -> Result<ResolvedStep, ResolutionError> {
  let step_ref = part
    .step_ref()
    .map_err(|e| ResolutionError::FlowNotFound(e.0))?;
  match step_ref {
    StepRef::Script(name) => {
      let source = registry
        .script(&name)
        .ok_or_else(|| ResolutionError::ScriptNotFound(name.clone()))?;
      Ok(ResolvedStep::Script(ScriptStep::new(
        name,
        source,
        effective_model(part, variables),
      )))
    }
    StepRef::SubFlow(uid) => {
      let flow = registry
        .flow(&uid)
        .ok_or_else(|| ResolutionError::FlowNotFound(uid.to_string()))?;
      let model = effective_model(part, variables);
      Ok(ResolvedStep::SubFlow(SubFlowStep {
        flow,
        properties: properties(&model, variables),
      }))
    }
    StepRef::GotoFlow(uid) => {
      let flow = registry
        .flow(&uid)
        .ok_or_else(|| ResolutionError::FlowNotFound(uid.to_string()))?;
      Ok(ResolvedStep::GotoFlow(GotoFlowStep { flow }))
    }
    StepRef::SubFlowInput => Ok(ResolvedStep::SubFlowInput),
    StepRef::SubFlowOutput(suffix) => {
      let code = output_code(&effective_model(part, variables), suffix);
      StepResult::from_code(code)
        .map(ResolvedStep::SubFlowOutput)
        .map_err(|_| ResolutionError::InvalidOutputCode(code))
    }
    StepRef::Native(name) => {
      let model = effective_model(part, variables);
      registry
        .steps()
        .create(&name, &model)
        .map(ResolvedStep::Native)
        .ok_or(ResolutionError::ElementNotFound(name))
    }
  }
}
