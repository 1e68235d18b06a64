//! Best-effort binding of a part's configuration model onto typed step fields.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::types::{ConfigModel, value_to_text};

/// Reads named fields out of a [ConfigModel], converting each to the field's type.
///
/// Missing keys leave the field at its default; keys nobody asks for are ignored;
/// values that cannot be converted are logged and skipped.
pub struct ModelBinder<'a> {
  step: &'a str,
  model: &'a ConfigModel,
  skipped: Vec<String>,
}

/// Converts `value` to `T`, accepting strings that hold a JSON literal (`"5"`, `"true"`)
/// and scalars where a string is expected.
pub(crate) fn convert<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
  let direct = serde_json::from_value::<T>(value.clone());
  if direct.is_ok() {
    return direct;
  }
  match value {
    Value::String(s) => serde_json::from_str::<T>(s.trim()).or(direct),
    Value::Number(_) | Value::Bool(_) => {
      serde_json::from_value::<T>(Value::String(value_to_text(value))).or(direct)
    }
    _ => direct,
  }
}

impl<'a> ModelBinder<'a> {
  pub fn new(step: &'a str, model: &'a ConfigModel) -> Self {
    Self {
      step,
      model,
      skipped: vec![],
    }
  }

  /// Sets `slot` from `name` when present and convertible.
  pub fn field<T: DeserializeOwned>(&mut self, name: &str, slot: &mut T) -> &mut Self {
    let Some(value) = self.model.get(name) else {
      return self;
    };
    match convert::<T>(value) {
      Ok(v) => *slot = v,
      Err(e) => {
        warn!(step = self.step, field = name, error = %e, "skipping configuration field");
        self.skipped.push(name.to_string());
      }
    }
    self
  }

  /// Fields that were present but could not be converted.
  pub fn skipped(&self) -> &[String] {
    &self.skipped
  }
}
