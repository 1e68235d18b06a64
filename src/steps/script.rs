//! Interpreted script steps, evaluated with `rhai`.
//!
//! The scope exposes:
//! - `Variables`: the run's variables as a map; writes are copied back after the run.
//! - `WorkingFile`, `OriginalFile`: paths as strings.
//! - `Model`: the part's configuration model.
//!
//! Registered functions: `log(msg)`, `fail(reason)` (returns the failure code),
//! `set_working_file(path)`. The script's final value is the raw result code.
//! A canceled run stops the script between operations.

use std::sync::{Arc, Mutex};

use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::Step;
use crate::context::{CancelSignal, ExecutionContext};
use crate::types::{CODE_FAILURE, ConfigModel, StepResult};

/// Values a script hands back through registered functions.
#[derive(Default)]
struct ScriptEffects {
  failure_reason: Option<String>,
  working_file: Option<String>,
}

/// A script loaded by name, carrying the part's configuration model.
pub struct ScriptStep {
  pub name: String,
  pub source: Arc<str>,
  pub model: ConfigModel,
}

fn to_dynamic(value: &Value) -> Dynamic {
  rhai::serde::to_dynamic(value).unwrap_or(Dynamic::UNIT)
}

fn script_engine(name: &str, effects: Arc<Mutex<ScriptEffects>>, cancel: CancelSignal) -> Engine {
  let mut engine = Engine::new();
  engine.on_progress(move |_| cancel.is_canceled().then(|| Dynamic::from("canceled")));

  let log_name = name.to_string();
  engine.register_fn("log", move |msg: &str| {
    info!(target: "script", script = %log_name, "{}", msg);
  });

  let fail_effects = Arc::clone(&effects);
  engine.register_fn("fail", move |reason: &str| -> i64 {
    if let Ok(mut e) = fail_effects.lock() {
      e.failure_reason = Some(reason.to_string());
    }
    CODE_FAILURE as i64
  });

  engine.register_fn("set_working_file", move |path: &str| {
    if let Ok(mut e) = effects.lock() {
      e.working_file = Some(path.to_string());
    }
  });

  engine
}

impl ScriptStep {
  pub fn new(name: impl Into<String>, source: Arc<str>, model: ConfigModel) -> Self {
    Self {
      name: name.into(),
      source,
      model,
    }
  }

  fn variables_value(ctx: &ExecutionContext) -> Value {
    Value::Object(
      ctx
        .variables
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }

  fn model_value(&self) -> Value {
    Value::Object(
      self
        .model
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    )
  }

  /// Copies the script's `Variables` map back onto the context; keys the script
  /// removed from the map are removed from the run as well.
  fn copy_back_variables(scope: &Scope<'_>, ctx: &mut ExecutionContext) {
    let Some(map) = scope.get_value::<rhai::Map>("Variables") else {
      return;
    };
    let removed: Vec<String> = ctx
      .variables
      .iter()
      .map(|(k, _)| k.clone())
      .filter(|k| !map.contains_key(k.as_str()))
      .collect();
    for k in removed {
      ctx.variables.remove(&k);
    }
    for (k, v) in map {
      match rhai::serde::from_dynamic::<Value>(&v) {
        Ok(value) => {
          ctx.variables.insert(k.to_string(), value);
        }
        Err(e) => warn!(variable = %k, error = %e, "script variable not representable, skipped"),
      }
    }
  }
}

impl Step for ScriptStep {
  #[instrument(level = "trace", skip(self, ctx), fields(script = %self.name))]
  fn execute(&mut self, ctx: &mut ExecutionContext) -> StepResult {
    let effects = Arc::new(Mutex::new(ScriptEffects::default()));
    let engine = script_engine(&self.name, Arc::clone(&effects), ctx.cancel_signal().clone());

    let mut scope = Scope::new();
    scope.push_dynamic("Variables", to_dynamic(&Self::variables_value(ctx)));
    scope.push(
      "WorkingFile",
      ctx.working_file().to_string_lossy().into_owned(),
    );
    scope.push(
      "OriginalFile",
      ctx.original_file().to_string_lossy().into_owned(),
    );
    scope.push_dynamic("Model", to_dynamic(&self.model_value()));

    let outcome = engine.eval_with_scope::<Dynamic>(&mut scope, &self.source);
    if let Err(e) = &outcome {
      if matches!(**e, EvalAltResult::ErrorTerminated(..)) {
        info!(script = %self.name, "script stopped by cancellation");
        return StepResult::Canceled;
      }
    }
    Self::copy_back_variables(&scope, ctx);

    let effects = match effects.lock() {
      Ok(mut e) => std::mem::take(&mut *e),
      Err(_) => ScriptEffects::default(),
    };
    if let Some(file) = effects.working_file {
      ctx.set_working_file(file);
    }
    if let Some(reason) = effects.failure_reason {
      ctx.set_failure_reason(reason);
    }

    let value = match outcome {
      Ok(v) => v,
      Err(e) => return ctx.fail(format!("script '{}' failed: {}", self.name, e)),
    };
    let Ok(code) = value.as_int() else {
      return ctx.fail(format!(
        "script '{}' must return an integer result code, got {}",
        self.name,
        value.type_name()
      ));
    };
    match StepResult::from_code(code) {
      Ok(r) => r,
      Err(e) => ctx.fail(format!("{} from script '{}'", e, self.name)),
    }
  }
}
