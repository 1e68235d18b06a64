//! Tests for `BasicPlugin`.

use std::sync::Arc;

use serde_json::json;

use super::BasicPlugin;
use crate::context::ExecutionContext;
use crate::registry::{Plugin, Registry, StepRegistry};
use crate::types::ConfigModel;

#[test]
fn registers_builtin_steps() {
  let mut steps = StepRegistry::default();
  BasicPlugin.register(&mut steps);
  for name in [
    "Basic.DirectoryIterator",
    "Basic.ExecuteCommand",
    "Basic.FailFlow",
    "Basic.Log",
    "Basic.SetVariable",
  ] {
    assert!(steps.contains(name), "{} not registered", name);
  }
  assert_eq!(steps.len(), 5);
  assert_eq!(BasicPlugin.name(), "basic");
}

#[test]
fn created_steps_are_bound_from_model() {
  let mut steps = StepRegistry::default();
  BasicPlugin.register(&mut steps);
  let mut model = ConfigModel::new();
  model.insert("Variable".into(), json!("Answer"));
  model.insert("Value".into(), json!(42));

  let mut step = steps.create("Basic.SetVariable", &model).unwrap();
  let mut ctx = ExecutionContext::builder(Arc::new(Registry::default()), "/tmp/x").build();
  assert!(step.pre_execute(&mut ctx));
  step.execute(&mut ctx);
  assert_eq!(ctx.variables.get("Answer"), Some(&json!(42)));
  assert!(steps.create("Basic.Nope", &model).is_none());
}
