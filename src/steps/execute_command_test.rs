//! Tests for `ExecuteCommand`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use super::{ExecuteCommand, Step};
use crate::context::{ExecutionContext, RunSettings};
use crate::registry::Registry;
use crate::types::StepResult;

fn ctx() -> ExecutionContext {
  ExecutionContext::builder(Arc::new(Registry::default()), "/tmp/in.txt").build()
}

fn command(cmd: &str, args: &str) -> ExecuteCommand {
  ExecuteCommand {
    command: cmd.into(),
    arguments: args.into(),
  }
}

#[cfg(unix)]
#[test]
fn zero_exit_takes_first_output() {
  let mut c = ctx();
  c.variables.insert("Word", "hello");
  let r = command("echo", "{Word} world").execute(&mut c);
  assert_eq!(r, StepResult::Output(1));
  assert_eq!(c.variables.get("ExecuteCommand.ExitCode"), Some(&json!(0)));
  assert_eq!(
    c.variables.get_str("ExecuteCommand.Output").as_deref(),
    Some("hello world")
  );
}

#[cfg(unix)]
#[test]
fn non_zero_exit_takes_second_output() {
  let mut c = ctx();
  let r = command("false", "").execute(&mut c);
  assert_eq!(r, StepResult::Output(2));
  assert_eq!(c.variables.get("ExecuteCommand.ExitCode"), Some(&json!(1)));
}

#[cfg(unix)]
#[test]
fn configured_tool_name_resolves_to_its_path() {
  let mut tools = BTreeMap::new();
  tools.insert("greeter".to_string(), "echo".into());
  let stats: Arc<Mutex<Vec<String>>> = Arc::default();
  let sink = Arc::clone(&stats);
  let mut c = ExecutionContext::builder(Arc::new(Registry::default()), "/tmp/in.txt")
    .settings(RunSettings {
      tool_paths: tools,
      ..RunSettings::default()
    })
    .on_statistic(move |name, _| sink.lock().unwrap().push(name.to_string()))
    .build();
  let r = command("greeter", "hi").execute(&mut c);
  assert_eq!(r, StepResult::Output(1));
  assert_eq!(c.variables.get_str("ExecuteCommand.Output").as_deref(), Some("hi"));
  assert_eq!(*stats.lock().unwrap(), vec!["ExecuteCommand.Duration"]);
}

#[test]
fn missing_program_fails() {
  let mut c = ctx();
  let r = command("definitely-not-a-real-program-4711", "").execute(&mut c);
  assert_eq!(r, StepResult::Failure);
  assert!(c.failure_reason().unwrap().starts_with("failed to start"));
}

#[test]
fn pre_check_requires_command() {
  let mut c = ctx();
  assert!(!command("  ", "").pre_execute(&mut c));
  assert_eq!(c.failure_reason(), Some("ExecuteCommand: no command configured"));
}
