//! Tests for `resolver`.

use serde_json::json;
use uuid::Uuid;

use crate::registry::Registry;
use crate::resolver::{ResolutionError, effective_model, resolve};
use crate::steps::{BasicPlugin, ResolvedStep};
use crate::types::{Flow, FlowKind, Part, StepResult, Variables};

fn registry(flow: Option<Flow>) -> Registry {
  let b = Registry::builder()
    .plugin(&BasicPlugin)
    .script("tag", "1");
  match flow {
    Some(f) => b.flow(f).build(),
    None => b.build(),
  }
}

#[test]
fn variables_override_model_by_uid_and_name() {
  let part = Part::new("Basic.Log")
    .with_name("Announce")
    .with_model("Message", "design")
    .with_model("Level", "info");
  let mut vars = Variables::new();
  vars.insert(format!("{}.Message", part.uid), "by uid");
  vars.insert("Announce.Level", "debug");
  vars.insert("Other.Level", "ignored");

  let model = effective_model(&part, &vars);
  assert_eq!(model.get("Message"), Some(&json!("by uid")));
  assert_eq!(model.get("Level"), Some(&json!("debug")));
  assert_eq!(model.len(), 2);
}

#[test]
fn standard_namespace_names_take_only_uid_overrides() {
  let part = Part::new("Basic.Log")
    .with_name("file")
    .with_model("Name", "design")
    .with_model("Message", "design");
  let mut vars = Variables::new();
  vars.insert("file.Name", "show.mkv");
  vars.insert(format!("{}.Message", part.uid), "by uid");

  let model = effective_model(&part, &vars);
  assert_eq!(model.get("Name"), Some(&json!("design")));
  assert_eq!(model.get("Message"), Some(&json!("by uid")));

  let command = Part::new("Basic.Log").with_name("executecommand").with_model("ExitCode", 0);
  let mut vars = Variables::new();
  vars.insert("ExecuteCommand.ExitCode", 7);
  assert_eq!(effective_model(&command, &vars).get("ExitCode"), Some(&json!(0)));
}

#[test]
fn native_part_resolves_through_registry() {
  let r = registry(None);
  let part = Part::new("Basic.Log");
  let resolved = resolve(&part, &Variables::new(), &r).unwrap();
  assert_eq!(resolved.kind(), "native");

  let unknown = Part::new("Basic.Unknown");
  assert_eq!(
    resolve(&unknown, &Variables::new(), &r).err(),
    Some(ResolutionError::ElementNotFound("Basic.Unknown".into()))
  );
}

#[test]
fn script_part_needs_registered_source() {
  let r = registry(None);
  assert_eq!(
    resolve(&Part::new("Script:tag"), &Variables::new(), &r)
      .unwrap()
      .kind(),
    "script"
  );
  assert_eq!(
    resolve(&Part::new("Script:missing"), &Variables::new(), &r).err(),
    Some(ResolutionError::ScriptNotFound("missing".into()))
  );
}

#[test]
fn sub_flow_part_expands_properties() {
  let sub = Flow::new("sub", FlowKind::SubFlow);
  let uid = sub.uid;
  let r = registry(Some(sub));
  let part = Part::new(format!("SubFlow:{}", uid))
    .with_model("Target", "{Base}/out")
    .with_model("Count", 3);
  let mut vars = Variables::new();
  vars.insert("Base", "/data");

  match resolve(&part, &vars, &r).unwrap() {
    ResolvedStep::SubFlow(s) => {
      assert_eq!(s.flow.uid, uid);
      assert_eq!(s.properties.get_str("Target").as_deref(), Some("/data/out"));
      assert_eq!(s.properties.get("Count"), Some(&json!(3)));
    }
    other => panic!("unexpected {}", other.kind()),
  }

  let missing = Uuid::new_v4();
  assert_eq!(
    resolve(&Part::new(format!("GotoFlow:{}", missing)), &vars, &r).err(),
    Some(ResolutionError::FlowNotFound(missing.to_string()))
  );
}

#[test]
fn output_marker_code_from_model_then_suffix() {
  let r = registry(None);
  let vars = Variables::new();
  let code = |part: Part| match resolve(&part, &vars, &r) {
    Ok(ResolvedStep::SubFlowOutput(code)) => Ok(code),
    Ok(other) => panic!("unexpected {}", other.kind()),
    Err(e) => Err(e),
  };

  assert_eq!(code(Part::new("SubFlowOutput3")), Ok(StepResult::Output(3)));
  assert_eq!(code(Part::new("SubFlowOutput")), Ok(StepResult::Output(1)));
  assert_eq!(
    code(Part::new("SubFlowOutput3").with_model("Output", "-1")),
    Ok(StepResult::Failure)
  );
  assert_eq!(
    code(Part::new("SubFlowOutput").with_model("Output", 150)),
    Err(ResolutionError::InvalidOutputCode(150))
  );
}

#[test]
fn output_marker_code_follows_variable_override() {
  let r = registry(None);
  let part = Part::new("SubFlowOutput2").with_name("Done");
  let mut vars = Variables::new();
  vars.insert(format!("{}.Output", part.uid), 4);
  assert!(matches!(
    resolve(&part, &vars, &r),
    Ok(ResolvedStep::SubFlowOutput(StepResult::Output(4)))
  ));

  let mut vars = Variables::new();
  vars.insert("Done.Output", "-1");
  assert!(matches!(
    resolve(&part, &vars, &r),
    Ok(ResolvedStep::SubFlowOutput(StepResult::Failure))
  ));
}

#[test]
fn input_marker_resolves() {
  let r = registry(None);
  assert_eq!(
    resolve(&Part::new("SubFlowInput"), &Variables::new(), &r)
      .unwrap()
      .kind(),
    "sub_flow_input"
  );
}
