//! Tests for `StepRef`.

use uuid::Uuid;

use super::{InvalidFlowRef, StepRef};

#[test]
fn parse_native() {
  assert_eq!(
    StepRef::parse("Basic.Log"),
    Ok(StepRef::Native("Basic.Log".to_string()))
  );
}

#[test]
fn parse_script() {
  assert_eq!(
    StepRef::parse("Script:tag_file"),
    Ok(StepRef::Script("tag_file".to_string()))
  );
}

#[test]
fn parse_flow_refs() {
  let id = Uuid::new_v4();
  assert_eq!(
    StepRef::parse(&format!("SubFlow:{}", id)),
    Ok(StepRef::SubFlow(id))
  );
  assert_eq!(
    StepRef::parse(&format!("GotoFlow:{}", id)),
    Ok(StepRef::GotoFlow(id))
  );
}

#[test]
fn parse_bad_flow_ref() {
  assert_eq!(
    StepRef::parse("SubFlow:nope"),
    Err(InvalidFlowRef("nope".to_string()))
  );
}

#[test]
fn parse_markers() {
  assert_eq!(StepRef::parse("SubFlowInput"), Ok(StepRef::SubFlowInput));
  assert_eq!(StepRef::parse("SubFlowOutput"), Ok(StepRef::SubFlowOutput(None)));
  assert_eq!(StepRef::parse("SubFlowOutput2"), Ok(StepRef::SubFlowOutput(Some(2))));
}

#[test]
fn exempt_only_for_plumbing() {
  assert!(!StepRef::Native("x".into()).is_exempt());
  assert!(!StepRef::Script("x".into()).is_exempt());
  assert!(StepRef::SubFlowInput.is_exempt());
  assert!(StepRef::SubFlowOutput(Some(1)).is_exempt());
  assert!(StepRef::SubFlow(Uuid::nil()).is_exempt());
  assert!(StepRef::GotoFlow(Uuid::nil()).is_exempt());
}

#[test]
fn display_roundtrips_through_parse() {
  let id = Uuid::new_v4();
  for r in [
    StepRef::Native("Basic.Log".into()),
    StepRef::Script("s".into()),
    StepRef::SubFlow(id),
    StepRef::SubFlowOutput(Some(3)),
  ] {
    assert_eq!(StepRef::parse(&r.to_string()), Ok(r));
  }
}
