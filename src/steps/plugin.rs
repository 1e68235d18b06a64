//! The built-in plugin.

use super::{DirectoryIterator, ExecuteCommand, FailFlow, Log, SetVariable};
use crate::registry::{Plugin, StepRegistry};

/// Registers the steps every node ships with.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicPlugin;

impl Plugin for BasicPlugin {
  fn name(&self) -> &str {
    "basic"
  }

  fn register(&self, steps: &mut StepRegistry) {
    steps.register::<DirectoryIterator>();
    steps.register::<ExecuteCommand>();
    steps.register::<FailFlow>();
    steps.register::<Log>();
    steps.register::<SetVariable>();
  }
}
