//! A directed edge from one part's numbered output to another part.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed edge from one part's numbered output (or its error output) to another part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
  /// Source output index; `-1` on the error connection.
  pub output: i32,
  /// Target part uid.
  pub target: Uuid,
}

impl Connection {
  pub fn new(output: i32, target: Uuid) -> Self {
    Self { output, target }
  }

  /// An error connection to `target`.
  pub fn error(target: Uuid) -> Self {
    Self { output: -1, target }
  }
}
