//! Final state of a flow run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Final state of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  Completed,
  Failed,
  Canceled,
  /// Unrecoverable abort; the run must not be retried as-is.
  TerminalExit,
}

impl RunState {
  /// Whether the scheduler may treat this as an error worth retrying or alerting on.
  pub fn is_failure(&self) -> bool {
    matches!(self, RunState::Failed | RunState::TerminalExit)
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunState::Completed => write!(f, "completed"),
      RunState::Failed => write!(f, "failed"),
      RunState::Canceled => write!(f, "canceled"),
      RunState::TerminalExit => write!(f, "terminal_exit"),
    }
  }
}
