//! Result of executing one step: an output index or a reserved structural code.

use std::fmt;

/// Highest output index a part may declare.
pub const MAX_OUTPUTS: u32 = 99;

/// Raw code for [StepResult::Completed].
pub const CODE_COMPLETED: i32 = 0;
/// Raw code for [StepResult::Failure].
pub const CODE_FAILURE: i32 = -1;
/// Raw code for [StepResult::Canceled].
pub const CODE_CANCELED: i32 = -2;
/// Raw code for [StepResult::TerminalExit].
pub const CODE_TERMINAL_EXIT: i32 = -3;

/// Result of executing a single step.
///
/// Ordinary outputs live in `1..=MAX_OUTPUTS`; everything else is a reserved
/// structural code. Raw integers only appear at the scripting boundary and in
/// telemetry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepResult {
  /// Follow the output connection with this index.
  Output(u32),
  /// The step asked for the graph to end here.
  Completed,
  /// Route to the error connection, or fail the run.
  Failure,
  /// Stop immediately; the run was canceled.
  Canceled,
  /// Stop immediately; the run must not continue or be retried.
  TerminalExit,
}

/// A raw code outside both the output range and the reserved codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid result code {0}")]
pub struct InvalidResultCode(pub i64);

impl StepResult {
  /// Shorthand for output 1, the conventional "success" output.
  pub const SUCCESS: StepResult = StepResult::Output(1);

  /// Maps a raw integer code onto a result.
  pub fn from_code(code: i64) -> Result<Self, InvalidResultCode> {
    match code {
      0 => Ok(StepResult::Completed),
      -1 => Ok(StepResult::Failure),
      -2 => Ok(StepResult::Canceled),
      -3 => Ok(StepResult::TerminalExit),
      n if (1..=MAX_OUTPUTS as i64).contains(&n) => Ok(StepResult::Output(n as u32)),
      n => Err(InvalidResultCode(n)),
    }
  }

  /// Raw integer code, as recorded in telemetry.
  pub fn code(&self) -> i32 {
    match self {
      StepResult::Output(n) => *n as i32,
      StepResult::Completed => CODE_COMPLETED,
      StepResult::Failure => CODE_FAILURE,
      StepResult::Canceled => CODE_CANCELED,
      StepResult::TerminalExit => CODE_TERMINAL_EXIT,
    }
  }

  /// True for codes that stop the loop without consulting connections.
  pub fn is_stop(&self) -> bool {
    matches!(self, StepResult::Canceled | StepResult::TerminalExit)
  }
}

impl fmt::Display for StepResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StepResult::Output(n) => write!(f, "output {}", n),
      StepResult::Completed => write!(f, "completed"),
      StepResult::Failure => write!(f, "failure"),
      StepResult::Canceled => write!(f, "canceled"),
      StepResult::TerminalExit => write!(f, "terminal_exit"),
    }
  }
}
