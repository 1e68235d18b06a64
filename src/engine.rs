//! Flow execution loop.
//!
//! Walks a flow from its unique entry part: resolve the part, run it, read the
//! result, follow the matching output connection (or the error connection on
//! failure) and repeat until no connection matches or the run stops. Sub-flows
//! recurse into the same loop; goto-flows replace the flow being walked.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::context::ExecutionContext;
use crate::resolver::resolve;
use crate::steps::{ResolvedStep, Step, SubFlowStep};
use crate::types::{ExecutedStep, Flow, FlowKind, FlowRunResult, RunState, StepResult};

/// How one walk of a flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowExit {
  /// No connection matched the last result.
  Completed,
  /// A sub-flow output marker reported this result.
  Returned(StepResult),
  Failed,
  Canceled,
  TerminalExit,
}

impl FlowExit {
  /// Result the calling part sees when this walk was a sub-flow call.
  pub fn as_step_result(&self) -> StepResult {
    match self {
      FlowExit::Completed => StepResult::SUCCESS,
      FlowExit::Returned(r) => *r,
      FlowExit::Failed => StepResult::Failure,
      FlowExit::Canceled => StepResult::Canceled,
      FlowExit::TerminalExit => StepResult::TerminalExit,
    }
  }

  /// Final state when this walk was the top-level run.
  pub fn run_state(&self) -> RunState {
    match self {
      FlowExit::Completed | FlowExit::Returned(StepResult::Output(_) | StepResult::Completed) => {
        RunState::Completed
      }
      FlowExit::Failed | FlowExit::Returned(StepResult::Failure) => RunState::Failed,
      FlowExit::Canceled | FlowExit::Returned(StepResult::Canceled) => RunState::Canceled,
      FlowExit::TerminalExit | FlowExit::Returned(StepResult::TerminalExit) => {
        RunState::TerminalExit
      }
    }
  }
}

/// Runs `flow` as a top-level run against the context's file.
///
/// Flow variables fill in keys the context does not already hold, so values seeded
/// by the caller win. The step ceiling for the whole run is derived from this flow.
#[instrument(level = "trace", skip_all, fields(flow = tracing::field::Empty))]
pub fn run_flow(flow: impl Into<Arc<Flow>>, ctx: &mut ExecutionContext) -> FlowRunResult {
  let flow = flow.into();
  tracing::Span::current().record("flow", flow.name.as_str());
  let ceiling = ctx.settings().step_ceiling(flow.max_nodes);
  ctx.set_step_ceiling(ceiling);
  for (k, v) in flow.variables.iter() {
    if !ctx.variables.contains_key(k) {
      ctx.variables.insert(k.clone(), v.clone());
    }
  }

  info!(flow = %flow.name, file = %ctx.working_file().display(), ceiling, "flow run starting");
  let exit = execute_flow(Arc::clone(&flow), ctx);
  let state = exit.run_state();

  let failure_reason = match state {
    RunState::Failed => Some(
      ctx
        .failure_reason()
        .map(String::from)
        .unwrap_or_else(|| format!("flow '{}' failed", flow.name)),
    ),
    RunState::TerminalExit => Some(
      ctx
        .failure_reason()
        .map(String::from)
        .unwrap_or_else(|| "run cannot continue".to_string()),
    ),
    RunState::Completed | RunState::Canceled => None,
  };
  let (failed_step, failed_flow) = if state.is_failure() {
    ctx.take_failed_location()
  } else {
    (None, None)
  };

  match state {
    RunState::Completed => info!(flow = %flow.name, steps = ctx.steps_executed(), "flow run completed"),
    RunState::Canceled => info!(flow = %flow.name, "flow run canceled"),
    RunState::Failed | RunState::TerminalExit => error!(
      flow = %flow.name,
      state = %state,
      step = failed_step.as_deref().unwrap_or(""),
      reason = failure_reason.as_deref().unwrap_or(""),
      "flow run failed"
    ),
  }

  FlowRunResult {
    state,
    failure_reason,
    executed_steps: ctx.executed_steps(),
    last_code: ctx.last_code(),
    failed_step,
    failed_flow,
    variables: ctx.variables.clone(),
  }
}

/// Deepest sub-flow or per-file nesting a run may reach. Each level recurses on
/// the native stack, so this stays well below what a worker thread can hold.
pub const MAX_FLOW_DEPTH: u32 = 32;

/// Runs the optional pre-check, then the step; `None` when the pre-check refused.
fn execute_unit(step: &mut dyn Step, ctx: &mut ExecutionContext) -> Option<StepResult> {
  if !step.pre_execute(ctx) {
    return None;
  }
  Some(step.execute(ctx))
}

/// Calls a sub-flow with the current context.
///
/// The sub-flow's declared variables and the caller's property map are merged in
/// before entry; those keys get the caller's values back afterwards.
fn run_sub_flow(sub: SubFlowStep, ctx: &mut ExecutionContext) -> StepResult {
  let saved: Vec<(String, Option<Value>)> = sub
    .flow
    .variables
    .iter()
    .chain(sub.properties.iter())
    .map(|(k, _)| (k.clone(), ctx.variables.get(k).cloned()))
    .collect();
  ctx.variables.merge(&sub.flow.variables);
  ctx.variables.merge(&sub.properties);

  debug!(flow = %sub.flow.name, depth = ctx.depth + 1, "entering sub-flow");
  ctx.depth += 1;
  let exit = execute_flow(Arc::clone(&sub.flow), ctx);
  ctx.depth -= 1;
  debug!(flow = %sub.flow.name, exit = ?exit, "left sub-flow");

  for (k, previous) in saved.into_iter().rev() {
    match previous {
      Some(v) => {
        ctx.variables.insert(k, v);
      }
      None => {
        ctx.variables.remove(&k);
      }
    }
  }
  exit.as_step_result()
}

fn fail_at(ctx: &mut ExecutionContext, step: &str, flow: &str, default_reason: String) {
  if ctx.failure_reason().is_none() {
    ctx.set_failure_reason(default_reason);
  }
  ctx.mark_failed_at(step, flow);
}

/// Walks `flow` from its entry part until it completes, returns through an output
/// marker, fails, is canceled or hits the step ceiling.
///
/// Directory iteration and other constructs that run flows per file call this
/// with a forked context.
pub fn execute_flow(flow: Arc<Flow>, ctx: &mut ExecutionContext) -> FlowExit {
  if ctx.depth > MAX_FLOW_DEPTH {
    error!(flow = %flow.name, depth = ctx.depth, "flow nesting limit reached");
    fail_at(
      ctx,
      "entry",
      &flow.name,
      format!(
        "too many nested sub-flows ({}) calling '{}'",
        ctx.depth, flow.name
      ),
    );
    return FlowExit::TerminalExit;
  }
  let mut flow = flow;
  let mut current = match flow.entry_part() {
    Ok(p) => p.uid,
    Err(e) => {
      error!(flow = %flow.name, error = %e, "cannot start flow");
      fail_at(ctx, "entry", &flow.name, e.to_string());
      return FlowExit::Failed;
    }
  };

  loop {
    if ctx.is_canceled() {
      info!(flow = %flow.name, "cancellation observed");
      return FlowExit::Canceled;
    }
    let Some(part) = flow.part(&current) else {
      error!(flow = %flow.name, part = %current, "part not found");
      fail_at(ctx, "unknown", &flow.name, format!("part {} not found", current));
      return FlowExit::Failed;
    };
    let name = part.display_name();

    let executed = ctx.count_step();
    if executed > ctx.step_ceiling() {
      let reason = format!(
        "too many steps executed ({}), flow '{}' may contain a loop",
        ctx.step_ceiling(),
        flow.name
      );
      error!(flow = %flow.name, step = %name, "{}", reason);
      ctx.set_failure_reason(reason);
      ctx.mark_failed_at(&name, &flow.name);
      return FlowExit::TerminalExit;
    }
    if flow.kind != FlowKind::Failure {
      ctx.clear_failure();
    }

    let exempt = part.step_ref().map(|r| r.is_exempt()).unwrap_or(false);
    let started = Instant::now();
    let result = match resolve(part, &ctx.variables, ctx.registry()) {
      Err(e) => {
        if ctx.is_canceled() {
          return FlowExit::Canceled;
        }
        warn!(flow = %flow.name, step = %name, error = %e, "cannot resolve step");
        ctx.set_failure_reason(e.to_string());
        StepResult::Failure
      }
      Ok(ResolvedStep::SubFlowOutput(r)) => {
        trace!(flow = %flow.name, result = %r, "sub-flow output reached");
        ctx.set_last_code(r.code());
        return FlowExit::Returned(r);
      }
      Ok(ResolvedStep::GotoFlow(goto)) => {
        info!(from = %flow.name, to = %goto.flow.name, "switching flow");
        let entry = match goto.flow.entry_part() {
          Ok(p) => p.uid,
          Err(e) => {
            fail_at(ctx, &name, &flow.name, e.to_string());
            return FlowExit::Failed;
          }
        };
        ctx.variables.merge(&goto.flow.variables);
        flow = goto.flow;
        current = entry;
        continue;
      }
      Ok(ResolvedStep::SubFlowInput) => StepResult::SUCCESS,
      Ok(ResolvedStep::SubFlow(sub)) => run_sub_flow(sub, ctx),
      Ok(ResolvedStep::Script(mut script)) => match execute_unit(&mut script, ctx) {
        Some(r) => r,
        None => {
          fail_at(ctx, &name, &flow.name, format!("pre-execute check failed for step '{}'", name));
          return FlowExit::Failed;
        }
      },
      Ok(ResolvedStep::Native(mut step)) => match execute_unit(step.as_mut(), ctx) {
        Some(r) => r,
        None => {
          fail_at(ctx, &name, &flow.name, format!("pre-execute check failed for step '{}'", name));
          return FlowExit::Failed;
        }
      },
    };

    ctx.set_last_code(result.code());
    if exempt {
      trace!(flow = %flow.name, step = %name, result = %result, "plumbing step done");
    } else {
      let number = ctx.next_visible_step();
      info!(
        step = number,
        depth = ctx.depth,
        result = %result,
        "{}{}",
        "  ".repeat(ctx.depth as usize),
        name
      );
      ctx.record(ExecutedStep {
        step: number,
        name: name.clone(),
        element: part.element.clone(),
        result_code: result.code(),
        duration_ms: started.elapsed().as_millis() as u64,
        depth: ctx.depth,
      });
    }

    let next = match result {
      StepResult::Canceled => {
        info!(flow = %flow.name, step = %name, "step canceled the run");
        return FlowExit::Canceled;
      }
      StepResult::TerminalExit => {
        fail_at(
          ctx,
          &name,
          &flow.name,
          format!("step '{}' signalled the run cannot continue", name),
        );
        return FlowExit::TerminalExit;
      }
      StepResult::Completed => return FlowExit::Completed,
      StepResult::Failure => match part.error_connection {
        Some(c) => {
          warn!(
            flow = %flow.name,
            step = %name,
            reason = ctx.failure_reason().unwrap_or(""),
            "step failed, following error connection"
          );
          c.target
        }
        None => {
          fail_at(ctx, &name, &flow.name, format!("step '{}' failed", name));
          return FlowExit::Failed;
        }
      },
      StepResult::Output(n) => match part.connection_for(n) {
        Some(c) => c.target,
        None => {
          debug!(flow = %flow.name, step = %name, output = n, "no connection, flow complete");
          return FlowExit::Completed;
        }
      },
    };

    if flow.part(&next).is_none() {
      warn!(flow = %flow.name, step = %name, target = %next, "connection points at a missing part");
      if result == StepResult::Failure {
        fail_at(ctx, &name, &flow.name, format!("step '{}' failed", name));
        return FlowExit::Failed;
      }
      return FlowExit::Completed;
    }
    current = next;
  }
}
