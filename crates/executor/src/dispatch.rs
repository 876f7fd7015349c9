//! Executor selection.
//!
//! Every registered executor bids on a task with [`TaskExecutor::score`]; the
//! dispatcher runs the highest bidder. Negative scores mean "cannot run this"
//! and are never selected. When a winner fails because the unit cannot be
//! safely remoted, the dispatcher retries the task on the next candidate
//! instead of failing the build.

use crate::error::ExecError;
use crate::reservation::CoreHandle;
use crate::task::{BuildTask, TaskEnvironment, Tool};
use async_trait::async_trait;
use hive_core::process::LineSink;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A strategy for running one task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
  /// Bid for the task. Higher wins among competing executors; a negative
  /// score means this executor cannot run the task at all.
  fn score(&self, task: &BuildTask, environment: &TaskEnvironment, tool: &Tool, arguments: &[String]) -> i32;

  /// Reserve an execution slot, suspending until one frees.
  async fn allocate_core(&self) -> Result<CoreHandle, ExecError>;

  /// Run the task on the reserved core and return the tool's exit code.
  /// Nonzero exit codes are values, not errors; the core is released on every
  /// exit path.
  #[allow(clippy::too_many_arguments)]
  async fn execute(
    &self,
    core: CoreHandle,
    task: &BuildTask,
    environment: &TaskEnvironment,
    tool: &Tool,
    arguments: &[String],
    global_environment: &HashMap<String, String>,
    on_stdout: LineSink,
    on_stderr: LineSink,
  ) -> Result<i32, ExecError>;
}

/// Ranks executors per task and runs the winner.
pub struct Dispatcher {
  executors: Vec<Arc<dyn TaskExecutor>>,
}

impl Dispatcher {
  pub fn new(executors: Vec<Arc<dyn TaskExecutor>>) -> Self {
    Self { executors }
  }

  /// Run `task` on the best-scoring executor willing to take it.
  #[allow(clippy::too_many_arguments)]
  pub async fn run_task(
    &self,
    task: &BuildTask,
    environment: &TaskEnvironment,
    tool: &Tool,
    arguments: &[String],
    global_environment: &HashMap<String, String>,
    on_stdout: LineSink,
    on_stderr: LineSink,
  ) -> Result<i32, ExecError> {
    let mut ranked: Vec<(i32, &Arc<dyn TaskExecutor>)> = self
      .executors
      .iter()
      .map(|executor| (executor.score(task, environment, tool, arguments), executor))
      .filter(|(score, _)| *score >= 0)
      .collect();
    ranked.sort_by_key(|(score, _)| Reverse(*score));

    if ranked.is_empty() {
      return Err(ExecError::NoCandidate(task.caption.clone()));
    }

    let mut last_unremotable = None;
    for (score, executor) in ranked {
      debug!("Dispatching {} to executor with score {}", task.caption, score);
      let core = executor.allocate_core().await?;
      match executor
        .execute(
          core,
          task,
          environment,
          tool,
          arguments,
          global_environment,
          on_stdout.clone(),
          on_stderr.clone(),
        )
        .await
      {
        Ok(exit_code) => return Ok(exit_code),
        Err(e) if e.is_unremotable() => {
          warn!("{} cannot be remoted ({}); trying the next executor", task.caption, e);
          last_unremotable = Some(e);
        }
        Err(e) => return Err(e),
      }
    }

    Err(last_unremotable.unwrap_or_else(|| ExecError::NoCandidate(task.caption.clone())))
  }
}
