//! Local task execution.

use crate::dispatch::TaskExecutor;
use crate::error::ExecError;
use crate::reservation::{CoreHandle, CoreReservation};
use crate::task::{BuildTask, TaskEnvironment, Tool};
use async_trait::async_trait;
use hive_core::process::{LineSink, ProcessRequest, ProcessRunner};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Score returned for every task: the local executor is always a candidate,
/// so a fallback exists whenever a specialized executor bows out.
pub const LOCAL_BASELINE_SCORE: i32 = 100;

/// Runs tasks on this machine through the process capability.
pub struct LocalTaskExecutor {
  reservation: CoreReservation,
  runner: Arc<dyn ProcessRunner>,
}

impl LocalTaskExecutor {
  pub fn new(reservation: CoreReservation, runner: Arc<dyn ProcessRunner>) -> Self {
    Self { reservation, runner }
  }
}

#[async_trait]
impl TaskExecutor for LocalTaskExecutor {
  fn score(&self, _task: &BuildTask, _environment: &TaskEnvironment, _tool: &Tool, _arguments: &[String]) -> i32 {
    LOCAL_BASELINE_SCORE
  }

  async fn allocate_core(&self) -> Result<CoreHandle, ExecError> {
    self.reservation.allocate().await
  }

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
  ) -> Result<i32, ExecError> {
    // Task-specific variables override global ones.
    let mut merged = global_environment.clone();
    merged.extend(environment.variables.clone());

    debug!("{} starting on core {}", task.caption, core.id());

    let stdout: LineSink = {
      let caption = task.caption.clone();
      Arc::new(move |line: &str| {
        info!("{} {}", caption, line);
        on_stdout(line);
      })
    };
    let stderr: LineSink = {
      let caption = task.caption.clone();
      Arc::new(move |line: &str| {
        error!("{} {}", caption, line);
        on_stderr(line);
      })
    };

    let exit_code = self
      .runner
      .run(
        ProcessRequest {
          program: tool.path.clone(),
          arguments: arguments.to_vec(),
          environment: merged,
          working_dir: Some(task.working_dir.clone()),
        },
        stdout,
        stderr,
      )
      .await?;

    debug!("{} finished with exit code {}", task.caption, exit_code);
    // `core` drops here, releasing the slot on success and error alike.
    Ok(exit_code)
  }
}
