//! Process-execution capability.
//!
//! Spawning compilers is external to the engine core: executors consume this
//! trait, which provides spawn-with-environment, line-delimited output
//! callbacks, and an exit code. Cancellation is honored by dropping the
//! future; the default implementation kills the child on drop.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessError {
  #[error("Failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("I/O error reading process output: {0}")]
  Io(#[from] std::io::Error),
}

/// Callback invoked once per line of process output.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Everything needed to spawn one tool invocation.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
  pub program: PathBuf,
  pub arguments: Vec<String>,
  pub environment: HashMap<String, String>,
  pub working_dir: Option<PathBuf>,
}

/// The capability to run a process and observe its output line by line.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
  /// Spawn the process, stream stdout/stderr through the sinks, and return
  /// the exit code once the process terminates.
  async fn run(
    &self,
    request: ProcessRequest,
    on_stdout: LineSink,
    on_stderr: LineSink,
  ) -> Result<i32, ProcessError>;
}

/// Default runner backed by `tokio::process`.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
  async fn run(
    &self,
    request: ProcessRequest,
    on_stdout: LineSink,
    on_stderr: LineSink,
  ) -> Result<i32, ProcessError> {
    let mut command = Command::new(&request.program);
    command
      .args(&request.arguments)
      .envs(&request.environment)
      .stdout(std::process::Stdio::piped())
      .stderr(std::process::Stdio::piped())
      .kill_on_drop(true);
    if let Some(dir) = &request.working_dir {
      command.current_dir(dir);
    }

    debug!("Spawning {:?} with {} arguments", request.program, request.arguments.len());

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
      program: request.program.to_string_lossy().into_owned(),
      source,
    })?;

    // stdout/stderr handles are always present with piped stdio.
    let stdout = child.stdout.take().expect("child stdout piped");
    let stderr = child.stderr.take().expect("child stderr piped");

    let stdout_task = async move {
      let mut lines = BufReader::new(stdout).lines();
      while let Some(line) = lines.next_line().await? {
        on_stdout(&line);
      }
      Ok::<(), std::io::Error>(())
    };
    let stderr_task = async move {
      let mut lines = BufReader::new(stderr).lines();
      while let Some(line) = lines.next_line().await? {
        on_stderr(&line);
      }
      Ok::<(), std::io::Error>(())
    };

    let (stdout_result, stderr_result) = tokio::join!(stdout_task, stderr_task);
    stdout_result?;
    stderr_result?;

    let status = child.wait().await?;
    Ok(status.code().unwrap_or(-1))
  }
}
