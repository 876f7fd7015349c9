//! Shared fixtures for executor integration tests.

use async_trait::async_trait;
use depscan::{ClosureResolver, DiskStore, ScanCache, ScanError};
use executor::{BuildTask, CoreHandle, CoreReservation, ExecError, TaskEnvironment, TaskExecutor, Tool};
use hive_core::config::CaseSensitivity;
use hive_core::process::LineSink;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub fn build_resolver(store_dir: &Path) -> Arc<ClosureResolver> {
  let disk = Arc::new(DiskStore::open(store_dir).expect("Failed to open disk store"));
  let cache = Arc::new(ScanCache::with_store(disk, 1000, CaseSensitivity::Respect));
  Arc::new(ClosureResolver::new(cache))
}

#[allow(dead_code)]
pub fn collecting_sink() -> (LineSink, Arc<Mutex<Vec<String>>>) {
  let collected = Arc::new(Mutex::new(Vec::new()));
  let sink_target = collected.clone();
  let sink: LineSink = Arc::new(move |line: &str| {
    sink_target.lock().unwrap().push(line.to_string());
  });
  (sink, collected)
}

#[allow(dead_code)]
pub fn task(caption: &str, working_dir: &Path) -> BuildTask {
  BuildTask {
    caption: caption.to_string(),
    working_dir: working_dir.to_path_buf(),
    guaranteed_local: false,
  }
}

#[allow(dead_code)]
pub fn no_environment() -> (TaskEnvironment, HashMap<String, String>) {
  (TaskEnvironment::default(), HashMap::new())
}

/// Executor stub with a fixed score that records how often it ran.
pub struct StubExecutor {
  pub score: i32,
  pub exit_code: i32,
  pub fail_unremotable: bool,
  pub reservation: CoreReservation,
  pub executions: Arc<AtomicUsize>,
}

impl StubExecutor {
  #[allow(dead_code)]
  pub fn new(score: i32, exit_code: i32) -> Self {
    Self {
      score,
      exit_code,
      fail_unremotable: false,
      reservation: CoreReservation::new(2),
      executions: Arc::new(AtomicUsize::new(0)),
    }
  }

  #[allow(dead_code)]
  pub fn unremotable(score: i32) -> Self {
    Self {
      fail_unremotable: true,
      ..Self::new(score, 0)
    }
  }
}

#[async_trait]
impl TaskExecutor for StubExecutor {
  fn score(&self, _task: &BuildTask, _environment: &TaskEnvironment, _tool: &Tool, _arguments: &[String]) -> i32 {
    self.score
  }

  async fn allocate_core(&self) -> Result<CoreHandle, ExecError> {
    self.reservation.allocate().await
  }

  async fn execute(
    &self,
    _core: CoreHandle,
    _task: &BuildTask,
    _environment: &TaskEnvironment,
    _tool: &Tool,
    _arguments: &[String],
    _global_environment: &HashMap<String, String>,
    _on_stdout: LineSink,
    _on_stderr: LineSink,
  ) -> Result<i32, ExecError> {
    self.executions.fetch_add(1, Ordering::SeqCst);
    if self.fail_unremotable {
      return Err(ExecError::Scan(ScanError::InvalidHeaderGraph(
        "stub refuses this header graph".to_string(),
      )));
    }
    Ok(self.exit_code)
  }
}
