use std::collections::HashMap;
use std::path::PathBuf;

/// One schedulable unit of work, usually a single compiler invocation.
#[derive(Debug, Clone)]
pub struct BuildTask {
  /// Human-readable label used in logs.
  pub caption: String,
  /// Directory relative paths in the task's arguments resolve against.
  pub working_dir: PathBuf,
  /// When set, the task must never leave this machine.
  pub guaranteed_local: bool,
}

/// Toolchain environment a task runs under.
#[derive(Debug, Clone, Default)]
pub struct TaskEnvironment {
  pub variables: HashMap<String, String>,
}

/// The tool a task invokes.
#[derive(Debug, Clone)]
pub struct Tool {
  pub path: PathBuf,
}

impl Tool {
  /// The file name of the tool binary, lowercased for comparisons.
  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy().to_lowercase())
      .unwrap_or_default()
  }
}
