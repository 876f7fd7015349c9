use chunkstream::StreamError;
use depscan::ScanError;
use hive_core::process::ProcessError;
use rspfile::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Process execution failed: {0}")]
  Process(#[from] ProcessError),

  #[error("Response file parsing failed: {0}")]
  Parse(#[from] ParseError),

  #[error("Dependency resolution failed: {0}")]
  Scan(#[from] ScanError),

  #[error("Blob streaming failed: {0}")]
  Stream(#[from] StreamError),

  #[error("Remote dispatch failed: {0}")]
  Transport(String),

  #[error("No executor is willing to run {0}")]
  NoCandidate(String),

  #[error("Core reservation pool is shut down")]
  PoolClosed,
}

impl ExecError {
  /// True when the failure means "this unit cannot be safely remoted" and the
  /// task should fall back to a local executor rather than failing the build.
  pub fn is_unremotable(&self) -> bool {
    match self {
      ExecError::Scan(e) => e.is_invalid_header_graph(),
      ExecError::Parse(ParseError::Scan(e)) => e.is_invalid_header_graph(),
      _ => false,
    }
  }
}
