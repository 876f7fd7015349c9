use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  /// The header graph cannot be processed safely enough to remote the unit.
  /// Callers degrade to local execution; this never fails a build.
  #[error("Cannot remote this header graph: {0}")]
  InvalidHeaderGraph(String),

  /// A coalesced computation on the same key failed; all waiters observe the
  /// same underlying error.
  #[error(transparent)]
  Coalesced(#[from] Arc<ScanError>),
}

impl ScanError {
  /// Whether this error (or the shared error it wraps) is the
  /// degrade-to-local classification.
  pub fn is_invalid_header_graph(&self) -> bool {
    match self {
      ScanError::InvalidHeaderGraph(_) => true,
      ScanError::Coalesced(inner) => inner.is_invalid_header_graph(),
      _ => false,
    }
  }
}
