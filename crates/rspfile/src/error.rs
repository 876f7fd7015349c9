use depscan::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Dependency resolution failed: {0}")]
  Scan(#[from] ScanError),
}
