//! Shared foundation for the Hivebuild build-acceleration engine.
//!
//! This crate provides:
//! - Configuration loading with user-level overrides
//! - Path handling helpers (quoted arguments, separator normalization)
//! - The process-execution capability consumed by the task executors

pub mod config;
pub mod paths;
pub mod process;

pub use config::{CaseSensitivity, Config};
pub use paths::{PathKey, is_rooted, make_absolute, strip_quotes};
pub use process::{LineSink, ProcessError, ProcessRequest, ProcessRunner, TokioProcessRunner};
