use depscan::PchUsage;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Which compiler front-end produced the response file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolArchitecture {
  #[default]
  Msvc,
  ClangCl,
}

/// Everything the engine needs to know about one compile invocation.
///
/// Produced by [`crate::ResponseFileParser`] only when both the input and
/// output file were present in the response file.
#[derive(Debug, Clone)]
pub struct CompileUnitDescriptor {
  /// Absolute path of the response file itself.
  pub response_file: PathBuf,
  /// The translation unit being compiled.
  pub input_file: PathBuf,
  /// The object file being produced (`/Fo`).
  pub output_file: PathBuf,
  /// Include search directories (`/I`, `/external:I`), in order.
  pub include_dirs: Vec<PathBuf>,
  /// Headers force-included ahead of the source (`/FI`).
  pub forced_includes: Vec<PathBuf>,
  /// Preprocessor definitions (`/D`), plus defines harvested from forced
  /// includes and the PCH source header.
  pub definitions: HashMap<String, String>,
  /// True when this unit creates the PCH (`/Yc`) rather than consuming it.
  pub is_creating_pch: bool,
  /// The PCH source header (`/Yu` or `/Yc`).
  pub pch_header: Option<PathBuf>,
  /// The compiled PCH artifact (`/Fp`).
  pub pch_cache_file: Option<PathBuf>,
  /// Dependency-info output (`/sourceDependencies`).
  pub source_dependencies: Option<PathBuf>,
  /// Cross-toolchain depfile output (`/clang:-MF`).
  pub clang_depfile: Option<PathBuf>,
  /// Compiler front-end this descriptor was parsed for.
  pub architecture: ToolArchitecture,
  /// Resolved header dependency set; empty when the unit was parsed as
  /// guaranteed-local.
  pub dependent_files: HashSet<PathBuf>,
}

impl CompileUnitDescriptor {
  /// How this unit uses a precompiled header, if at all.
  pub fn pch_usage(&self) -> Option<PchUsage> {
    self.pch_header.as_ref().map(|header| PchUsage {
      header: header.clone(),
      cache_file: self.pch_cache_file.clone(),
      is_creating: self.is_creating_pch,
    })
  }
}
