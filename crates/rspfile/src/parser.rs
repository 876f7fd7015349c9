//! Line-by-line response file parsing.

use crate::descriptor::{CompileUnitDescriptor, ToolArchitecture};
use crate::error::ParseError;
use depscan::ClosureResolver;
use hive_core::paths::make_absolute;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Parses compiler response files into compile-unit descriptors.
pub struct ResponseFileParser {
  resolver: Arc<ClosureResolver>,
}

impl ResponseFileParser {
  pub fn new(resolver: Arc<ClosureResolver>) -> Self {
    Self { resolver }
  }

  /// Parse a response file.
  ///
  /// Returns `Ok(None)` when the unit cannot be described well enough to
  /// remote - missing input or output, or a header graph the resolver
  /// refuses - which callers treat as "run locally". Only real failures
  /// (I/O on the response file, unexpected resolver errors) are `Err`.
  pub async fn parse(
    &self,
    response_file: &Path,
    working_dir: &Path,
    guaranteed_local: bool,
    architecture: ToolArchitecture,
  ) -> Result<Option<CompileUnitDescriptor>, ParseError> {
    let response_file = make_absolute(&response_file.to_string_lossy(), working_dir);
    let contents = tokio::fs::read_to_string(&response_file).await?;

    let mut input_file: Option<PathBuf> = None;
    let mut output_file: Option<PathBuf> = None;
    let mut include_dirs: Vec<PathBuf> = Vec::new();
    let mut forced_includes: Vec<PathBuf> = Vec::new();
    let mut definitions: HashMap<String, String> = HashMap::new();
    let mut is_creating_pch = false;
    let mut pch_header: Option<PathBuf> = None;
    let mut pch_cache_file: Option<PathBuf> = None;
    let mut source_dependencies: Option<PathBuf> = None;
    let mut clang_depfile: Option<PathBuf> = None;

    for line in contents.lines() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }

      if !line.starts_with('/') {
        // The input file; a later bare line overwrites an earlier one.
        input_file = Some(make_absolute(line, working_dir));
      } else if let Some(rest) = line.strip_prefix("/D") {
        let (name, value) = match rest.trim().split_once('=') {
          Some((name, value)) => (name.trim(), value.trim()),
          None => (rest.trim(), "1"),
        };
        if !name.is_empty() {
          definitions.insert(name.to_string(), value.to_string());
        }
      } else if let Some(rest) = strip_flag(line, "/FI") {
        let path = make_absolute(rest, working_dir);
        harvest_defines(&path, &mut definitions).await;
        forced_includes.push(path);
      } else if let Some(rest) = strip_flag(line, "/I").or_else(|| strip_flag(line, "/external:I")) {
        let dir = make_absolute(rest, working_dir);
        if !dir.is_dir() {
          debug!("Include directory {:?} does not exist", dir);
        }
        include_dirs.push(dir);
      } else if let Some(rest) = strip_flag(line, "/Yu") {
        pch_header = Some(make_absolute(rest, working_dir));
      } else if let Some(rest) = strip_flag(line, "/Yc") {
        let path = make_absolute(rest, working_dir);
        harvest_defines(&path, &mut definitions).await;
        pch_header = Some(path);
        is_creating_pch = true;
      } else if let Some(rest) = strip_flag(line, "/Fp") {
        pch_cache_file = Some(make_absolute(rest, working_dir));
      } else if let Some(rest) = strip_flag(line, "/Fo") {
        output_file = Some(make_absolute(rest, working_dir));
      } else if let Some(rest) = strip_flag(line, "/sourceDependencies ") {
        // Space-delimited only; variant spellings like
        // `/sourceDependencies:directives` are not depfile outputs.
        source_dependencies = Some(make_absolute(rest, working_dir));
      } else if let Some(rest) = strip_flag(line, "/clang:-MF") {
        clang_depfile = Some(make_absolute(rest, working_dir));
      }
      // Every other flag is irrelevant to dispatch and ignored.
    }

    let (Some(input_file), Some(output_file)) = (input_file, output_file) else {
      debug!("Response file {:?} is missing input or output; running locally", response_file);
      return Ok(None);
    };

    let dependent_files = if guaranteed_local {
      HashSet::new()
    } else {
      match self
        .resolve_dependencies(&input_file, &forced_includes, &include_dirs, &definitions)
        .await
      {
        Ok(files) => files,
        Err(e) if e.is_invalid_header_graph() => {
          warn!(
            "Unable to remote compile {:?}: the dependency resolver rejected its header graph: {}",
            input_file, e
          );
          return Ok(None);
        }
        Err(e) => return Err(e.into()),
      }
    };

    Ok(Some(CompileUnitDescriptor {
      response_file,
      input_file,
      output_file,
      include_dirs,
      forced_includes,
      definitions,
      is_creating_pch,
      pch_header,
      pch_cache_file,
      source_dependencies,
      clang_depfile,
      architecture,
      dependent_files,
    }))
  }

  /// Closure of the input plus each forced include; forced includes are
  /// compiled ahead of the source, so their headers travel too.
  async fn resolve_dependencies(
    &self,
    input_file: &Path,
    forced_includes: &[PathBuf],
    include_dirs: &[PathBuf],
    definitions: &HashMap<String, String>,
  ) -> Result<HashSet<PathBuf>, depscan::ScanError> {
    let mut files = self
      .resolver
      .process_root_file(input_file, include_dirs, &[], definitions)
      .await?;
    for forced in forced_includes {
      files.extend(
        self
          .resolver
          .process_root_file(forced, include_dirs, &[], definitions)
          .await?,
      );
    }
    Ok(files)
  }
}

/// Strip a flag prefix and return its trimmed argument, or `None` if the
/// line does not carry this flag.
fn strip_flag<'a>(line: &'a str, flag: &str) -> Option<&'a str> {
  let rest = line.strip_prefix(flag)?.trim();
  if rest.is_empty() { None } else { Some(rest) }
}

/// Pull `#define NAME VALUE` lines out of a header; the platform definition
/// the resolver needs usually lives in the forced-include header.
async fn harvest_defines(path: &Path, definitions: &mut HashMap<String, String>) {
  let contents = match tokio::fs::read_to_string(path).await {
    Ok(contents) => contents,
    Err(_) => {
      debug!("Cannot read {:?} to harvest defines", path);
      return;
    }
  };
  for line in contents.lines() {
    let Some(rest) = line.trim_start().strip_prefix("#define ") else {
      continue;
    };
    let mut parts = rest.trim().splitn(2, char::is_whitespace);
    if let Some(name) = parts.next().filter(|n| !n.is_empty()) {
      let value = parts.next().map(str::trim).unwrap_or("1");
      definitions.insert(name.to_string(), value.to_string());
    }
  }
}
