//! Dependency-closure resolution.
//!
//! Expands the per-file answers of [`ScanCache`] into the transitive set of
//! files a remote worker needs to reproduce a compilation. Include names are
//! resolved first-match-wins against the including file's directory, then the
//! explicit include directories, then the system include directories. Header
//! graphs routinely form diamonds, so a visited set prevents reprocessing.

use crate::cache::ScanCache;
use crate::error::ScanError;
use hive_core::paths::{PathKey, is_rooted};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Definition names that carry the platform for conditional-platform headers.
const OVERRIDE_PLATFORM_DEFINE: &str = "OVERRIDE_PLATFORM_HEADER_NAME";
const COMPILED_PLATFORM_DEFINE: &str = "UBT_COMPILED_PLATFORM";

/// How a compile unit uses a precompiled header.
#[derive(Debug, Clone)]
pub struct PchUsage {
  /// The header the PCH was (or will be) built from.
  pub header: PathBuf,
  /// The compiled PCH artifact on disk.
  pub cache_file: Option<PathBuf>,
  /// True when this unit creates the PCH rather than consuming it.
  pub is_creating: bool,
}

/// Expands per-file include scans into full dependency closures.
pub struct ClosureResolver {
  cache: Arc<ScanCache>,
}

impl ClosureResolver {
  pub fn new(cache: Arc<ScanCache>) -> Self {
    Self { cache }
  }

  pub fn cache(&self) -> &Arc<ScanCache> {
    &self.cache
  }

  /// The transitive set of absolute paths reachable from `root` through its
  /// includes, including `root` itself.
  pub async fn process_root_file(
    &self,
    root: &Path,
    include_dirs: &[PathBuf],
    system_include_dirs: &[PathBuf],
    definitions: &HashMap<String, String>,
  ) -> Result<HashSet<PathBuf>, ScanError> {
    if !is_rooted(&root.to_string_lossy()) {
      return Err(ScanError::InvalidHeaderGraph(format!(
        "Root file {root:?} must be an absolute path"
      )));
    }

    let mut closure = HashSet::new();
    let mut visited: HashSet<PathKey> = HashSet::new();
    let mut existence: HashMap<PathBuf, bool> = HashMap::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(current) = queue.pop_front() {
      let key = PathKey::new(&current, self.cache.case_sensitivity());
      if !visited.insert(key) {
        continue;
      }

      let scan = self.cache.scan_file(&current).await?;
      let including_dir = current.parent().map(Path::to_path_buf);
      closure.insert(current);

      let platform_names = expand_platform_includes(&scan.platform_includes, definitions)?;
      let names = scan
        .quoted_includes
        .iter()
        .chain(scan.angle_includes.iter())
        .chain(platform_names.iter());

      for name in names {
        match resolve_include(
          name,
          including_dir.as_deref(),
          include_dirs,
          system_include_dirs,
          &mut existence,
        ) {
          Some(resolved) => queue.push_back(resolved),
          None => trace!("Include {:?} not found on any search path, skipping", name),
        }
      }
    }

    Ok(closure)
  }

  /// The file set a remote worker needs for one compile unit.
  ///
  /// When the unit consumes a PCH, the headers already baked into the PCH are
  /// subtracted and the compiled PCH artifact is added back: the worker needs
  /// the blob, not the headers it was built from.
  pub async fn transfer_set(
    &self,
    input: &Path,
    include_dirs: &[PathBuf],
    system_include_dirs: &[PathBuf],
    definitions: &HashMap<String, String>,
    pch: Option<&PchUsage>,
  ) -> Result<HashSet<PathBuf>, ScanError> {
    let mut set = self
      .process_root_file(input, include_dirs, system_include_dirs, definitions)
      .await?;

    if let Some(pch) = pch {
      if pch.is_creating {
        set.insert(pch.header.clone());
      } else {
        let pch_closure = self
          .process_root_file(&pch.header, include_dirs, system_include_dirs, definitions)
          .await?;
        for file in &pch_closure {
          set.remove(file);
        }
        if let Some(cache_file) = &pch.cache_file {
          set.insert(cache_file.clone());
        }
      }
    }

    Ok(set)
  }
}

/// Expand `COMPILED_PLATFORM_HEADER(Name.h)` names to `Platform/PlatformName.h`
/// using the platform carried in the unit's definitions. A platform header
/// with no platform definition makes the graph unsafe to remote.
fn expand_platform_includes(
  names: &[String],
  definitions: &HashMap<String, String>,
) -> Result<Vec<String>, ScanError> {
  if names.is_empty() {
    return Ok(Vec::new());
  }
  let platform = definitions
    .get(OVERRIDE_PLATFORM_DEFINE)
    .or_else(|| definitions.get(COMPILED_PLATFORM_DEFINE))
    .ok_or_else(|| {
      ScanError::InvalidHeaderGraph(format!(
        "Platform-conditional include {:?} but neither {} nor {} is defined",
        names[0], OVERRIDE_PLATFORM_DEFINE, COMPILED_PLATFORM_DEFINE
      ))
    })?;
  Ok(names.iter().map(|name| format!("{platform}/{platform}{name}")).collect())
}

/// First match wins across (including dir, include dirs, system include dirs).
/// The existence memo spares repeated stats within one traversal.
fn resolve_include(
  name: &str,
  including_dir: Option<&Path>,
  include_dirs: &[PathBuf],
  system_include_dirs: &[PathBuf],
  existence: &mut HashMap<PathBuf, bool>,
) -> Option<PathBuf> {
  if is_rooted(name) {
    let candidate = PathBuf::from(name);
    return file_exists(existence, candidate.clone()).then_some(candidate);
  }

  let search = including_dir
    .into_iter()
    .chain(include_dirs.iter().map(PathBuf::as_path))
    .chain(system_include_dirs.iter().map(PathBuf::as_path));
  for dir in search {
    let candidate = dir.join(name);
    if file_exists(existence, candidate.clone()) {
      return Some(candidate);
    }
  }
  None
}

fn file_exists(existence: &mut HashMap<PathBuf, bool>, candidate: PathBuf) -> bool {
  *existence
    .entry(candidate)
    .or_insert_with_key(|path| path.is_file())
}
