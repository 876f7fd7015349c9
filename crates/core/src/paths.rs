//! Path handling helpers shared across the workspace.
//!
//! Compiler response files mix conventions: arguments may be quoted, paths may
//! use either separator, and Windows drive-rooted paths have to be recognized
//! even when the dispatcher itself runs elsewhere (the transfer set describes
//! files on the machine that produced the response file).

use crate::config::CaseSensitivity;
use std::path::{Path, PathBuf};

/// Strip a single layer of surrounding double quotes, if present.
pub fn strip_quotes(raw: &str) -> &str {
  let trimmed = raw.trim();
  if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
    &trimmed[1..trimmed.len() - 1]
  } else {
    trimmed
  }
}

/// Whether a path string is rooted under either platform convention.
///
/// `Path::is_absolute` alone would misclassify `C:\inc` on Unix hosts.
pub fn is_rooted(raw: &str) -> bool {
  if Path::new(raw).is_absolute() {
    return true;
  }
  let bytes = raw.as_bytes();
  bytes.len() >= 3
    && bytes[0].is_ascii_alphabetic()
    && bytes[1] == b':'
    && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Resolve a potentially quoted, potentially relative path against a working
/// directory. Already-rooted paths pass through unchanged.
pub fn make_absolute(raw: &str, working_dir: &Path) -> PathBuf {
  let unquoted = strip_quotes(raw);
  if is_rooted(unquoted) {
    PathBuf::from(unquoted)
  } else {
    working_dir.join(unquoted)
  }
}

/// A normalized cache key derived from an absolute path.
///
/// Separators are unified so that `a\b.h` and `a/b.h` collide, and casing is
/// folded or preserved according to the configured policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey(String);

impl PathKey {
  pub fn new(path: &Path, case: CaseSensitivity) -> Self {
    let mut key = path.to_string_lossy().replace('\\', "/");
    if case == CaseSensitivity::Fold {
      key = key.to_lowercase();
    }
    PathKey(key)
  }

  /// Wrap an already-normalized key string (e.g. one read back from the
  /// on-disk store, which only ever holds normalized keys).
  pub fn raw(key: &str) -> Self {
    PathKey(key.to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<PathKey> for String {
  fn from(key: PathKey) -> Self {
    key.0
  }
}
