//! Single-file preprocessor directive scanning.
//!
//! This is deliberately not a C preprocessor: no macro expansion, no
//! conditional evaluation. It extracts `#include` directives line by line and
//! classifies them; everything else in the file is ignored.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// The platform-conditional include wrapper used by the Unreal toolchain.
/// The wrapped name is recorded as-is; expansion happens at resolution time
/// when the platform definitions are known.
const PLATFORM_HEADER_WRAPPER: &str = "COMPILED_PLATFORM_HEADER(";

/// The scanned includes of one file, fingerprinted by modification time.
///
/// Staleness is judged solely by the `ticks` fingerprint, never by content
/// hash. That trades a sliver of precision (mtime-preserving edits go
/// unnoticed) for never reading file contents on a warm build.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanResult {
  /// Last-write fingerprint: 100ns intervals since the Unix epoch.
  pub ticks: u64,
  /// Includes written as `#include "name"`.
  pub quoted_includes: Vec<String>,
  /// Includes written as `#include <name>`.
  pub angle_includes: Vec<String>,
  /// Names wrapped in the platform-conditional macro, unexpanded.
  pub platform_includes: Vec<String>,
}

impl ScanResult {
  /// Serialize into the fixed on-disk record layout: a little-endian u64
  /// fingerprint followed by three length-prefixed string lists (u32 count,
  /// then u32 byte length + UTF-8 per entry).
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&self.ticks.to_le_bytes());
    for list in [&self.quoted_includes, &self.angle_includes, &self.platform_includes] {
      out.extend_from_slice(&(list.len() as u32).to_le_bytes());
      for entry in list {
        out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        out.extend_from_slice(entry.as_bytes());
      }
    }
    out
  }

  /// Deserialize from the on-disk record layout. Returns `None` for any
  /// malformed input; callers treat that as a cache miss.
  pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
    let mut cursor = 0usize;
    let ticks = u64::from_le_bytes(bytes.get(cursor..cursor + 8)?.try_into().ok()?);
    cursor += 8;

    let mut lists: [Vec<String>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for list in &mut lists {
      let count = u32::from_le_bytes(bytes.get(cursor..cursor + 4)?.try_into().ok()?) as usize;
      cursor += 4;
      list.reserve(count);
      for _ in 0..count {
        let len = u32::from_le_bytes(bytes.get(cursor..cursor + 4)?.try_into().ok()?) as usize;
        cursor += 4;
        let entry = std::str::from_utf8(bytes.get(cursor..cursor + len)?).ok()?;
        cursor += len;
        list.push(entry.to_string());
      }
    }
    if cursor != bytes.len() {
      return None;
    }

    let [quoted_includes, angle_includes, platform_includes] = lists;
    Some(Self {
      ticks,
      quoted_includes,
      angle_includes,
      platform_includes,
    })
  }
}

/// Last-write fingerprint of a file, in 100ns intervals since the Unix epoch.
pub fn file_ticks(path: &Path) -> std::io::Result<u64> {
  let modified = std::fs::metadata(path)?.modified()?;
  Ok(system_time_ticks(modified))
}

fn system_time_ticks(time: SystemTime) -> u64 {
  match time.duration_since(UNIX_EPOCH) {
    Ok(duration) => (duration.as_nanos() / 100) as u64,
    // Pre-epoch mtimes collapse to zero; the entry just always rescans.
    Err(_) => 0,
  }
}

/// Scan source lines for include directives.
///
/// Unknown include-shaped constructs (computed includes, macro names) are
/// skipped with a warning; they are recoverable, never fatal.
pub fn scan_lines<'a>(path: &Path, lines: impl Iterator<Item = &'a str>, ticks: u64) -> ScanResult {
  let mut result = ScanResult {
    ticks,
    ..Default::default()
  };

  for line in lines {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("#include") else {
      continue;
    };
    if !rest.starts_with(char::is_whitespace) {
      continue;
    }
    let value = rest.trim();
    if value.is_empty() {
      continue;
    }

    if let Some(name) = value.strip_prefix('"') {
      if let Some((name, _)) = name.split_once('"') {
        result.quoted_includes.push(name.to_string());
      }
    } else if let Some(name) = value.strip_prefix('<') {
      if let Some((name, _)) = name.split_once('>') {
        result.angle_includes.push(name.to_string());
      }
    } else if let Some(inner) = value.strip_prefix(PLATFORM_HEADER_WRAPPER) {
      if let Some((name, _)) = inner.split_once(')') {
        result.platform_includes.push(name.to_string());
      }
    } else {
      warn!("Unrecognized #include form in {:?}: {}", path, line.trim());
    }
  }

  result
}

/// Read and scan a file, stamping the result with its current fingerprint.
pub async fn scan_source_file(path: &Path) -> std::io::Result<ScanResult> {
  let ticks = file_ticks(path)?;
  let contents = tokio::fs::read_to_string(path).await?;
  Ok(scan_lines(path, contents.lines(), ticks))
}
