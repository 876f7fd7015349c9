//! Durable tier of the scan cache: a single-file write-ahead log.
//!
//! Every upsert is one appended record, flushed before the call returns, so a
//! crash either left the record fully present or fully absent. Replay on open
//! rebuilds the live index; a torn tail is truncated and the lost keys simply
//! rescan. Overwritten keys leave dead records behind, which compaction
//! rewrites away once they dominate the file.

use crate::scan::ScanResult;
use hive_core::PathKey;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

const STORE_FILE: &str = "depscan.wal";
const COMPACT_MIN_BYTES: u64 = 1024 * 1024;

struct StoreInner {
  file: File,
  index: HashMap<PathKey, ScanResult>,
  live_bytes: u64,
  total_bytes: u64,
}

/// The on-disk key-value store, opened once per process.
pub struct DiskStore {
  path: PathBuf,
  inner: Mutex<StoreInner>,
}

impl DiskStore {
  /// Open (or create) the store under `data_dir`, replaying the log and
  /// compacting it when dead records dominate.
  pub fn open(data_dir: &Path) -> std::io::Result<Self> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(STORE_FILE);

    let (index, live_bytes, valid_len, total_len) = replay(&path)?;
    if valid_len < total_len {
      warn!(
        "Truncating torn tail of scan store at byte {} (file was {} bytes)",
        valid_len, total_len
      );
      let file = OpenOptions::new().write(true).open(&path)?;
      file.set_len(valid_len)?;
      file.sync_data()?;
    }

    let mut store = Self {
      path,
      inner: Mutex::new(StoreInner {
        file: OpenOptions::new().create(true).append(true).open(data_dir.join(STORE_FILE))?,
        index,
        live_bytes,
        total_bytes: valid_len,
      }),
    };

    if store.should_compact() {
      store.compact()?;
    }

    let inner = store.inner.get_mut().expect("store lock");
    info!("Opened scan store with {} entries ({} bytes)", inner.index.len(), inner.total_bytes);
    Ok(store)
  }

  /// Look up a record. Corrupt or absent records are both misses.
  pub fn get(&self, key: &PathKey) -> Option<ScanResult> {
    self.inner.lock().expect("store lock").index.get(key).cloned()
  }

  /// Insert or overwrite a record. The append is a single flushed write:
  /// after a crash it is either fully present or fully absent.
  pub fn upsert(&self, key: &PathKey, value: &ScanResult) -> std::io::Result<()> {
    let record = encode_record(key, value);
    let mut inner = self.inner.lock().expect("store lock");
    inner.file.write_all(&record)?;
    inner.file.sync_data()?;
    inner.total_bytes += record.len() as u64;
    inner.live_bytes += record.len() as u64;
    if let Some(previous) = inner.index.insert(key.clone(), value.clone()) {
      let dead = encode_record(key, &previous).len() as u64;
      inner.live_bytes = inner.live_bytes.saturating_sub(dead);
    }
    Ok(())
  }

  /// Number of live entries.
  pub fn len(&self) -> usize {
    self.inner.lock().expect("store lock").index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn should_compact(&mut self) -> bool {
    let inner = self.inner.get_mut().expect("store lock");
    inner.total_bytes >= COMPACT_MIN_BYTES && inner.live_bytes * 2 < inner.total_bytes
  }

  /// Rewrite the log with only live records. Writes to a sibling temp file
  /// and renames over the log, so a crash mid-compaction leaves the old log
  /// intact.
  pub fn compact(&mut self) -> std::io::Result<()> {
    let inner = self.inner.get_mut().expect("store lock");
    debug!(
      "Compacting scan store: {} live of {} total bytes",
      inner.live_bytes, inner.total_bytes
    );

    let temp_path = self.path.with_extension("wal.tmp");
    let mut temp = File::create(&temp_path)?;
    let mut written = 0u64;
    for (key, value) in &inner.index {
      let record = encode_record(key, value);
      temp.write_all(&record)?;
      written += record.len() as u64;
    }
    temp.sync_data()?;
    drop(temp);
    std::fs::rename(&temp_path, &self.path)?;

    inner.file = OpenOptions::new().append(true).open(&self.path)?;
    inner.live_bytes = written;
    inner.total_bytes = written;
    Ok(())
  }
}

fn encode_record(key: &PathKey, value: &ScanResult) -> Vec<u8> {
  let key_bytes = key.as_str().as_bytes();
  let value_bytes = value.to_bytes();
  let body_len = 4 + key_bytes.len() + value_bytes.len();

  let mut record = Vec::with_capacity(4 + body_len);
  record.extend_from_slice(&(body_len as u32).to_le_bytes());
  record.extend_from_slice(&(key_bytes.len() as u32).to_le_bytes());
  record.extend_from_slice(key_bytes);
  record.extend_from_slice(&value_bytes);
  record
}

/// Replay the log, returning the live index, the live byte count, the byte
/// offset up to which the log parsed cleanly, and the full file length.
#[allow(clippy::type_complexity)]
fn replay(path: &Path) -> std::io::Result<(HashMap<PathKey, ScanResult>, u64, u64, u64)> {
  let mut bytes = Vec::new();
  match File::open(path) {
    Ok(mut file) => {
      file.read_to_end(&mut bytes)?;
    }
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }

  let mut index: HashMap<PathKey, ScanResult> = HashMap::new();
  let mut record_sizes: HashMap<PathKey, u64> = HashMap::new();
  let mut live_bytes = 0u64;
  let mut cursor = 0usize;

  while cursor + 4 <= bytes.len() {
    let body_len = u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().expect("4 bytes")) as usize;
    let record_len = 4 + body_len;
    if cursor + record_len > bytes.len() || body_len < 4 {
      break;
    }
    let body = &bytes[cursor + 4..cursor + record_len];
    let Some((key, value)) = decode_body(body) else {
      break;
    };

    live_bytes += record_len as u64;
    if let Some(previous) = record_sizes.insert(key.clone(), record_len as u64) {
      live_bytes -= previous;
    }
    index.insert(key, value);
    cursor += record_len;
  }

  Ok((index, live_bytes, cursor as u64, bytes.len() as u64))
}

fn decode_body(body: &[u8]) -> Option<(PathKey, ScanResult)> {
  let key_len = u32::from_le_bytes(body.get(0..4)?.try_into().ok()?) as usize;
  let key_str = std::str::from_utf8(body.get(4..4 + key_len)?).ok()?;
  let value = ScanResult::from_bytes(body.get(4 + key_len..)?)?;
  Some((PathKey::raw(key_str), value))
}

#[cfg(test)]
mod tests {
  use super::*;
  use hive_core::config::CaseSensitivity;
  use tempfile::TempDir;

  fn key(path: &str) -> PathKey {
    PathKey::new(Path::new(path), CaseSensitivity::Respect)
  }

  fn sample(ticks: u64) -> ScanResult {
    ScanResult {
      ticks,
      quoted_includes: vec!["a.h".into()],
      angle_includes: vec!["vector".into()],
      platform_includes: vec![],
    }
  }

  #[test]
  fn test_upsert_and_get() {
    let temp = TempDir::new().unwrap();
    let store = DiskStore::open(temp.path()).unwrap();

    assert!(store.is_empty());
    assert!(store.get(&key("/src/a.cpp")).is_none());
    store.upsert(&key("/src/a.cpp"), &sample(10)).unwrap();
    assert!(!store.is_empty());
    assert_eq!(store.get(&key("/src/a.cpp")).unwrap().ticks, 10);

    store.upsert(&key("/src/a.cpp"), &sample(20)).unwrap();
    assert_eq!(store.get(&key("/src/a.cpp")).unwrap().ticks, 20);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn test_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
      let store = DiskStore::open(temp.path()).unwrap();
      store.upsert(&key("/src/a.cpp"), &sample(10)).unwrap();
      store.upsert(&key("/src/b.cpp"), &sample(11)).unwrap();
    }
    let store = DiskStore::open(temp.path()).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(&key("/src/b.cpp")).unwrap().ticks, 11);
  }

  #[test]
  fn test_torn_tail_is_truncated_not_fatal() {
    let temp = TempDir::new().unwrap();
    {
      let store = DiskStore::open(temp.path()).unwrap();
      store.upsert(&key("/src/a.cpp"), &sample(10)).unwrap();
    }

    // Simulate a crash mid-append.
    let wal = temp.path().join(STORE_FILE);
    let mut file = OpenOptions::new().append(true).open(&wal).unwrap();
    file.write_all(&[0x40, 0x00, 0x00, 0x00, 0xde, 0xad]).unwrap();
    drop(file);

    let store = DiskStore::open(temp.path()).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&key("/src/a.cpp")).unwrap().ticks, 10);

    // The tail was truncated, so appends after reopen parse cleanly too.
    store.upsert(&key("/src/c.cpp"), &sample(12)).unwrap();
    let store = DiskStore::open(temp.path()).unwrap();
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn test_compaction_preserves_live_records() {
    let temp = TempDir::new().unwrap();
    let mut store = DiskStore::open(temp.path()).unwrap();
    for i in 0..50 {
      store.upsert(&key("/src/hot.cpp"), &sample(i)).unwrap();
    }
    store.upsert(&key("/src/cold.cpp"), &sample(99)).unwrap();

    let before = std::fs::metadata(temp.path().join(STORE_FILE)).unwrap().len();
    store.compact().unwrap();
    let after = std::fs::metadata(temp.path().join(STORE_FILE)).unwrap().len();

    assert!(after < before);
    assert_eq!(store.get(&key("/src/hot.cpp")).unwrap().ticks, 49);
    assert_eq!(store.get(&key("/src/cold.cpp")).unwrap().ticks, 99);

    let reopened = DiskStore::open(temp.path()).unwrap();
    assert_eq!(reopened.len(), 2);
  }
}
