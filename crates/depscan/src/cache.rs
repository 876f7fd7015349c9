//! Two-tier scan cache.
//!
//! Tier 1 is an in-memory map with coalesced computation: concurrent requests
//! for the same uncomputed key share a single underlying scan. Tier 2 is the
//! write-ahead-logged [`DiskStore`], consulted before any file content is
//! read. A disk hit whose fingerprint is still current costs one metadata
//! stat, never a content read.

use crate::error::ScanError;
use crate::scan::{ScanResult, file_ticks, scan_source_file};
use crate::store::DiskStore;
use hive_core::config::{CacheConfig, CaseSensitivity};
use hive_core::paths::PathKey;
use moka::future::Cache;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Cache statistics
#[derive(Debug, Clone)]
pub struct ScanCacheStats {
  pub entry_count: u64,
  /// Underlying content scans performed (misses and refreshes).
  pub scans_performed: u64,
}

/// Process-wide scan cache; construct once and share by `Arc`.
pub struct ScanCache {
  memory: Cache<PathKey, Arc<ScanResult>>,
  disk: Arc<DiskStore>,
  case: CaseSensitivity,
  scans_performed: Arc<AtomicU64>,
}

impl ScanCache {
  /// Open the cache with its on-disk tier under the configured data dir.
  pub fn open(config: &CacheConfig) -> std::io::Result<Self> {
    let disk = Arc::new(DiskStore::open(&config.data_dir)?);
    Ok(Self::with_store(disk, config.memory_capacity, config.case_sensitivity))
  }

  pub fn with_store(disk: Arc<DiskStore>, capacity: u64, case: CaseSensitivity) -> Self {
    Self {
      memory: Cache::builder().max_capacity(capacity).build(),
      disk,
      case,
      scans_performed: Arc::new(AtomicU64::new(0)),
    }
  }

  pub fn case_sensitivity(&self) -> CaseSensitivity {
    self.case
  }

  /// Resolve the direct includes of `path`, from cache when the stored
  /// fingerprint is at least the file's current modification time.
  ///
  /// Concurrent callers for the same key are linearized: exactly one performs
  /// the scan, all observe the same result.
  pub async fn scan_file(&self, path: &Path) -> Result<Arc<ScanResult>, ScanError> {
    let key = PathKey::new(path, self.case);
    let current = file_ticks(path)?;

    let mut attempts = 0;
    loop {
      if let Some(hit) = self.memory.get(&key).await {
        if hit.ticks >= current {
          return Ok(hit);
        }
        self.memory.invalidate(&key).await;
      }

      let disk = self.disk.clone();
      let init_key = key.clone();
      let init_path = path.to_path_buf();
      let scans = self.scans_performed.clone();
      let computed = self
        .memory
        .try_get_with(key.clone(), async move {
          if let Some(record) = disk.get(&init_key) {
            if record.ticks >= current {
              trace!("Disk cache hit for {:?}", init_path);
              return Ok(Arc::new(record));
            }
          }
          scans.fetch_add(1, Ordering::Relaxed);
          let fresh = scan_source_file(&init_path).await?;
          disk.upsert(&init_key, &fresh)?;
          Ok::<_, ScanError>(Arc::new(fresh))
        })
        .await
        .map_err(ScanError::Coalesced)?;

      if computed.ticks >= current {
        return Ok(computed);
      }

      // We joined a computation that raced an older fingerprint. One retry
      // recomputes against the current file; a second stale round means the
      // mtime is moving under us and the next scan will catch it.
      attempts += 1;
      if attempts >= 2 {
        return Ok(computed);
      }
      self.memory.invalidate(&key).await;
    }
  }

  pub fn stats(&self) -> ScanCacheStats {
    ScanCacheStats {
      entry_count: self.memory.entry_count(),
      scans_performed: self.scans_performed.load(Ordering::Relaxed),
    }
  }
}
