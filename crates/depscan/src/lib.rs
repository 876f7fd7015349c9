//! Preprocessor dependency scanning and caching for Hivebuild.
//!
//! This crate answers one question quickly: which headers does a source file
//! pull in? It keeps the answer in two tiers - an in-memory map with
//! at-most-one-concurrent-computation-per-key semantics, and a durable
//! write-ahead-logged store so repeated builds skip filesystem scans - and
//! expands per-file answers into the transitive closure a remote worker needs.

mod cache;
mod error;
mod resolver;
mod scan;
mod store;

pub use cache::{ScanCache, ScanCacheStats};
pub use error::ScanError;
pub use resolver::{ClosureResolver, PchUsage};
pub use scan::{ScanResult, file_ticks, scan_lines, scan_source_file};
pub use store::DiskStore;
