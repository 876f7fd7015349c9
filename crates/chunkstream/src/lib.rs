//! Framed, offset-ordered binary streaming.
//!
//! Large blobs (transfer sets outbound, compiled outputs inbound) move across
//! a duplex transport as bounded chunk frames. The writer buffers to a fixed
//! chunk size and emits frames in strictly increasing offset order; exactly
//! one frame per stream carries the final flag, always last, possibly empty.
//! Both traffic directions reuse the same framing; only the outer message
//! envelope differs.

mod error;
mod frame;
mod reader;
mod writer;

pub use error::StreamError;
pub use frame::{ChunkFrame, CompressionFormat, DEFAULT_CHUNK_SIZE};
pub use reader::{ChunkReader, reassemble};
pub use writer::ChunkWriter;
