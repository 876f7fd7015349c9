/// Fixed chunk size used when the caller does not configure one.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

/// Payload encoding negotiated for a stream, carried on the first frame only.
/// The framing layer never compresses; the tag tells the peer how to treat
/// the reassembled bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionFormat {
  #[default]
  Raw,
  Gzip,
}

/// One bounded unit of a framed binary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFrame {
  /// At most the stream's chunk size; empty only on a final flush frame.
  pub payload: Vec<u8>,
  /// Byte offset of this payload from the start of the stream.
  pub offset: u64,
  /// Set on exactly one frame per stream, always the last one emitted.
  pub is_final: bool,
  /// Present on the first frame of a stream, absent afterwards.
  pub format: Option<CompressionFormat>,
}
