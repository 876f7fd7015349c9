use crate::error::StreamError;
use crate::frame::{ChunkFrame, CompressionFormat};
use tokio::sync::{Mutex, mpsc};
use tracing::trace;

struct WriterState {
  buffer: Vec<u8>,
  offset: u64,
  emitted_first: bool,
  closed: bool,
}

/// Write side of a chunk stream.
///
/// Bytes accumulate in a fixed-size buffer; every time it fills, a frame goes
/// out tagged with the running offset. [`ChunkWriter::finish`] flushes the
/// remainder as the single final frame - a zero-length one if the payload was
/// an exact multiple of the chunk size - and closes the stream.
///
/// A single lock serializes writes and finalization, so frames are always
/// produced in offset order. The lock makes interleaved use safe, but the
/// stream is sequential by contract: concurrent writers would interleave
/// their bytes unpredictably.
pub struct ChunkWriter {
  sink: mpsc::Sender<ChunkFrame>,
  chunk_size: usize,
  format: CompressionFormat,
  state: Mutex<WriterState>,
}

impl ChunkWriter {
  /// A bounded `sink` gives the stream backpressure: writes suspend when the
  /// transport cannot drain frames fast enough.
  pub fn new(sink: mpsc::Sender<ChunkFrame>, chunk_size: usize, format: CompressionFormat) -> Self {
    assert!(chunk_size > 0, "chunk size must be nonzero");
    Self {
      sink,
      chunk_size,
      format,
      state: Mutex::new(WriterState {
        buffer: Vec::with_capacity(chunk_size),
        offset: 0,
        emitted_first: false,
        closed: false,
      }),
    }
  }

  /// Append bytes, emitting one frame per filled chunk.
  pub async fn write(&self, mut bytes: &[u8]) -> Result<(), StreamError> {
    let mut state = self.state.lock().await;
    if state.closed {
      return Err(StreamError::Closed);
    }

    while !bytes.is_empty() {
      let room = self.chunk_size - state.buffer.len();
      let take = room.min(bytes.len());
      state.buffer.extend_from_slice(&bytes[..take]);
      bytes = &bytes[take..];

      if state.buffer.len() == self.chunk_size {
        self.emit(&mut state, false).await?;
      }
    }
    Ok(())
  }

  /// Flush the remaining bytes as exactly one final frame (possibly empty)
  /// and close the stream. Writes after this fail with [`StreamError::Closed`].
  pub async fn finish(&self) -> Result<u64, StreamError> {
    let mut state = self.state.lock().await;
    if state.closed {
      return Err(StreamError::Closed);
    }
    self.emit(&mut state, true).await?;
    state.closed = true;
    Ok(state.offset)
  }

  async fn emit(&self, state: &mut WriterState, is_final: bool) -> Result<(), StreamError> {
    let payload = std::mem::take(&mut state.buffer);
    let frame = ChunkFrame {
      offset: state.offset,
      is_final,
      format: (!state.emitted_first).then_some(self.format),
      payload,
    };
    state.offset += frame.payload.len() as u64;
    state.emitted_first = true;
    trace!(
      "Emitting frame at offset {} ({} bytes, final={})",
      frame.offset,
      frame.payload.len(),
      is_final
    );
    self
      .sink
      .send(frame)
      .await
      .map_err(|_| StreamError::TransportDropped)?;
    state.buffer = Vec::with_capacity(self.chunk_size);
    Ok(())
  }
}
