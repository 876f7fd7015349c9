use crate::error::StreamError;
use crate::frame::{ChunkFrame, CompressionFormat};
use tokio::sync::mpsc;

/// Validate a frame against the running stream position.
fn check_frame(frame: &ChunkFrame, expected_offset: u64, first: bool) -> Result<(), StreamError> {
  if frame.offset != expected_offset {
    return Err(StreamError::Framing(format!(
      "Expected frame at offset {}, got {}",
      expected_offset, frame.offset
    )));
  }
  if first != frame.format.is_some() {
    return Err(StreamError::Framing(if first {
      "First frame is missing its format tag".to_string()
    } else {
      "Format tag repeated after the first frame".to_string()
    }));
  }
  Ok(())
}

/// Reassemble a complete frame sequence into the original byte stream,
/// enforcing the framing discipline: contiguous offsets, format tag on the
/// first frame only, exactly one final frame in last position.
pub fn reassemble(frames: &[ChunkFrame]) -> Result<(Vec<u8>, CompressionFormat), StreamError> {
  let Some(first) = frames.first() else {
    return Err(StreamError::Framing("Empty frame sequence".to_string()));
  };
  let format = first
    .format
    .ok_or_else(|| StreamError::Framing("First frame is missing its format tag".to_string()))?;

  let mut bytes = Vec::new();
  for (i, frame) in frames.iter().enumerate() {
    check_frame(frame, bytes.len() as u64, i == 0)?;
    let last = i == frames.len() - 1;
    if frame.is_final != last {
      return Err(StreamError::Framing(if last {
        "Last frame is missing the final flag".to_string()
      } else {
        format!("Final flag set on frame {} of {}", i + 1, frames.len())
      }));
    }
    bytes.extend_from_slice(&frame.payload);
  }
  Ok((bytes, format))
}

/// Read side of a chunk stream: consumes frames off the transport in order
/// and hands back the reassembled bytes once the final frame arrives.
pub struct ChunkReader {
  source: mpsc::Receiver<ChunkFrame>,
}

impl ChunkReader {
  pub fn new(source: mpsc::Receiver<ChunkFrame>) -> Self {
    Self { source }
  }

  /// Receive frames until the final frame, validating order as they arrive.
  pub async fn read_to_end(mut self) -> Result<(Vec<u8>, CompressionFormat), StreamError> {
    let mut bytes = Vec::new();
    let mut format = None;

    loop {
      let Some(frame) = self.source.recv().await else {
        return Err(StreamError::TransportDropped);
      };
      check_frame(&frame, bytes.len() as u64, format.is_none())?;
      if let Some(tag) = frame.format {
        format = Some(tag);
      }
      bytes.extend_from_slice(&frame.payload);
      if frame.is_final {
        // format is set: the first frame either carried it or failed above.
        return Ok((bytes, format.expect("format tag on first frame")));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::writer::ChunkWriter;
  use pretty_assertions::assert_eq;

  fn frame(payload: &[u8], offset: u64, is_final: bool, format: Option<CompressionFormat>) -> ChunkFrame {
    ChunkFrame {
      payload: payload.to_vec(),
      offset,
      is_final,
      format,
    }
  }

  #[tokio::test]
  async fn test_round_trip_reproduces_bytes_exactly() {
    for size in [0usize, 1, 7, 8, 9, 64, 1000] {
      let payload: Vec<u8> = (0..size).map(|i| (i * 31 % 251) as u8).collect();
      let (tx, rx) = mpsc::channel(256);
      let writer = ChunkWriter::new(tx, 8, CompressionFormat::Raw);
      let reader = tokio::spawn(ChunkReader::new(rx).read_to_end());

      writer.write(&payload).await.unwrap();
      writer.finish().await.unwrap();
      drop(writer);

      let (bytes, format) = reader.await.unwrap().unwrap();
      assert_eq!(bytes, payload, "payload size {}", size);
      assert_eq!(format, CompressionFormat::Raw);
    }
  }

  #[tokio::test]
  async fn test_incremental_writes_concatenate() {
    let (tx, rx) = mpsc::channel(64);
    let writer = ChunkWriter::new(tx, 5, CompressionFormat::Raw);
    let reader = tokio::spawn(ChunkReader::new(rx).read_to_end());

    writer.write(b"ab").await.unwrap();
    writer.write(b"cdefg").await.unwrap();
    writer.write(b"").await.unwrap();
    writer.write(b"hij").await.unwrap();
    writer.finish().await.unwrap();
    drop(writer);

    let (bytes, _) = reader.await.unwrap().unwrap();
    assert_eq!(bytes, b"abcdefghij");
  }

  #[test]
  fn test_reassemble_rejects_out_of_order_offsets() {
    let frames = vec![
      frame(b"abcd", 0, false, Some(CompressionFormat::Raw)),
      frame(b"efgh", 2, true, None),
    ];
    assert!(matches!(reassemble(&frames), Err(StreamError::Framing(_))));
  }

  #[test]
  fn test_reassemble_rejects_missing_final_flag() {
    let frames = vec![frame(b"abcd", 0, false, Some(CompressionFormat::Raw))];
    assert!(matches!(reassemble(&frames), Err(StreamError::Framing(_))));
  }

  #[test]
  fn test_reassemble_rejects_early_final_flag() {
    let frames = vec![
      frame(b"abcd", 0, true, Some(CompressionFormat::Raw)),
      frame(b"efgh", 4, true, None),
    ];
    assert!(matches!(reassemble(&frames), Err(StreamError::Framing(_))));
  }

  #[test]
  fn test_reassemble_rejects_repeated_format_tag() {
    let frames = vec![
      frame(b"abcd", 0, false, Some(CompressionFormat::Raw)),
      frame(b"efgh", 4, true, Some(CompressionFormat::Raw)),
    ];
    assert!(matches!(reassemble(&frames), Err(StreamError::Framing(_))));
  }

  #[test]
  fn test_reassemble_accepts_single_empty_final_frame() {
    let frames = vec![frame(b"", 0, true, Some(CompressionFormat::Gzip))];
    let (bytes, format) = reassemble(&frames).unwrap();
    assert!(bytes.is_empty());
    assert_eq!(format, CompressionFormat::Gzip);
  }
}
