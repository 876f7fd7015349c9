use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
  /// A write or finalize was attempted after the stream was finalized.
  /// This is a caller programming error, not a transport condition.
  #[error("Stream is closed")]
  Closed,

  /// The receiving side of the transport went away mid-stream.
  #[error("Transport dropped before the stream completed")]
  TransportDropped,

  /// A frame sequence violated the framing discipline.
  #[error("Framing violation: {0}")]
  Framing(String),
}
