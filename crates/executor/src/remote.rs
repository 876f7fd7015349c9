//! Remote compile execution.
//!
//! Recognizes `cl`-style invocations driven by a response file, parses the
//! unit, computes its transfer set, and streams the set as blob entries
//! through the chunk framing toward the transport. Units the parser or
//! resolver refuse run locally instead; the build never fails just because a
//! task could not be remoted.

use crate::dispatch::TaskExecutor;
use crate::error::ExecError;
use crate::local::LocalTaskExecutor;
use crate::reservation::CoreHandle;
use crate::task::{BuildTask, TaskEnvironment, Tool};
use async_trait::async_trait;
use chunkstream::{ChunkFrame, ChunkWriter, CompressionFormat};
use depscan::ClosureResolver;
use hive_core::paths::strip_quotes;
use hive_core::process::LineSink;
use rspfile::{CompileUnitDescriptor, ResponseFileParser, ToolArchitecture};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Score for compiler invocations the remote path recognizes. Outbids the
/// local baseline so remotable units prefer the remote executor.
pub const REMOTE_COMPILE_SCORE: i32 = 1000;

/// Frames buffered between the blob writer and the transport.
const FRAME_CHANNEL_DEPTH: usize = 16;

/// Carries one compile unit and its blob stream to a remote worker.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
  /// Submit the unit; `frames` delivers the transfer set encoded as blob
  /// entries. Resolves to the remote tool's exit code.
  async fn submit(
    &self,
    descriptor: &CompileUnitDescriptor,
    frames: mpsc::Receiver<ChunkFrame>,
  ) -> Result<i32, ExecError>;
}

/// Dispatches recognized compile units to a remote worker.
pub struct RemoteCompileExecutor {
  parser: Arc<ResponseFileParser>,
  resolver: Arc<ClosureResolver>,
  local: Arc<LocalTaskExecutor>,
  transport: Arc<dyn RemoteTransport>,
  chunk_size: usize,
}

impl RemoteCompileExecutor {
  pub fn new(
    parser: Arc<ResponseFileParser>,
    resolver: Arc<ClosureResolver>,
    local: Arc<LocalTaskExecutor>,
    transport: Arc<dyn RemoteTransport>,
    chunk_size: usize,
  ) -> Self {
    Self {
      parser,
      resolver,
      local,
      transport,
      chunk_size,
    }
  }
}

#[async_trait]
impl TaskExecutor for RemoteCompileExecutor {
  fn score(&self, task: &BuildTask, _environment: &TaskEnvironment, tool: &Tool, arguments: &[String]) -> i32 {
    if task.guaranteed_local {
      return -1;
    }
    let recognized_tool = matches!(tool.file_name().as_str(), "cl" | "cl.exe" | "clang-cl" | "clang-cl.exe");
    let driven_by_response_file = arguments.first().is_some_and(|argument| argument.starts_with('@'));
    if recognized_tool && driven_by_response_file {
      REMOTE_COMPILE_SCORE
    } else {
      -1
    }
  }

  async fn allocate_core(&self) -> Result<CoreHandle, ExecError> {
    self.local.allocate_core().await
  }

  async fn execute(
    &self,
    core: CoreHandle,
    task: &BuildTask,
    environment: &TaskEnvironment,
    tool: &Tool,
    arguments: &[String],
    global_environment: &HashMap<String, String>,
    on_stdout: LineSink,
    on_stderr: LineSink,
  ) -> Result<i32, ExecError> {
    let Some(response_file) = arguments.first().and_then(|argument| argument.strip_prefix('@')) else {
      // score() filters these out; run locally rather than fail.
      return self
        .local
        .execute(core, task, environment, tool, arguments, global_environment, on_stdout, on_stderr)
        .await;
    };
    let response_file = PathBuf::from(strip_quotes(response_file));

    let architecture = if tool.file_name().starts_with("clang-cl") {
      ToolArchitecture::ClangCl
    } else {
      ToolArchitecture::Msvc
    };

    let descriptor = self
      .parser
      .parse(&response_file, &task.working_dir, task.guaranteed_local, architecture)
      .await?;
    let Some(descriptor) = descriptor else {
      warn!("{} could not be described for remoting; running locally", task.caption);
      return self
        .local
        .execute(core, task, environment, tool, arguments, global_environment, on_stdout, on_stderr)
        .await;
    };

    // The input file's closure is the literal transfer set; an
    // InvalidHeaderGraph here surfaces to the dispatcher, which retries the
    // task on the local executor.
    let transfer_set = self
      .resolver
      .transfer_set(
        &descriptor.input_file,
        &descriptor.include_dirs,
        &[],
        &descriptor.definitions,
        descriptor.pch_usage().as_ref(),
      )
      .await?;
    let mut files: Vec<PathBuf> = transfer_set.into_iter().collect();
    files.sort();
    info!("{} transfer set has {} files", task.caption, files.len());

    let (sink, frames) = mpsc::channel(FRAME_CHANNEL_DEPTH);
    let writer = ChunkWriter::new(sink, self.chunk_size, CompressionFormat::Raw);
    let stream_blobs = async move {
      for path in &files {
        let contents = tokio::fs::read(path).await?;
        writer.write(&encode_blob_entry(path, &contents)).await?;
      }
      let total = writer.finish().await?;
      debug!("Streamed {} bytes of blobs", total);
      Ok::<(), ExecError>(())
      // The writer (and its sender) drops here, ending the frame stream.
    };

    let (streamed, exit_code) = tokio::join!(stream_blobs, self.transport.submit(&descriptor, frames));
    streamed?;
    let exit_code = exit_code?;

    debug!("{} completed remotely on core {} with exit code {}", task.caption, core.id(), exit_code);
    Ok(exit_code)
  }
}

/// Encode one transfer-set file as a wire entry: length-prefixed UTF-8 path,
/// then length-prefixed contents. Both directions of blob traffic use this
/// shape inside the chunk framing.
pub fn encode_blob_entry(path: &Path, contents: &[u8]) -> Vec<u8> {
  let path = path.to_string_lossy();
  let mut buffer = Vec::with_capacity(4 + path.len() + 8 + contents.len());
  buffer.extend_from_slice(&(path.len() as u32).to_le_bytes());
  buffer.extend_from_slice(path.as_bytes());
  buffer.extend_from_slice(&(contents.len() as u64).to_le_bytes());
  buffer.extend_from_slice(contents);
  buffer
}

/// Decode a reassembled blob stream back into `(path, contents)` entries.
pub fn decode_blob_entries(mut bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, ExecError> {
  fn malformed() -> ExecError {
    ExecError::Transport("Malformed blob stream".to_string())
  }

  let mut entries = Vec::new();
  while !bytes.is_empty() {
    let (len, rest) = bytes.split_first_chunk::<4>().ok_or_else(malformed)?;
    let path_len = u32::from_le_bytes(*len) as usize;
    if rest.len() < path_len {
      return Err(malformed());
    }
    let (path, rest) = rest.split_at(path_len);
    let path = String::from_utf8(path.to_vec()).map_err(|_| malformed())?;

    let (len, rest) = rest.split_first_chunk::<8>().ok_or_else(malformed)?;
    let contents_len = u64::from_le_bytes(*len) as usize;
    if rest.len() < contents_len {
      return Err(malformed());
    }
    let (contents, rest) = rest.split_at(contents_len);
    entries.push((path, contents.to_vec()));
    bytes = rest;
  }
  Ok(entries)
}
