//! Integration tests for the remote compile executor.

mod common;

use async_trait::async_trait;
use chunkstream::{ChunkFrame, ChunkReader};
use common::{StubExecutor, collecting_sink, no_environment, task};
use executor::{
  CoreReservation, Dispatcher, ExecError, LocalTaskExecutor, RemoteCompileExecutor, RemoteTransport, TaskExecutor,
  Tool, decode_blob_entries,
};
use hive_core::process::TokioProcessRunner;
use pretty_assertions::assert_eq;
use rspfile::{CompileUnitDescriptor, ResponseFileParser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Transport that reassembles the blob stream in memory and returns a
/// configured exit code.
struct MemoryTransport {
  exit_code: i32,
  received: Mutex<Option<HashMap<String, Vec<u8>>>>,
}

impl MemoryTransport {
  fn new(exit_code: i32) -> Arc<Self> {
    Arc::new(Self {
      exit_code,
      received: Mutex::new(None),
    })
  }

  fn received(&self) -> Option<HashMap<String, Vec<u8>>> {
    self.received.lock().unwrap().clone()
  }
}

#[async_trait]
impl RemoteTransport for MemoryTransport {
  async fn submit(
    &self,
    _descriptor: &CompileUnitDescriptor,
    frames: mpsc::Receiver<ChunkFrame>,
  ) -> Result<i32, ExecError> {
    let (bytes, _format) = ChunkReader::new(frames).read_to_end().await?;
    let entries = decode_blob_entries(&bytes)?;
    *self.received.lock().unwrap() = Some(entries.into_iter().collect());
    Ok(self.exit_code)
  }
}

fn write(path: &Path, contents: &str) {
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, contents).unwrap();
}

/// A small chunk size so blob streams span several frames.
const TEST_CHUNK_SIZE: usize = 64;

fn remote_executor(temp: &TempDir, transport: Arc<dyn RemoteTransport>) -> Arc<RemoteCompileExecutor> {
  let resolver = common::build_resolver(&temp.path().join("store"));
  let parser = Arc::new(ResponseFileParser::new(resolver.clone()));
  let local = Arc::new(LocalTaskExecutor::new(
    CoreReservation::new(2),
    Arc::new(TokioProcessRunner),
  ));
  Arc::new(RemoteCompileExecutor::new(parser, resolver, local, transport, TEST_CHUNK_SIZE))
}

fn cl() -> Tool {
  Tool {
    path: PathBuf::from("/toolchain/cl.exe"),
  }
}

/// The remote executor only bids on response-file compiler invocations.
#[tokio::test]
async fn test_remote_score_recognizes_cl_with_response_file() {
  let temp = TempDir::new().unwrap();
  let remote = remote_executor(&temp, MemoryTransport::new(0));
  let (environment, _) = no_environment();
  let build_task = task("a.cpp", temp.path());

  let rsp = vec!["@a.rsp".to_string()];
  assert_eq!(remote.score(&build_task, &environment, &cl(), &rsp), 1000);

  // Wrong tool, missing response file, or a pinned-local task all refuse.
  let sh = Tool {
    path: PathBuf::from("sh"),
  };
  assert_eq!(remote.score(&build_task, &environment, &sh, &rsp), -1);
  assert_eq!(remote.score(&build_task, &environment, &cl(), &["a.cpp".to_string()]), -1);
  let mut pinned = build_task.clone();
  pinned.guaranteed_local = true;
  assert_eq!(remote.score(&pinned, &environment, &cl(), &rsp), -1);
}

/// The transfer set reaches the transport as decodable blob entries.
#[tokio::test]
async fn test_remote_executor_streams_transfer_set() {
  let temp = TempDir::new().unwrap();
  let header_body = "// shared header\n".repeat(20);
  write(&temp.path().join("src/a.cpp"), "#include \"b.h\"\nint main() {}\n");
  write(&temp.path().join("src/b.h"), &header_body);
  write(&temp.path().join("a.rsp"), "src/a.cpp\n/Fo out.obj\n");

  let transport = MemoryTransport::new(0);
  let remote = remote_executor(&temp, transport.clone());
  let (environment, global) = no_environment();
  let (stdout, _) = collecting_sink();
  let (stderr, _) = collecting_sink();
  let core = remote.allocate_core().await.unwrap();
  let code = remote
    .execute(
      core,
      &task("a.cpp", temp.path()),
      &environment,
      &cl(),
      &["@a.rsp".to_string()],
      &global,
      stdout,
      stderr,
    )
    .await
    .unwrap();

  assert_eq!(code, 0);
  let entries = transport.received().expect("transport saw no blob stream");
  assert_eq!(entries.len(), 2);
  let source = temp.path().join("src/a.cpp");
  let header = temp.path().join("src/b.h");
  assert_eq!(
    entries[&source.to_string_lossy().into_owned()],
    std::fs::read(&source).unwrap()
  );
  assert_eq!(entries[&header.to_string_lossy().into_owned()], header_body.as_bytes());
}

/// The remote exit code propagates verbatim, success or not.
#[tokio::test]
async fn test_remote_exit_code_propagates_verbatim() {
  let temp = TempDir::new().unwrap();
  write(&temp.path().join("src/a.cpp"), "int main() {}\n");
  write(&temp.path().join("a.rsp"), "src/a.cpp\n/Fo out.obj\n");

  let remote = remote_executor(&temp, MemoryTransport::new(37));
  let (environment, global) = no_environment();
  let (stdout, _) = collecting_sink();
  let (stderr, _) = collecting_sink();
  let core = remote.allocate_core().await.unwrap();
  let code = remote
    .execute(
      core,
      &task("a.cpp", temp.path()),
      &environment,
      &cl(),
      &["@a.rsp".to_string()],
      &global,
      stdout,
      stderr,
    )
    .await
    .unwrap();

  assert_eq!(code, 37);
}

/// A unit the parser cannot describe runs through the local executor instead.
#[tokio::test]
async fn test_undescribable_unit_runs_locally() {
  use std::os::unix::fs::PermissionsExt;

  let temp = TempDir::new().unwrap();
  write(&temp.path().join("src/a.cpp"), "int main() {}\n");
  // No /Fo line, so the parse yields no descriptor.
  write(&temp.path().join("a.rsp"), "src/a.cpp\n");

  // Stand-in compiler so the local delegation has something to spawn.
  let tool_path = temp.path().join("cl");
  write(&tool_path, "#!/bin/sh\nexit 11\n");
  std::fs::set_permissions(&tool_path, std::fs::Permissions::from_mode(0o755)).unwrap();

  let transport = MemoryTransport::new(0);
  let remote = remote_executor(&temp, transport.clone());
  let (environment, global) = no_environment();
  let (stdout, _) = collecting_sink();
  let (stderr, _) = collecting_sink();
  let core = remote.allocate_core().await.unwrap();
  let code = remote
    .execute(
      core,
      &task("a.cpp", temp.path()),
      &environment,
      &Tool { path: tool_path },
      &["@a.rsp".to_string()],
      &global,
      stdout,
      stderr,
    )
    .await
    .unwrap();

  assert_eq!(code, 11);
  assert!(transport.received().is_none());
}

/// A PCH header graph the resolver rejects falls back to the next executor
/// through the dispatcher rather than failing the task.
#[tokio::test]
async fn test_invalid_pch_graph_falls_back_through_dispatcher() {
  let temp = TempDir::new().unwrap();
  write(&temp.path().join("src/a.cpp"), "int main() {}\n");
  // The PCH header needs a platform definition nothing provides.
  write(&temp.path().join("pch.h"), "#include COMPILED_PLATFORM_HEADER(Time.h)\n");
  write(&temp.path().join("a.rsp"), "src/a.cpp\n/Fo out.obj\n/Yupch.h\n");

  let remote = remote_executor(&temp, MemoryTransport::new(0));
  let fallback = Arc::new(StubExecutor::new(100, 5));
  let dispatcher = Dispatcher::new(vec![remote as Arc<dyn TaskExecutor>, fallback.clone()]);

  let (environment, global) = no_environment();
  let (stdout, _) = collecting_sink();
  let (stderr, _) = collecting_sink();
  let code = dispatcher
    .run_task(
      &task("a.cpp", temp.path()),
      &environment,
      &cl(),
      &["@a.rsp".to_string()],
      &global,
      stdout,
      stderr,
    )
    .await
    .unwrap();

  assert_eq!(code, 5);
  assert_eq!(fallback.executions.load(Ordering::SeqCst), 1);
}
