//! Task execution for Hivebuild.
//!
//! A bounded core-reservation pool caps concurrent work; pluggable executors
//! bid on each task with a score and the dispatcher runs the winner. The
//! local executor spawns the tool on this machine and is always a candidate;
//! the remote executor recognizes response-file compiler invocations and
//! ships the unit's transfer set to a worker through the chunk framing.

mod dispatch;
mod error;
mod local;
mod remote;
mod reservation;
mod task;

pub use dispatch::{Dispatcher, TaskExecutor};
pub use error::ExecError;
pub use local::{LOCAL_BASELINE_SCORE, LocalTaskExecutor};
pub use remote::{
  REMOTE_COMPILE_SCORE, RemoteCompileExecutor, RemoteTransport, decode_blob_entries, encode_blob_entry,
};
pub use reservation::{CoreHandle, CoreReservation};
pub use task::{BuildTask, TaskEnvironment, Tool};
