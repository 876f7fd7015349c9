//! Bounded core reservation.
//!
//! Executors reserve a core before running anything; the pool caps concurrent
//! work at the configured core count. Waiting is cooperative (a tokio
//! semaphore), and release rides on [`CoreHandle`]'s `Drop`, so a slot comes
//! back on every exit path, including cancellation at a suspend point.

use crate::error::ExecError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

struct Pool {
  slots: Arc<Semaphore>,
  free_ids: Mutex<VecDeque<usize>>,
}

/// A fixed-size pool of local execution slots.
#[derive(Clone)]
pub struct CoreReservation {
  pool: Arc<Pool>,
}

/// One reserved core. Dropping the handle returns the slot to the pool.
pub struct CoreHandle {
  id: usize,
  pool: Arc<Pool>,
  _permit: OwnedSemaphorePermit,
}

impl CoreReservation {
  pub fn new(cores: usize) -> Self {
    assert!(cores > 0, "core pool must have at least one slot");
    Self {
      pool: Arc::new(Pool {
        slots: Arc::new(Semaphore::new(cores)),
        free_ids: Mutex::new((0..cores).collect()),
      }),
    }
  }

  /// Reserve a core, suspending until one is free.
  pub async fn allocate(&self) -> Result<CoreHandle, ExecError> {
    let permit = self
      .pool
      .slots
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| ExecError::PoolClosed)?;

    // Holding a permit guarantees a free id is queued.
    let id = self
      .pool
      .free_ids
      .lock()
      .expect("core id queue poisoned")
      .pop_front()
      .expect("permit held but no core id free");
    trace!("Reserved core {}", id);

    Ok(CoreHandle {
      id,
      pool: self.pool.clone(),
      _permit: permit,
    })
  }

  /// Slots not currently reserved.
  pub fn available(&self) -> usize {
    self.pool.slots.available_permits()
  }
}

impl CoreHandle {
  pub fn id(&self) -> usize {
    self.id
  }
}

impl Drop for CoreHandle {
  fn drop(&mut self) {
    self
      .pool
      .free_ids
      .lock()
      .expect("core id queue poisoned")
      .push_back(self.id);
    trace!("Released core {}", self.id);
  }
}
