//! Completion latch shared by the worker pool.
//!
//! Counts worker exits against the expected pool size and reports the one
//! arrival that completes the count. Together with [`ForwardHandle`] this is
//! what closes the aggregator's input once, and only after every worker has
//! stopped forwarding.

use crate::record::Record;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Atomic countdown of finished workers.
#[derive(Debug)]
pub struct CompletionLatch {
  expected: usize,
  arrived: AtomicUsize,
}

impl CompletionLatch {
  /// Creates a latch expecting `expected` arrivals.
  pub fn new(expected: usize) -> Self {
    Self {
      expected,
      arrived: AtomicUsize::new(0),
    }
  }

  /// Records one arrival. Returns `true` for exactly one caller: the one whose
  /// arrival reaches the expected count.
  pub fn arrive(&self) -> bool {
    self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.expected
  }

  /// Number of arrivals so far.
  pub fn arrived(&self) -> usize {
    self.arrived.load(Ordering::Acquire)
  }

  /// Number of arrivals that completes the latch.
  pub fn expected(&self) -> usize {
    self.expected
  }

  /// Returns `true` once every expected arrival has happened.
  pub fn is_complete(&self) -> bool {
    self.arrived() >= self.expected
  }
}

/// A worker's handle on the aggregator input.
///
/// The aggregator's input stream ends when the last handle is released, so
/// the input closes exactly once, after the final worker finishes.
#[derive(Debug)]
pub struct ForwardHandle {
  sender: mpsc::Sender<Record>,
  latch: Arc<CompletionLatch>,
}

impl ForwardHandle {
  /// Creates one handle per worker over a shared channel and latch.
  pub fn for_pool(
    sender: mpsc::Sender<Record>,
    latch: &Arc<CompletionLatch>,
  ) -> Vec<ForwardHandle> {
    (0..latch.expected())
      .map(|_| ForwardHandle {
        sender: sender.clone(),
        latch: Arc::clone(latch),
      })
      .collect()
  }

  /// Forwards a matching record. Returns `false` if the aggregator is gone.
  pub async fn forward(&self, record: Record) -> bool {
    self.sender.send(record).await.is_ok()
  }

  /// Arrives at the latch, then releases the sender.
  ///
  /// Arrival happens first so that by the time the aggregator observes its
  /// input closing, every worker has already been counted.
  pub fn finish(self, worker_id: usize) {
    if self.latch.arrive() {
      debug!(
        component = "worker_pool",
        worker_id,
        workers = self.latch.expected(),
        "all workers finished; closing aggregator input"
      );
    }
    drop(self.sender);
  }
}
