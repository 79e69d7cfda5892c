//! Worker pool.
//!
//! Each worker repeatedly pulls one record from the dispatcher, tests it
//! against the [`Threshold`], and forwards matches to the aggregator. A worker
//! holds at most one outstanding pull request, so the dispatcher's
//! `worker_count` termination signals reach every worker exactly once.

use crate::dispatcher::{Delivery, PullHandle};
use crate::error::PipelineError;
use crate::latch::{CompletionLatch, ForwardHandle};
use crate::record::{Record, Threshold};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Per-worker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
  /// Pool slot of the worker.
  pub id: usize,
  /// Records delivered to this worker.
  pub received: usize,
  /// Records that matched and reached the aggregator.
  pub forwarded: usize,
  /// Records that failed the threshold.
  pub rejected: usize,
}

/// A single pool slot.
#[derive(Debug)]
pub struct Worker {
  id: usize,
  pull: PullHandle,
  forward: ForwardHandle,
  threshold: Threshold,
}

impl Worker {
  /// Creates a worker for slot `id`.
  pub fn new(id: usize, pull: PullHandle, forward: ForwardHandle, threshold: Threshold) -> Self {
    Self {
      id,
      pull,
      forward,
      threshold,
    }
  }

  /// Pulls and filters until told to terminate.
  pub async fn run(self) -> WorkerReport {
    let Worker {
      id,
      pull,
      forward,
      threshold,
    } = self;
    let mut report = WorkerReport {
      id,
      ..WorkerReport::default()
    };
    let mut aggregator_alive = true;

    loop {
      match pull.pull().await {
        Delivery::Record(record) => {
          report.received += 1;
          if !threshold.matches(&record) {
            trace!(component = "worker", worker_id = id, record = %record, "rejected");
            report.rejected += 1;
            continue;
          }
          if !aggregator_alive {
            continue;
          }
          trace!(component = "worker", worker_id = id, record = %record, "forwarding");
          if forward.forward(record).await {
            report.forwarded += 1;
          } else {
            aggregator_alive = false;
            warn!(
              component = "worker",
              worker_id = id,
              "aggregator input closed; draining remaining records"
            );
          }
        }
        Delivery::Terminate => break,
      }
    }

    debug!(
      component = "worker",
      worker_id = id,
      received = report.received,
      forwarded = report.forwarded,
      "worker terminated"
    );
    forward.finish(id);
    report
  }
}

/// The running set of workers.
#[derive(Debug)]
pub struct WorkerPool {
  handles: Vec<JoinHandle<WorkerReport>>,
  latch: Arc<CompletionLatch>,
}

impl WorkerPool {
  /// Spawns `worker_count` workers sharing `pull` and `forward`.
  ///
  /// Takes ownership of both handles so that the workers hold the only
  /// requesters and the only forward senders.
  pub fn spawn(
    worker_count: usize,
    threshold: Threshold,
    pull: PullHandle,
    forward: mpsc::Sender<Record>,
  ) -> Self {
    let latch = Arc::new(CompletionLatch::new(worker_count));
    let handles = ForwardHandle::for_pool(forward, &latch)
      .into_iter()
      .enumerate()
      .map(|(id, forward)| tokio::spawn(Worker::new(id, pull.clone(), forward, threshold).run()))
      .collect();
    Self { handles, latch }
  }

  /// The latch the workers arrive at on exit.
  pub fn latch(&self) -> &Arc<CompletionLatch> {
    &self.latch
  }

  /// Number of workers in the pool.
  pub fn len(&self) -> usize {
    self.handles.len()
  }

  /// Returns `true` if the pool has no workers.
  pub fn is_empty(&self) -> bool {
    self.handles.is_empty()
  }

  /// Waits for every worker and collects their reports in slot order.
  ///
  /// # Errors
  ///
  /// [`PipelineError::TaskFailed`] if a worker task panicked.
  pub async fn join(self) -> Result<Vec<WorkerReport>, PipelineError> {
    let mut reports = Vec::with_capacity(self.handles.len());
    for handle in self.handles {
      reports.push(
        handle
          .await
          .map_err(|e| PipelineError::task_failed("worker", e))?,
      );
    }
    Ok(reports)
  }
}
