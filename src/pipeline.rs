//! # Pipeline driver
//!
//! Wires a [`Dispatcher`], a [`WorkerPool`] and an [`Aggregator`] together and
//! feeds them. All three are spawned by [`Pipeline::start`] before any record
//! is submitted, so a worker is always waiting by the time the first record
//! arrives.
//!
//! ```rust
//! use recordsieve::pipeline::Pipeline;
//! use recordsieve::record::Record;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = Pipeline::builder()
//!   .worker_count(2)
//!   .build()?
//!   .run(vec![
//!     Record::new("Cara", 300, 6.5),
//!     Record::new("Bob", 150, 8.0),
//!     Record::new("Alice", 250, 7.0),
//!   ])
//!   .await?;
//!
//! assert_eq!(outcome.results.names(), vec!["Alice", "Cara"]);
//! assert_eq!(outcome.stats.terminations_sent, 2);
//! # Ok(())
//! # }
//! ```

use crate::aggregator::{AggregateReport, Aggregator, ResultSet};
use crate::config::PipelineConfig;
use crate::dispatcher::{DispatchReport, Dispatcher, SubmitHandle, Submission};
use crate::error::{PipelineError, SieveError};
use crate::producer::Producer;
use crate::record::{Record, Threshold};
use crate::worker::{WorkerPool, WorkerReport};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters gathered from every stage after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
  /// Records handed to the dispatcher.
  pub submitted: usize,
  /// Records delivered to a worker.
  pub delivered: usize,
  /// Records a worker forwarded to the aggregator.
  pub forwarded: usize,
  /// Records a worker rejected.
  pub rejected: usize,
  /// Forwarded records discarded because their name was already present.
  pub duplicates: usize,
  /// Termination signals the dispatcher sent.
  pub terminations_sent: usize,
  /// Workers that arrived at the completion latch.
  pub workers_finished: usize,
}

impl PipelineStats {
  fn collect(
    submitted: usize,
    dispatch: &DispatchReport,
    workers: &[WorkerReport],
    aggregate: &AggregateReport,
    workers_finished: usize,
  ) -> Self {
    Self {
      submitted,
      delivered: dispatch.delivered,
      forwarded: workers.iter().map(|w| w.forwarded).sum(),
      rejected: workers.iter().map(|w| w.rejected).sum(),
      duplicates: aggregate.duplicates,
      terminations_sent: dispatch.terminations_sent,
      workers_finished,
    }
  }
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
  /// Matching records, sorted and unique by name.
  pub results: ResultSet,
  /// Counters from every stage.
  pub stats: PipelineStats,
}

/// Builder for [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
  config: PipelineConfig,
}

impl PipelineBuilder {
  /// Number of workers in the pool.
  #[must_use]
  pub fn worker_count(mut self, worker_count: usize) -> Self {
    self.config = self.config.with_worker_count(worker_count);
    self
  }

  /// Predicate the workers apply.
  #[must_use]
  pub fn threshold(mut self, threshold: Threshold) -> Self {
    self.config = self.config.with_threshold(threshold);
    self
  }

  /// Capacity of the worker to aggregator channel.
  #[must_use]
  pub fn forward_capacity(mut self, forward_capacity: usize) -> Self {
    self.config = self.config.with_forward_capacity(forward_capacity);
    self
  }

  /// Whether [`Submitter::submit_all`] treats a `"NULL"` record as end of input.
  #[must_use]
  pub fn legacy_sentinel(mut self, enabled: bool) -> Self {
    self.config = self.config.with_legacy_sentinel(enabled);
    self
  }

  /// Validates the settings and builds the pipeline.
  ///
  /// # Errors
  ///
  /// [`SieveError::Config`] if the settings are unusable.
  pub fn build(self) -> Result<Pipeline, SieveError> {
    Pipeline::new(self.config)
  }
}

/// A configured, not yet started pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
  config: PipelineConfig,
}

impl Pipeline {
  /// Creates a pipeline from validated settings.
  ///
  /// # Errors
  ///
  /// [`SieveError::Config`] if `config` fails [`PipelineConfig::validate`].
  pub fn new(config: PipelineConfig) -> Result<Self, SieveError> {
    config.validate()?;
    Ok(Self { config })
  }

  /// Starts from the default settings.
  pub fn builder() -> PipelineBuilder {
    PipelineBuilder::default()
  }

  /// The settings this pipeline runs with.
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Spawns every stage and returns a handle for feeding them.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(&self) -> RunningPipeline {
    let config = &self.config;
    info!(
      component = "pipeline",
      workers = config.worker_count,
      threshold = %config.threshold,
      "starting pipeline"
    );

    let (dispatcher, submit, pull) = Dispatcher::new(config.worker_count);
    let dispatcher = dispatcher.spawn();

    let (forward_tx, forward_rx) = mpsc::channel(config.forward_capacity);
    let pool = WorkerPool::spawn(config.worker_count, config.threshold, pull, forward_tx);

    let (result_tx, result_rx) = oneshot::channel();
    let aggregator = Aggregator::new().spawn(forward_rx, result_tx);

    RunningPipeline {
      submitter: Submitter::new(submit, config.legacy_sentinel),
      dispatcher,
      pool,
      aggregator,
      results: result_rx,
    }
  }

  /// Runs the pipeline over `records` and waits for the result.
  ///
  /// # Errors
  ///
  /// Any [`PipelineError`] from submitting or from a failed stage.
  pub async fn run<I>(&self, records: I) -> Result<PipelineOutcome, PipelineError>
  where
    I: IntoIterator<Item = Record>,
  {
    let mut running = self.start();
    running.submitter().submit_all(records)?;
    running.wait().await
  }

  /// Runs the pipeline over everything `producer` yields.
  ///
  /// Legacy sentinel translation applies as it does for
  /// [`Submitter::submit_all`]. The producer is borrowed so that the caller
  /// can still ask it how reading went.
  ///
  /// # Errors
  ///
  /// Any [`PipelineError`] from submitting or from a failed stage.
  pub async fn run_producer<P>(&self, producer: &mut P) -> Result<PipelineOutcome, PipelineError>
  where
    P: Producer<Output = Record>,
  {
    let mut running = self.start();
    let mut stream = Box::pin(producer.produce());
    while let Some(record) = stream.next().await {
      if !running.submitter().offer(record)? {
        break;
      }
    }
    running.wait().await
  }
}

/// Feeds records into a running pipeline.
#[derive(Debug)]
pub struct Submitter {
  handle: Option<SubmitHandle>,
  legacy_sentinel: bool,
  submitted: usize,
}

impl Submitter {
  fn new(handle: SubmitHandle, legacy_sentinel: bool) -> Self {
    Self {
      handle: Some(handle),
      legacy_sentinel,
      submitted: 0,
    }
  }

  /// Queues one record as data, whatever its name.
  ///
  /// A record offered after [`Submitter::finish`] is dropped with a warning.
  ///
  /// # Errors
  ///
  /// [`PipelineError::DispatcherGone`] if the dispatcher already exited.
  pub fn submit(&mut self, record: Record) -> Result<(), PipelineError> {
    let Some(handle) = &self.handle else {
      warn!(
        component = "pipeline",
        record = %record,
        "submission after end of input dropped"
      );
      return Ok(());
    };
    handle.submit(record)?;
    self.submitted += 1;
    Ok(())
  }

  /// Queues every record from `records`.
  ///
  /// With legacy sentinel translation enabled, a `"NULL"` record ends the input
  /// and the remaining records are not read.
  ///
  /// # Errors
  ///
  /// [`PipelineError::DispatcherGone`] if the dispatcher already exited.
  pub fn submit_all<I>(&mut self, records: I) -> Result<(), PipelineError>
  where
    I: IntoIterator<Item = Record>,
  {
    for record in records {
      if !self.offer(record)? {
        break;
      }
    }
    Ok(())
  }

  /// Signals end of input. Further calls do nothing.
  ///
  /// # Errors
  ///
  /// [`PipelineError::DispatcherGone`] if the dispatcher already exited.
  pub fn finish(&mut self) -> Result<(), PipelineError> {
    match self.handle.take() {
      Some(handle) => {
        debug!(
          component = "pipeline",
          submitted = self.submitted,
          "end of input"
        );
        handle.finish()
      }
      None => Ok(()),
    }
  }

  /// Records queued so far.
  pub fn submitted(&self) -> usize {
    self.submitted
  }

  /// Returns `true` once end of input has been signalled.
  pub fn is_finished(&self) -> bool {
    self.handle.is_none()
  }

  /// Submits `record`, translating a legacy sentinel when enabled. Returns
  /// `false` once the input has ended.
  fn offer(&mut self, record: Record) -> Result<bool, PipelineError> {
    if self.legacy_sentinel && record.is_sentinel() {
      if let Some(handle) = self.handle.take() {
        debug!(
          component = "pipeline",
          submitted = self.submitted,
          "legacy sentinel translated to end of input"
        );
        handle.send(Submission::EndOfInput)?;
      }
      return Ok(false);
    }
    self.submit(record)?;
    Ok(!self.is_finished())
  }
}

/// A started pipeline: feed it through [`RunningPipeline::submitter`], then
/// [`RunningPipeline::wait`] for the result.
#[derive(Debug)]
pub struct RunningPipeline {
  submitter: Submitter,
  dispatcher: JoinHandle<DispatchReport>,
  pool: WorkerPool,
  aggregator: JoinHandle<AggregateReport>,
  results: oneshot::Receiver<ResultSet>,
}

impl RunningPipeline {
  /// The submission side of the pipeline.
  pub fn submitter(&mut self) -> &mut Submitter {
    &mut self.submitter
  }

  /// Signals end of input if that has not happened yet, waits for the
  /// aggregator's result set, and joins every stage.
  ///
  /// # Errors
  ///
  /// [`PipelineError::TaskFailed`] if a stage panicked, or
  /// [`PipelineError::AggregatorDropped`] if no result set was emitted.
  pub async fn wait(mut self) -> Result<PipelineOutcome, PipelineError> {
    self.submitter.finish()?;

    let results = match self.results.await {
      Ok(results) => results,
      Err(_) => {
        return Err(match self.aggregator.await {
          Err(e) => PipelineError::task_failed("aggregator", e),
          Ok(_) => PipelineError::AggregatorDropped,
        });
      }
    };

    let latch = Arc::clone(self.pool.latch());
    let workers = self.pool.join().await?;
    let dispatch = self
      .dispatcher
      .await
      .map_err(|e| PipelineError::task_failed("dispatcher", e))?;
    let aggregate = self
      .aggregator
      .await
      .map_err(|e| PipelineError::task_failed("aggregator", e))?;

    if dispatch.ignored_after_end > 0 || dispatch.undelivered > 0 {
      warn!(
        component = "pipeline",
        ignored_after_end = dispatch.ignored_after_end,
        undelivered = dispatch.undelivered,
        "records were not processed"
      );
    }

    let stats = PipelineStats::collect(
      self.submitter.submitted(),
      &dispatch,
      &workers,
      &aggregate,
      latch.arrived(),
    );
    info!(
      component = "pipeline",
      submitted = stats.submitted,
      forwarded = stats.forwarded,
      duplicates = stats.duplicates,
      results = results.len(),
      "pipeline finished"
    );
    Ok(PipelineOutcome { results, stats })
  }
}
