//! # Dispatcher
//!
//! Single owner of the pending-record queue. Records arrive over the
//! submission channel; workers ask for them one at a time over the pull
//! channel.
//!
//! ## Pull rendezvous
//!
//! Every pull request carries a one-shot reply slot and is answered exactly
//! once, with either [`Delivery::Record`] or [`Delivery::Terminate`]. A request
//! that arrives while the queue is empty is parked until a submission (or end
//! of input) can satisfy it, so workers suspend instead of polling.
//!
//! ## Termination
//!
//! End of input is an explicit [`Submission::EndOfInput`] message queued behind
//! every record submitted before it. Once the queue drains down to that marker
//! the dispatcher answers the next `worker_count` requests with
//! [`Delivery::Terminate`] and exits. Dropping the [`SubmitHandle`] without
//! calling [`SubmitHandle::finish`] is treated the same way.

use crate::error::PipelineError;
use crate::record::Record;
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// A message on the submission path.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
  /// A record to queue.
  Data(Record),
  /// No more records will follow.
  EndOfInput,
}

/// The single answer to a pull request.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
  /// The next queued record.
  Record(Record),
  /// Input is exhausted; the requester should stop.
  Terminate,
}

struct PullRequest {
  reply: oneshot::Sender<Delivery>,
}

/// Counters returned when the dispatcher exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
  /// Records submitted before end of input.
  pub received: usize,
  /// Records handed to a requester.
  pub delivered: usize,
  /// Termination signals handed to a requester.
  pub terminations_sent: usize,
  /// Records submitted after end of input and dropped.
  pub ignored_after_end: usize,
  /// Records still queued when the dispatcher exited.
  pub undelivered: usize,
}

/// Sending side of the submission path. Owned by the pipeline driver.
#[derive(Debug)]
pub struct SubmitHandle {
  submissions: mpsc::UnboundedSender<Submission>,
}

impl SubmitHandle {
  /// Queues a record. Never waits.
  ///
  /// # Errors
  ///
  /// [`PipelineError::DispatcherGone`] if the dispatcher already exited.
  pub fn submit(&self, record: Record) -> Result<(), PipelineError> {
    self.send(Submission::Data(record))
  }

  /// Sends a raw submission message.
  ///
  /// # Errors
  ///
  /// [`PipelineError::DispatcherGone`] if the dispatcher already exited.
  pub fn send(&self, submission: Submission) -> Result<(), PipelineError> {
    self
      .submissions
      .send(submission)
      .map_err(|_| PipelineError::DispatcherGone)
  }

  /// Queues the end-of-input marker and closes the submission path.
  ///
  /// # Errors
  ///
  /// [`PipelineError::DispatcherGone`] if the dispatcher already exited.
  pub fn finish(self) -> Result<(), PipelineError> {
    self.send(Submission::EndOfInput)
  }
}

/// Requesting side of the pull path. Cloned once per worker.
#[derive(Debug, Clone)]
pub struct PullHandle {
  requests: mpsc::UnboundedSender<PullRequest>,
}

impl std::fmt::Debug for PullRequest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PullRequest").finish_non_exhaustive()
  }
}

impl PullHandle {
  /// Asks for the next record and waits for the answer.
  ///
  /// Resolves to [`Delivery::Terminate`] if the dispatcher has gone away, so a
  /// caller never waits on a dispatcher that can no longer answer.
  pub async fn pull(&self) -> Delivery {
    let (reply, response) = oneshot::channel();
    if self.requests.send(PullRequest { reply }).is_err() {
      return Delivery::Terminate;
    }
    response.await.unwrap_or(Delivery::Terminate)
  }
}

/// The dispatcher task state.
#[derive(Debug)]
pub struct Dispatcher {
  worker_count: usize,
  pending: VecDeque<Record>,
  waiting: VecDeque<oneshot::Sender<Delivery>>,
  end_of_input: bool,
  submissions_open: bool,
  submissions: mpsc::UnboundedReceiver<Submission>,
  requests: mpsc::UnboundedReceiver<PullRequest>,
  report: DispatchReport,
}

impl Dispatcher {
  /// Creates a dispatcher that will send `worker_count` termination signals.
  pub fn new(worker_count: usize) -> (Self, SubmitHandle, PullHandle) {
    let (submit_tx, submit_rx) = mpsc::unbounded_channel();
    let (pull_tx, pull_rx) = mpsc::unbounded_channel();
    let dispatcher = Self {
      worker_count,
      pending: VecDeque::new(),
      waiting: VecDeque::new(),
      end_of_input: false,
      submissions_open: true,
      submissions: submit_rx,
      requests: pull_rx,
      report: DispatchReport::default(),
    };
    (
      dispatcher,
      SubmitHandle {
        submissions: submit_tx,
      },
      PullHandle { requests: pull_tx },
    )
  }

  /// Runs the dispatcher on its own task.
  pub fn spawn(self) -> JoinHandle<DispatchReport> {
    tokio::spawn(self.run())
  }

  /// Serves submissions and pull requests until every worker was told to
  /// terminate, or until no requester is left.
  pub async fn run(mut self) -> DispatchReport {
    debug!(
      component = "dispatcher",
      worker_count = self.worker_count,
      "dispatcher started"
    );
    loop {
      self.serve_waiting();
      if self.report.terminations_sent >= self.worker_count {
        break;
      }

      tokio::select! {
        submission = self.submissions.recv(), if self.submissions_open => {
          self.accept(submission);
        }
        request = self.requests.recv() => match request {
          Some(request) => self.waiting.push_back(request.reply),
          None => {
            warn!(
              component = "dispatcher",
              terminations_sent = self.report.terminations_sent,
              "all requesters disconnected before termination completed"
            );
            break;
          }
        },
      }
    }

    self.report.undelivered = self.pending.len();
    debug!(
      component = "dispatcher",
      delivered = self.report.delivered,
      terminations_sent = self.report.terminations_sent,
      "dispatcher terminated"
    );
    self.report
  }

  fn accept(&mut self, submission: Option<Submission>) {
    match submission {
      Some(Submission::Data(record)) if self.end_of_input => {
        self.report.ignored_after_end += 1;
        warn!(
          component = "dispatcher",
          record = %record,
          "submission after end of input ignored"
        );
      }
      Some(Submission::Data(record)) => {
        trace!(component = "dispatcher", record = %record, "queued");
        self.report.received += 1;
        self.pending.push_back(record);
      }
      Some(Submission::EndOfInput) => {
        if !self.end_of_input {
          debug!(
            component = "dispatcher",
            pending = self.pending.len(),
            "end of input queued"
          );
        }
        self.end_of_input = true;
      }
      None => {
        self.submissions_open = false;
        if !self.end_of_input {
          warn!(
            component = "dispatcher",
            "submission handle dropped without end of input; treating as end of input"
          );
          self.end_of_input = true;
        }
      }
    }
  }

  /// Answers parked requests, oldest first, for as long as there is something
  /// to answer them with.
  fn serve_waiting(&mut self) {
    while let Some(reply) = self.waiting.pop_front() {
      if let Some(record) = self.pending.pop_front() {
        match reply.send(Delivery::Record(record)) {
          Ok(()) => self.report.delivered += 1,
          // Requester gave up; keep the record for the next one.
          Err(Delivery::Record(record)) => self.pending.push_front(record),
          Err(Delivery::Terminate) => {}
        }
      } else if self.end_of_input {
        if self.report.terminations_sent < self.worker_count
          && reply.send(Delivery::Terminate).is_ok()
        {
          self.report.terminations_sent += 1;
          trace!(
            component = "dispatcher",
            terminations_sent = self.report.terminations_sent,
            "termination sent"
          );
        }
      } else {
        self.waiting.push_front(reply);
        break;
      }
    }
  }
}
