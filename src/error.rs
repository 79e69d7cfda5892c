//! # Error Handling
//!
//! Error types for the record sieve, split along the two places where
//! something can actually go wrong:
//!
//! - **Crate boundary** ([`SieveError`], [`PipelineError`]): opening the input,
//!   creating the report, loading configuration, and the rare case where a
//!   spawned pipeline task dies instead of finishing its protocol.
//! - **Stream level** ([`ErrorStrategy`], [`ErrorAction`], [`StreamError`]):
//!   per-item failures inside a producer or consumer, such as a line of the
//!   input file that cannot be decoded. The component's configured strategy
//!   decides whether the item is skipped or the stream stops.
//!
//! The concurrent core (dispatcher, workers, aggregator) has no data-dependent
//! failure mode. Everything it can report is a lifecycle failure.
//!
//! ## Example
//!
//! ```rust
//! use recordsieve::error::{ComponentInfo, ErrorAction, ErrorContext, ErrorStrategy, StreamError};
//!
//! let strategy = ErrorStrategy::<String>::Skip;
//! let error = StreamError::new(
//!     Box::new(std::io::Error::from(std::io::ErrorKind::InvalidData)),
//!     ErrorContext::default(),
//!     ComponentInfo::new("reader".to_string(), "RecordReader".to_string()),
//! );
//! assert_eq!(strategy.resolve(&error), ErrorAction::Skip);
//! ```

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Errors surfaced at the crate boundary.
///
/// Input and output file failures are fatal for a run; the driver and the
/// binary propagate them unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SieveError {
  /// The input file could not be opened.
  #[error("error opening input file {}: {source}", .path.display())]
  Open {
    /// Path that failed to open.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// Reading the input failed partway through and the input was cut short.
  #[error("error reading input file {}: {source}", .path.display())]
  Read {
    /// Path of the input being read.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// The report file could not be created.
  #[error("error creating result file {}: {source}", .path.display())]
  Create {
    /// Path that failed to be created.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// Writing the report failed after the file was created.
  #[error("error writing result file {}: {source}", .path.display())]
  Write {
    /// Path of the report being written.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// The configuration is structurally valid JSON but semantically invalid.
  #[error("invalid configuration: {0}")]
  Config(String),
  /// The configuration file could not be read.
  #[error("error reading configuration {}: {source}", .path.display())]
  ConfigRead {
    /// Path of the configuration file.
    path: PathBuf,
    /// Underlying I/O error.
    #[source]
    source: std::io::Error,
  },
  /// The configuration file is not valid JSON for [`crate::config::PipelineConfig`].
  #[error("error parsing configuration: {0}")]
  ConfigParse(#[from] serde_json::Error),
  /// The concurrent pipeline failed to run to completion.
  #[error(transparent)]
  Pipeline(#[from] PipelineError),
}

/// Lifecycle failures of the concurrent pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  /// A spawned task panicked or was cancelled.
  #[error("{component} task failed: {reason}")]
  TaskFailed {
    /// Which component the task was running.
    component: &'static str,
    /// Join error rendered as text.
    reason: String,
  },
  /// The aggregator finished without emitting its result set.
  #[error("aggregator exited without emitting a result set")]
  AggregatorDropped,
  /// A submission was attempted after the dispatcher had already exited.
  #[error("dispatcher is no longer accepting submissions")]
  DispatcherGone,
}

impl PipelineError {
  pub(crate) fn task_failed(component: &'static str, error: tokio::task::JoinError) -> Self {
    Self::TaskFailed {
      component,
      reason: error.to_string(),
    }
  }
}

/// Action to take when a stream component hits a per-item error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
  /// Stop the stream at this item.
  Stop,
  /// Drop the item and keep going.
  Skip,
  /// Try the item again.
  Retry,
}

type CustomErrorHandler<T> = Arc<dyn Fn(&StreamError<T>) -> ErrorAction + Send + Sync>;

/// Strategy a component applies to per-item errors.
///
/// ```rust
/// use recordsieve::error::{ErrorAction, ErrorStrategy};
///
/// let strategy = ErrorStrategy::<i32>::new_custom(|error| {
///     if error.retries < 2 { ErrorAction::Retry } else { ErrorAction::Stop }
/// });
/// assert!(matches!(strategy, ErrorStrategy::Custom(_)));
/// ```
pub enum ErrorStrategy<T> {
  /// Stop on the first error.
  Stop,
  /// Skip items that fail.
  Skip,
  /// Retry up to `n` times, then stop.
  Retry(usize),
  /// Decide per error.
  Custom(CustomErrorHandler<T>),
}

impl<T> Clone for ErrorStrategy<T> {
  fn clone(&self) -> Self {
    match self {
      ErrorStrategy::Stop => ErrorStrategy::Stop,
      ErrorStrategy::Skip => ErrorStrategy::Skip,
      ErrorStrategy::Retry(n) => ErrorStrategy::Retry(*n),
      ErrorStrategy::Custom(handler) => ErrorStrategy::Custom(handler.clone()),
    }
  }
}

impl<T> fmt::Debug for ErrorStrategy<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorStrategy::Stop => write!(f, "ErrorStrategy::Stop"),
      ErrorStrategy::Skip => write!(f, "ErrorStrategy::Skip"),
      ErrorStrategy::Retry(n) => write!(f, "ErrorStrategy::Retry({})", n),
      ErrorStrategy::Custom(_) => write!(f, "ErrorStrategy::Custom"),
    }
  }
}

impl<T> PartialEq for ErrorStrategy<T> {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (ErrorStrategy::Stop, ErrorStrategy::Stop) => true,
      (ErrorStrategy::Skip, ErrorStrategy::Skip) => true,
      (ErrorStrategy::Retry(n1), ErrorStrategy::Retry(n2)) => n1 == n2,
      (ErrorStrategy::Custom(_), ErrorStrategy::Custom(_)) => true,
      _ => false,
    }
  }
}

impl<T> ErrorStrategy<T> {
  /// Creates a custom strategy from a handler function.
  pub fn new_custom<F>(f: F) -> Self
  where
    F: Fn(&StreamError<T>) -> ErrorAction + Send + Sync + 'static,
  {
    Self::Custom(Arc::new(f))
  }

  /// Resolves the action this strategy takes for `error`.
  ///
  /// `Retry(n)` degrades to `Stop` once `error.retries` reaches `n`.
  pub fn resolve(&self, error: &StreamError<T>) -> ErrorAction {
    match self {
      ErrorStrategy::Stop => ErrorAction::Stop,
      ErrorStrategy::Skip => ErrorAction::Skip,
      ErrorStrategy::Retry(n) if error.retries < *n => ErrorAction::Retry,
      ErrorStrategy::Retry(_) => ErrorAction::Stop,
      ErrorStrategy::Custom(handler) => handler(error),
    }
  }
}

/// Error raised while processing a single stream item.
#[derive(Debug)]
pub struct StreamError<T> {
  /// The original error.
  pub source: Box<dyn Error + Send + Sync>,
  /// When and where it happened.
  pub context: ErrorContext<T>,
  /// The component that hit it.
  pub component: ComponentInfo,
  /// How many times the item has been retried.
  pub retries: usize,
}

impl<T> StreamError<T> {
  /// Creates a new error with `retries` set to 0.
  pub fn new(
    source: Box<dyn Error + Send + Sync>,
    context: ErrorContext<T>,
    component: ComponentInfo,
  ) -> Self {
    Self {
      source,
      context,
      component,
      retries: 0,
    }
  }
}

impl<T: Clone> Clone for StreamError<T> {
  fn clone(&self) -> Self {
    Self {
      source: Box::new(StringError(self.source.to_string())),
      context: self.context.clone(),
      component: self.component.clone(),
      retries: self.retries,
    }
  }
}

impl<T> fmt::Display for StreamError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Error in {} ({}): {}",
      self.component.name, self.component.type_name, self.source
    )
  }
}

impl<T: fmt::Debug> Error for StreamError<T> {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    Some(self.source.as_ref())
  }
}

/// An error carrying only a message.
#[derive(Debug)]
pub struct StringError(pub String);

impl fmt::Display for StringError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Error for StringError {}

/// When and where a stream error occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext<T> {
  /// Time of the failure.
  pub timestamp: chrono::DateTime<chrono::Utc>,
  /// The item being processed, if one was available.
  pub item: Option<T>,
  /// Name of the component.
  pub component_name: String,
  /// Type of the component.
  pub component_type: String,
}

impl<T> Default for ErrorContext<T> {
  fn default() -> Self {
    Self {
      timestamp: chrono::Utc::now(),
      item: None,
      component_name: "default".to_string(),
      component_type: "default".to_string(),
    }
  }
}

/// Name and type of a pipeline component, for logs and errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
  /// Component name.
  pub name: String,
  /// Component type name.
  pub type_name: String,
}

impl Default for ComponentInfo {
  fn default() -> Self {
    Self {
      name: "default".to_string(),
      type_name: "default".to_string(),
    }
  }
}

impl ComponentInfo {
  /// Creates a new `ComponentInfo`.
  pub fn new(name: String, type_name: String) -> Self {
    Self { name, type_name }
  }
}
