//! Configuration for the pipeline, the record reader and the CLI run.
//!
//! All types deserialize from JSON with every field optional; missing fields
//! take the defaults below. [`SieveConfig::from_json_file`] loads and
//! validates in one step.
//!
//! ```json
//! {
//!   "input": "f3.txt",
//!   "output": "output.txt",
//!   "pipeline": { "worker_count": 3, "threshold": { "min_count": 200, "min_score": 6.0 } },
//!   "reader": { "delimiter": "," }
//! }
//! ```

use crate::error::SieveError;
use crate::record::Threshold;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of workers in the pool.
pub const DEFAULT_WORKER_COUNT: usize = 3;
/// Default capacity of the worker → aggregator channel.
pub const DEFAULT_FORWARD_CAPACITY: usize = 64;

/// Settings for the concurrent core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Number of workers pulling from the dispatcher. Must be at least 1.
  pub worker_count: usize,
  /// Capacity of the channel from workers to the aggregator. Must be at least 1.
  pub forward_capacity: usize,
  /// Predicate applied by workers and re-applied by the report writer.
  pub threshold: Threshold,
  /// Translate a submitted record named `"NULL"` into end of input.
  pub legacy_sentinel: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      worker_count: DEFAULT_WORKER_COUNT,
      forward_capacity: DEFAULT_FORWARD_CAPACITY,
      threshold: Threshold::default(),
      legacy_sentinel: false,
    }
  }
}

impl PipelineConfig {
  /// Sets the worker count.
  #[must_use]
  pub fn with_worker_count(mut self, worker_count: usize) -> Self {
    self.worker_count = worker_count;
    self
  }

  /// Sets the forward channel capacity.
  #[must_use]
  pub fn with_forward_capacity(mut self, forward_capacity: usize) -> Self {
    self.forward_capacity = forward_capacity;
    self
  }

  /// Sets the threshold predicate.
  #[must_use]
  pub fn with_threshold(mut self, threshold: Threshold) -> Self {
    self.threshold = threshold;
    self
  }

  /// Enables or disables legacy sentinel translation.
  #[must_use]
  pub fn with_legacy_sentinel(mut self, enabled: bool) -> Self {
    self.legacy_sentinel = enabled;
    self
  }

  /// Checks the settings the pipeline cannot run without.
  ///
  /// # Errors
  ///
  /// Returns [`SieveError::Config`] for a zero worker count, a zero forward
  /// capacity, or a NaN score bound.
  pub fn validate(&self) -> Result<(), SieveError> {
    if self.worker_count == 0 {
      return Err(SieveError::Config("worker_count must be >= 1".to_string()));
    }
    if self.forward_capacity == 0 {
      return Err(SieveError::Config(
        "forward_capacity must be >= 1".to_string(),
      ));
    }
    if self.threshold.min_score.is_nan() {
      return Err(SieveError::Config(
        "threshold.min_score must be a number".to_string(),
      ));
    }
    Ok(())
  }
}

/// Settings for decoding delimited input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
  /// Field separator.
  pub delimiter: char,
}

impl Default for ReaderConfig {
  fn default() -> Self {
    Self { delimiter: ',' }
  }
}

impl ReaderConfig {
  /// Sets the field separator.
  #[must_use]
  pub fn with_delimiter(mut self, delimiter: char) -> Self {
    self.delimiter = delimiter;
    self
  }
}

/// Everything one CLI run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SieveConfig {
  /// Delimited input file.
  pub input: PathBuf,
  /// Report destination.
  pub output: PathBuf,
  /// Core settings.
  pub pipeline: PipelineConfig,
  /// Input decoding settings.
  pub reader: ReaderConfig,
}

impl Default for SieveConfig {
  fn default() -> Self {
    Self {
      input: PathBuf::from("f3.txt"),
      output: PathBuf::from("output.txt"),
      pipeline: PipelineConfig::default(),
      reader: ReaderConfig::default(),
    }
  }
}

impl SieveConfig {
  /// Reads, parses and validates a JSON configuration file.
  ///
  /// # Errors
  ///
  /// [`SieveError::ConfigRead`] if the file cannot be read,
  /// [`SieveError::ConfigParse`] if it is not valid JSON for this type, and
  /// [`SieveError::Config`] if validation fails.
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SieveError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SieveError::ConfigRead {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&text)
  }

  /// Parses and validates a JSON configuration string.
  ///
  /// # Errors
  ///
  /// See [`SieveConfig::from_json_file`].
  pub fn from_json_str(text: &str) -> Result<Self, SieveError> {
    let config: Self = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  /// Validates the nested pipeline settings.
  ///
  /// # Errors
  ///
  /// See [`PipelineConfig::validate`].
  pub fn validate(&self) -> Result<(), SieveError> {
    self.pipeline.validate()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn test_defaults() {
    let config = SieveConfig::default();
    assert_eq!(config.input, PathBuf::from("f3.txt"));
    assert_eq!(config.output, PathBuf::from("output.txt"));
    assert_eq!(config.pipeline.worker_count, 3);
    assert_eq!(config.pipeline.threshold, Threshold::default());
    assert!(!config.pipeline.legacy_sentinel);
    assert_eq!(config.reader.delimiter, ',');
  }

  #[test]
  fn test_partial_json_fills_defaults() {
    let config =
      SieveConfig::from_json_str(r#"{"pipeline": {"worker_count": 5}, "reader": {"delimiter": ";"}}"#)
        .unwrap();
    assert_eq!(config.pipeline.worker_count, 5);
    assert_eq!(config.pipeline.forward_capacity, DEFAULT_FORWARD_CAPACITY);
    assert_eq!(config.reader.delimiter, ';');
    assert_eq!(config.input, PathBuf::from("f3.txt"));
  }

  #[test]
  fn test_zero_workers_rejected() {
    let err = SieveConfig::from_json_str(r#"{"pipeline": {"worker_count": 0}}"#).unwrap_err();
    assert!(matches!(err, SieveError::Config(_)));
    assert!(PipelineConfig::default().with_worker_count(1).validate().is_ok());
  }

  #[test]
  fn test_zero_capacity_rejected() {
    let result = PipelineConfig::default().with_forward_capacity(0).validate();
    assert!(matches!(result, Err(SieveError::Config(_))));
  }

  #[test]
  fn test_malformed_json() {
    let err = SieveConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, SieveError::ConfigParse(_)));
  }

  #[test]
  fn test_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"output": "report.txt"}}"#).unwrap();
    let config = SieveConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.output, PathBuf::from("report.txt"));

    let missing = SieveConfig::from_json_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(missing, SieveError::ConfigRead { .. }));
  }
}
