//! Records and the threshold predicate applied to them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name carried by the legacy in-band end-of-input record.
pub const SENTINEL_NAME: &str = "NULL";

/// An immutable input row: a name plus two numeric fields.
///
/// The name is the sort and deduplication key of the
/// [`ResultSet`](crate::aggregator::ResultSet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  name: String,
  count: i64,
  score: f64,
}

impl Record {
  /// Creates a record.
  pub fn new(name: impl Into<String>, count: i64, score: f64) -> Self {
    Self {
      name: name.into(),
      count,
      score,
    }
  }

  /// The legacy end-of-input marker (`"NULL"`, 0, 0.0).
  ///
  /// The pipeline itself signals end of input with
  /// [`Submission::EndOfInput`](crate::dispatcher::Submission::EndOfInput);
  /// this value only matters to callers that enable
  /// [`PipelineConfig::legacy_sentinel`](crate::config::PipelineConfig::legacy_sentinel).
  pub fn sentinel() -> Self {
    Self::new(SENTINEL_NAME, 0, 0.0)
  }

  /// Returns `true` if this record carries the legacy sentinel name.
  pub fn is_sentinel(&self) -> bool {
    self.name == SENTINEL_NAME
  }

  /// Sort and dedup key.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// The integer field.
  pub fn count(&self) -> i64 {
    self.count
  }

  /// The floating point field.
  pub fn score(&self) -> f64 {
    self.score
  }
}

impl fmt::Display for Record {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({}, {})", self.name, self.count, self.score)
  }
}

/// The filter predicate: `count >= min_count AND score >= min_score`.
///
/// Pure and stateless, so workers can evaluate it concurrently without
/// coordination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Threshold {
  /// Inclusive lower bound for [`Record::count`].
  pub min_count: i64,
  /// Inclusive lower bound for [`Record::score`].
  pub min_score: f64,
}

impl Default for Threshold {
  fn default() -> Self {
    Self {
      min_count: 200,
      min_score: 6.0,
    }
  }
}

impl Threshold {
  /// Creates a threshold with explicit bounds.
  pub fn new(min_count: i64, min_score: f64) -> Self {
    Self {
      min_count,
      min_score,
    }
  }

  /// Returns `true` if `record` passes both bounds.
  pub fn matches(&self, record: &Record) -> bool {
    record.count >= self.min_count && record.score >= self.min_score
  }
}

impl fmt::Display for Threshold {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "count >= {} && score >= {}", self.min_count, self.min_score)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn test_default_threshold_bounds_are_inclusive() {
    let threshold = Threshold::default();
    assert!(threshold.matches(&Record::new("edge", 200, 6.0)));
    assert!(!threshold.matches(&Record::new("low_count", 199, 9.0)));
    assert!(!threshold.matches(&Record::new("low_score", 900, 5.99)));
  }

  #[test]
  fn test_nan_score_never_matches() {
    assert!(!Threshold::default().matches(&Record::new("nan", 500, f64::NAN)));
  }

  #[test]
  fn test_sentinel() {
    let sentinel = Record::sentinel();
    assert!(sentinel.is_sentinel());
    assert_eq!(sentinel.count(), 0);
    assert!(!Record::new("Alice", 0, 0.0).is_sentinel());
  }

  #[test]
  fn test_threshold_deserializes_with_defaults() {
    let threshold: Threshold = serde_json::from_str(r#"{"min_score": 7.5}"#).unwrap();
    assert_eq!(threshold.min_count, 200);
    assert_eq!(threshold.min_score, 7.5);
  }

  proptest! {
    #[test]
    fn test_matches_is_conjunction(count in -1000i64..1000, score in -20.0f64..20.0) {
      let threshold = Threshold::default();
      let record = Record::new("x", count, score);
      prop_assert_eq!(threshold.matches(&record), count >= 200 && score >= 6.0);
    }
  }
}
