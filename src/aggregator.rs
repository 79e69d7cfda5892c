//! # Aggregator
//!
//! The single sequential consumer of everything the worker pool forwards.
//! Records are folded into a [`ResultSet`] kept sorted by name with at most
//! one entry per name. Because only the aggregator task touches the set while
//! it is being built, no locking is involved.
//!
//! Workers race, so when two matching records share a name, which one
//! survives depends on which reached the aggregator first. The set keeps the
//! first arrival and discards the rest.

use crate::consumer::{Consumer, ConsumerConfig};
use crate::input::Input;
use crate::record::Record;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

/// Records sorted ascending by name, unique by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
  records: Vec<Record>,
}

impl ResultSet {
  /// Creates an empty set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts `record` at its sorted position.
  ///
  /// Returns `false` and leaves the set unchanged if an entry with the same
  /// name is already present.
  pub fn insert(&mut self, record: Record) -> bool {
    match self
      .records
      .binary_search_by(|probe| probe.name().cmp(record.name()))
    {
      Ok(_) => false,
      Err(index) => {
        self.records.insert(index, record);
        true
      }
    }
  }

  /// Looks up the entry for `name`.
  pub fn get(&self, name: &str) -> Option<&Record> {
    self
      .records
      .binary_search_by(|probe| probe.name().cmp(name))
      .ok()
      .map(|index| &self.records[index])
  }

  /// Number of entries.
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Returns `true` if the set is empty.
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Iterates entries in name order.
  pub fn iter(&self) -> std::slice::Iter<'_, Record> {
    self.records.iter()
  }

  /// Entry names in order.
  pub fn names(&self) -> Vec<&str> {
    self.records.iter().map(Record::name).collect()
  }

  /// Entries as a sorted slice.
  pub fn as_slice(&self) -> &[Record] {
    &self.records
  }

  /// Consumes the set into its sorted entries.
  pub fn into_vec(self) -> Vec<Record> {
    self.records
  }
}

impl FromIterator<Record> for ResultSet {
  fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
    let mut set = ResultSet::new();
    for record in iter {
      set.insert(record);
    }
    set
  }
}

impl IntoIterator for ResultSet {
  type Item = Record;
  type IntoIter = std::vec::IntoIter<Record>;

  fn into_iter(self) -> Self::IntoIter {
    self.records.into_iter()
  }
}

impl<'a> IntoIterator for &'a ResultSet {
  type Item = &'a Record;
  type IntoIter = std::slice::Iter<'a, Record>;

  fn into_iter(self) -> Self::IntoIter {
    self.records.iter()
  }
}

/// Counters returned when the aggregator exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateReport {
  /// Records inserted into the set.
  pub accepted: usize,
  /// Records discarded because their name was already present.
  pub duplicates: usize,
}

/// Folds forwarded records into a [`ResultSet`].
#[derive(Debug, Clone)]
pub struct Aggregator {
  result_set: ResultSet,
  duplicates: usize,
  config: ConsumerConfig,
}

impl Default for Aggregator {
  fn default() -> Self {
    Self::new()
  }
}

impl Aggregator {
  /// Creates an aggregator with an empty set.
  pub fn new() -> Self {
    Self {
      result_set: ResultSet::new(),
      duplicates: 0,
      config: ConsumerConfig::default().with_name("aggregator".to_string()),
    }
  }

  /// The set accumulated so far.
  pub fn result_set(&self) -> &ResultSet {
    &self.result_set
  }

  /// Counters accumulated so far.
  pub fn report(&self) -> AggregateReport {
    AggregateReport {
      accepted: self.result_set.len(),
      duplicates: self.duplicates,
    }
  }

  /// Consumes the aggregator into its set.
  pub fn into_result_set(self) -> ResultSet {
    self.result_set
  }

  /// Runs the aggregator on its own task.
  ///
  /// Consumes `input` until every sender is dropped, then sends the finished
  /// set on `output` exactly once.
  pub fn spawn(
    mut self,
    input: mpsc::Receiver<Record>,
    output: oneshot::Sender<ResultSet>,
  ) -> JoinHandle<AggregateReport> {
    tokio::spawn(async move {
      self.consume(Box::pin(ReceiverStream::new(input))).await;
      let report = self.report();
      debug!(
        component = %self.config.name,
        accepted = report.accepted,
        duplicates = report.duplicates,
        "input closed; emitting result set"
      );
      if output.send(self.into_result_set()).is_err() {
        warn!(component = "aggregator", "result receiver dropped before emission");
      }
      report
    })
  }
}

impl Input for Aggregator {
  type Input = Record;
  type InputStream = Pin<Box<dyn Stream<Item = Record> + Send>>;
}

#[async_trait]
impl Consumer for Aggregator {
  async fn consume(&mut self, mut stream: Self::InputStream) {
    while let Some(record) = stream.next().await {
      if self.result_set.insert(record.clone()) {
        trace!(component = %self.config.name, record = %record, "inserted");
      } else {
        self.duplicates += 1;
        trace!(component = %self.config.name, record = %record, "duplicate discarded");
      }
    }
  }

  fn get_config_impl(&self) -> &ConsumerConfig {
    &self.config
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::stream;
  use proptest::prelude::*;

  #[test]
  fn test_insert_keeps_order_and_first_writer() {
    let mut set = ResultSet::new();
    assert!(set.insert(Record::new("Cara", 300, 6.5)));
    assert!(set.insert(Record::new("Alice", 250, 7.0)));
    assert!(set.insert(Record::new("Bea", 210, 6.1)));
    assert!(!set.insert(Record::new("Alice", 400, 9.0)));

    assert_eq!(set.names(), vec!["Alice", "Bea", "Cara"]);
    assert_eq!(set.get("Alice").map(Record::count), Some(250));
    assert_eq!(set.get("Zed"), None);
  }

  #[test]
  fn test_names_order_bytewise() {
    let set: ResultSet = ["b", "B", "a", "A", "_"]
      .into_iter()
      .map(|n| Record::new(n, 1, 1.0))
      .collect();
    assert_eq!(set.names(), vec!["A", "B", "_", "a", "b"]);
  }

  #[tokio::test]
  async fn test_consume_counts_duplicates() {
    let mut aggregator = Aggregator::new();
    let input = stream::iter(vec![
      Record::new("Alice", 250, 7.0),
      Record::new("Cara", 300, 6.5),
      Record::new("Alice", 400, 9.0),
    ]);
    aggregator.consume(Box::pin(input)).await;

    assert_eq!(
      aggregator.report(),
      AggregateReport {
        accepted: 2,
        duplicates: 1
      }
    );
    assert_eq!(aggregator.config().name(), "aggregator");
  }

  #[tokio::test]
  async fn test_spawn_emits_once_input_closes() {
    let (tx, rx) = mpsc::channel(4);
    let (out_tx, out_rx) = oneshot::channel();
    let task = Aggregator::new().spawn(rx, out_tx);

    tx.send(Record::new("z", 1, 1.0)).await.unwrap();
    tx.send(Record::new("a", 1, 1.0)).await.unwrap();
    drop(tx);

    let set = out_rx.await.unwrap();
    assert_eq!(set.names(), vec!["a", "z"]);
    assert_eq!(task.await.unwrap().accepted, 2);
  }

  #[tokio::test]
  async fn test_spawn_with_no_input_emits_empty_set() {
    let (tx, rx) = mpsc::channel::<Record>(1);
    let (out_tx, out_rx) = oneshot::channel();
    let task = Aggregator::new().spawn(rx, out_tx);
    drop(tx);

    assert!(out_rx.await.unwrap().is_empty());
    assert_eq!(task.await.unwrap(), AggregateReport::default());
  }

  proptest! {
    #[test]
    fn test_set_is_sorted_unique_first_wins(
      entries in prop::collection::vec(("[a-e]{1,2}", 0i64..1000), 0..60)
    ) {
      let set: ResultSet = entries
        .iter()
        .map(|(name, count)| Record::new(name.clone(), *count, 1.0))
        .collect();

      let names = set.names();
      prop_assert!(names.windows(2).all(|w| w[0] < w[1]));

      for record in set.iter() {
        let first = entries.iter().find(|(name, _)| name == record.name()).unwrap();
        prop_assert_eq!(record.count(), first.1);
      }

      let mut distinct: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
      distinct.sort();
      distinct.dedup();
      prop_assert_eq!(names, distinct);
    }
  }
}
