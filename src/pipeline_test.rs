//! # Pipeline Test Suite
//!
//! End-to-end runs of the dispatcher, worker pool and aggregator through the
//! driver, including the termination handshake for a range of pool sizes and
//! the properties every result set must satisfy.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, SieveError};
use crate::pipeline::{Pipeline, PipelineStats};
use crate::producers::RecordReader;
use crate::record::{Record, Threshold};
use proptest::prelude::*;
use tokio::io::BufReader;

fn scenario() -> Vec<Record> {
  vec![
    Record::new("Alice", 250, 7.0),
    Record::new("Bob", 150, 8.0),
    Record::new("Cara", 300, 6.5),
    Record::new("Alice", 400, 9.0),
  ]
}

fn pipeline(workers: usize) -> Pipeline {
  Pipeline::builder().worker_count(workers).build().unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_builder_defaults() {
  let pipeline = Pipeline::builder().build().unwrap();
  assert_eq!(pipeline.config(), &PipelineConfig::default());
  assert_eq!(pipeline.config().worker_count, 3);
}

#[test]
fn test_zero_workers_rejected() {
  let err = Pipeline::builder().worker_count(0).build().unwrap_err();
  assert!(matches!(err, SieveError::Config(_)));

  let err = Pipeline::new(PipelineConfig::default().with_forward_capacity(0)).unwrap_err();
  assert!(matches!(err, SieveError::Config(_)));
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_keeps_one_alice_and_cara() {
  let outcome = pipeline(3).run(scenario()).await.unwrap();

  assert_eq!(outcome.results.names(), vec!["Alice", "Cara"]);
  let alice = outcome.results.get("Alice").unwrap();
  // Either Alice row may reach the aggregator first.
  assert!(
    (alice.count(), alice.score()) == (250, 7.0) || (alice.count(), alice.score()) == (400, 9.0)
  );
  assert_eq!(outcome.results.get("Cara"), Some(&Record::new("Cara", 300, 6.5)));

  assert_eq!(
    outcome.stats,
    PipelineStats {
      submitted: 4,
      delivered: 4,
      forwarded: 3,
      rejected: 1,
      duplicates: 1,
      terminations_sent: 3,
      workers_finished: 3,
    }
  );
}

#[tokio::test]
async fn test_empty_input_yields_empty_set() {
  let outcome = pipeline(3).run(Vec::new()).await.unwrap();
  assert!(outcome.results.is_empty());
  assert_eq!(outcome.stats.terminations_sent, 3);
  assert_eq!(outcome.stats.workers_finished, 3);
}

#[tokio::test]
async fn test_end_of_input_only() {
  let mut running = pipeline(2).start();
  running.submitter().finish().unwrap();
  assert!(running.submitter().is_finished());
  // A second finish is a no-op.
  running.submitter().finish().unwrap();

  let outcome = running.wait().await.unwrap();
  assert!(outcome.results.is_empty());
  assert_eq!(outcome.stats.submitted, 0);
  assert_eq!(outcome.stats.terminations_sent, 2);
}

#[tokio::test]
async fn test_wait_without_finish_ends_input() {
  let mut running = pipeline(2).start();
  running.submitter().submit(Record::new("Cara", 300, 6.5)).unwrap();
  let outcome = running.wait().await.unwrap();
  assert_eq!(outcome.results.names(), vec!["Cara"]);
}

#[tokio::test]
async fn test_submit_after_finish_is_dropped() {
  let mut running = pipeline(1).start();
  let submitter = running.submitter();
  submitter.submit(Record::new("Alice", 250, 7.0)).unwrap();
  submitter.finish().unwrap();
  submitter.submit(Record::new("Cara", 300, 6.5)).unwrap();
  assert_eq!(submitter.submitted(), 1);

  let outcome = running.wait().await.unwrap();
  assert_eq!(outcome.results.names(), vec!["Alice"]);
}

#[tokio::test]
async fn test_custom_threshold() {
  let outcome = Pipeline::builder()
    .threshold(Threshold::new(100, 8.0))
    .build()
    .unwrap()
    .run(scenario())
    .await
    .unwrap();
  assert_eq!(outcome.results.names(), vec!["Alice", "Bob"]);
  assert_eq!(outcome.results.get("Alice").map(Record::count), Some(400));
}

// ============================================================================
// End-of-input marker
// ============================================================================

#[tokio::test]
async fn test_null_name_is_data_by_default() {
  let outcome = pipeline(2)
    .run(vec![
      Record::new("NULL", 500, 9.0),
      Record::new("Cara", 300, 6.5),
    ])
    .await
    .unwrap();
  assert_eq!(outcome.results.names(), vec!["Cara", "NULL"]);
}

#[tokio::test]
async fn test_legacy_sentinel_ends_input() {
  let outcome = Pipeline::builder()
    .legacy_sentinel(true)
    .build()
    .unwrap()
    .run(vec![
      Record::new("Cara", 300, 6.5),
      Record::sentinel(),
      Record::new("Alice", 250, 7.0),
    ])
    .await
    .unwrap();
  assert_eq!(outcome.results.names(), vec!["Cara"]);
  assert_eq!(outcome.stats.submitted, 1);
}

// ============================================================================
// Termination handshake
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_n_terminations() {
  for workers in 1..=8 {
    let records: Vec<Record> = (0..50)
      .map(|i| Record::new(format!("r{:02}", i % 20), 200 + i, 6.0 + (i % 3) as f64))
      .collect();
    let outcome = pipeline(workers).run(records).await.unwrap();

    assert_eq!(outcome.stats.terminations_sent, workers, "workers = {workers}");
    assert_eq!(outcome.stats.workers_finished, workers, "workers = {workers}");
    assert_eq!(outcome.stats.delivered, 50);
    assert_eq!(outcome.results.len(), 20);
    assert_eq!(
      outcome.stats.forwarded,
      outcome.results.len() + outcome.stats.duplicates
    );
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_more_workers_than_records() {
  let outcome = pipeline(8)
    .run(vec![Record::new("Cara", 300, 6.5)])
    .await
    .unwrap();
  assert_eq!(outcome.results.len(), 1);
  assert_eq!(outcome.stats.terminations_sent, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_repeated_runs_agree_on_membership_and_order() {
  let records: Vec<Record> = (0..200)
    .map(|i| Record::new(format!("n{}", i % 37), 150 + i, 5.0 + (i % 5) as f64))
    .collect();
  let pipeline = pipeline(4);

  let first = pipeline.run(records.clone()).await.unwrap().results;
  for _ in 0..5 {
    let again = pipeline.run(records.clone()).await.unwrap().results;
    // The winning duplicate may differ between runs.
    assert_eq!(again.names(), first.names());
  }
}

// ============================================================================
// Producer input
// ============================================================================

#[tokio::test]
async fn test_run_producer() {
  let text = "Alice,250,7.0\nBob,150,8.0\nnot a record\nCara,300,6.5\nAlice,400,9.0\n";
  let mut reader = RecordReader::from_reader(BufReader::new(text.as_bytes()));
  let outcome = pipeline(3).run_producer(&mut reader).await.unwrap();
  reader.finish().unwrap();
  assert_eq!(outcome.results.names(), vec!["Alice", "Cara"]);
  assert_eq!(outcome.stats.submitted, 4);
}

#[tokio::test]
async fn test_run_producer_with_legacy_sentinel() {
  let text = "Cara,300,6.5\nNULL,0,0\nAlice,250,7.0\n";
  let mut reader = RecordReader::from_reader(BufReader::new(text.as_bytes()));
  let outcome = Pipeline::builder()
    .legacy_sentinel(true)
    .build()
    .unwrap()
    .run_producer(&mut reader)
    .await
    .unwrap();
  assert_eq!(outcome.results.names(), vec!["Cara"]);
}

#[test]
fn test_pipeline_error_converts() {
  let err: SieveError = PipelineError::AggregatorDropped.into();
  assert_eq!(
    err.to_string(),
    "aggregator exited without emitting a result set"
  );
}

// ============================================================================
// Properties
// ============================================================================

fn record_strategy() -> impl Strategy<Value = Record> {
  ("[A-Za-z]{1,3}", 0i64..400, 0.0f64..10.0)
    .prop_map(|(name, count, score)| Record::new(name, count, score))
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(32))]

  #[test]
  fn test_results_match_sorted_unique(
    records in prop::collection::vec(record_strategy(), 0..80),
    workers in 1usize..6,
  ) {
    let outcome = tokio_test::block_on(pipeline(workers).run(records.clone())).unwrap();
    let threshold = Threshold::default();

    prop_assert!(outcome.results.iter().all(|r| threshold.matches(r)));
    let names = outcome.results.names();
    prop_assert!(names.windows(2).all(|w| w[0] < w[1]));

    // Every result is one of the submitted matching rows.
    for result in outcome.results.iter() {
      prop_assert!(records.contains(result));
    }

    let mut expected: Vec<&str> = records
      .iter()
      .filter(|r| threshold.matches(r))
      .map(Record::name)
      .collect();
    expected.sort();
    expected.dedup();
    prop_assert_eq!(names, expected);
    prop_assert_eq!(outcome.stats.terminations_sent, workers);
  }
}
