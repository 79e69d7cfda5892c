//! # recordsieve
//!
//! Concurrent filter-and-collect pipeline for delimited records.
//!
//! A [`dispatcher::Dispatcher`] hands records to a pool of workers one pull at
//! a time. Each [`worker::Worker`] tests its record against a
//! [`record::Threshold`] and forwards matches to a single
//! [`aggregator::Aggregator`], which folds them into a [`aggregator::ResultSet`]
//! sorted and unique by name. A [`latch::CompletionLatch`] closes the
//! aggregator's input once every worker has finished.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recordsieve::consumers::ReportWriter;
//! use recordsieve::pipeline::Pipeline;
//! use recordsieve::producers::RecordReader;
//! use recordsieve::record::Threshold;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), recordsieve::SieveError> {
//! let mut reader = RecordReader::open("f3.txt").await?;
//! let outcome = Pipeline::builder().build()?.run_producer(&mut reader).await?;
//! reader.finish()?;
//!
//! let mut writer = ReportWriter::create("output.txt", Threshold::default()).await?;
//! writer.write_result_set(&outcome.results).await;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Sorted, deduplicating result collection.
pub mod aggregator;
/// Pipeline, reader and file settings.
pub mod config;
/// Consumer trait and configuration.
pub mod consumer;
/// Built-in consumers.
pub mod consumers;
/// Pull-based hand-off from the driver to the workers.
pub mod dispatcher;
/// Error types and stream error strategies.
pub mod error;
/// Input side of stream components.
pub mod input;
/// Completion latch and per-worker forward handles.
pub mod latch;
/// Output side of stream components.
pub mod output;
/// The pipeline driver.
pub mod pipeline;
/// Producer trait and configuration.
pub mod producer;
/// Built-in producers.
pub mod producers;
/// Records and the filter predicate.
pub mod record;
/// Transformer trait and configuration.
pub mod transformer;
/// Built-in transformers.
pub mod transformers;
/// Worker pool.
pub mod worker;

#[cfg(test)]
mod pipeline_test;

pub use aggregator::ResultSet;
pub use config::{PipelineConfig, ReaderConfig, SieveConfig};
pub use error::{PipelineError, SieveError};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineStats};
pub use record::{Record, Threshold};
