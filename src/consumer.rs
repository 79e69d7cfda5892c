//! # Consumer Trait
//!
//! Consumers terminate a stream. Two are built in:
//!
//! - [`crate::aggregator::Aggregator`] consumes the records forwarded by the
//!   worker pool and folds them into a sorted, deduplicated
//!   [`crate::aggregator::ResultSet`].
//! - [`crate::consumers::ReportWriter`] renders a result set as the
//!   fixed-width text report.
//!
//! ## Example
//!
//! ```rust
//! use recordsieve::aggregator::Aggregator;
//! use recordsieve::consumer::Consumer;
//! use recordsieve::record::Record;
//! use tokio::sync::mpsc;
//! use tokio_stream::wrappers::ReceiverStream;
//!
//! # async fn example() {
//! let (tx, rx) = mpsc::channel(8);
//! tx.send(Record::new("Cara", 300, 6.5)).await.unwrap();
//! tx.send(Record::new("Alice", 250, 7.0)).await.unwrap();
//! drop(tx);
//!
//! let mut aggregator = Aggregator::new();
//! aggregator.consume(Box::pin(ReceiverStream::new(rx))).await;
//! assert_eq!(aggregator.result_set().names(), vec!["Alice", "Cara"]);
//! # }
//! ```

use crate::input::Input;
use async_trait::async_trait;

/// Configuration for a consumer component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerConfig {
  /// Component name for logs.
  pub name: String,
}

impl ConsumerConfig {
  /// Sets the component name.
  #[must_use]
  pub fn with_name(mut self, name: String) -> Self {
    self.name = name;
    self
  }

  /// Returns the component name.
  pub fn name(&self) -> &str {
    &self.name
  }
}

/// Trait for components that consume a stream.
#[async_trait]
pub trait Consumer: Input
where
  Self::Input: std::fmt::Debug + Clone + Send + Sync + 'static,
{
  /// Consumes `stream` until it is exhausted.
  async fn consume(&mut self, stream: Self::InputStream);

  /// Returns the configuration.
  fn config(&self) -> &ConsumerConfig {
    self.get_config_impl()
  }

  /// Internal implementation for getting configuration.
  fn get_config_impl(&self) -> &ConsumerConfig;
}
