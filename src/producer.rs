//! # Producer Trait
//!
//! Producers sit at the head of a pipeline and yield the records that the
//! driver submits to the dispatcher. The only built-in producer is
//! [`crate::producers::RecordReader`], which decodes a delimited text source.
//!
//! Every producer carries a [`ProducerConfig`] holding its name (used in log
//! fields and error context) and the [`ErrorStrategy`] applied to read
//! failures.

use crate::error::{ComponentInfo, ErrorContext, ErrorStrategy};
use crate::output::Output;
use async_trait::async_trait;

/// Configuration for a producer component.
#[derive(Debug, Clone)]
pub struct ProducerConfig<T> {
  /// Strategy applied to read failures.
  pub error_strategy: ErrorStrategy<T>,
  /// Optional name for logs and error context.
  pub name: Option<String>,
}

impl<T> Default for ProducerConfig<T> {
  fn default() -> Self {
    Self {
      error_strategy: ErrorStrategy::Stop,
      name: None,
    }
  }
}

impl<T> ProducerConfig<T> {
  /// Sets the error strategy.
  #[must_use]
  pub fn with_error_strategy(mut self, strategy: ErrorStrategy<T>) -> Self {
    self.error_strategy = strategy;
    self
  }

  /// Sets the component name.
  #[must_use]
  pub fn with_name(mut self, name: String) -> Self {
    self.name = Some(name);
    self
  }

  /// Returns the error strategy.
  pub fn error_strategy(&self) -> ErrorStrategy<T> {
    self.error_strategy.clone()
  }
}

/// Trait for components that produce a stream of items.
#[async_trait]
pub trait Producer: Output
where
  Self::Output: std::fmt::Debug + Clone + Send + Sync,
{
  /// Produces the output stream. Called once per run.
  fn produce(&mut self) -> Self::OutputStream;

  /// Returns the configuration.
  fn config(&self) -> &ProducerConfig<Self::Output> {
    self.get_config_impl()
  }

  /// Returns the configuration mutably.
  fn config_mut(&mut self) -> &mut ProducerConfig<Self::Output> {
    self.get_config_mut_impl()
  }

  /// Returns name and type of this producer.
  fn component_info(&self) -> ComponentInfo {
    ComponentInfo {
      name: self
        .config()
        .name
        .clone()
        .unwrap_or_else(|| "producer".to_string()),
      type_name: std::any::type_name::<Self>().to_string(),
    }
  }

  /// Builds an error context for `item`.
  fn create_error_context(&self, item: Option<Self::Output>) -> ErrorContext<Self::Output> {
    let info = self.component_info();
    ErrorContext {
      timestamp: chrono::Utc::now(),
      item,
      component_name: info.name,
      component_type: info.type_name,
    }
  }

  /// Internal implementation for getting configuration.
  fn get_config_impl(&self) -> &ProducerConfig<Self::Output>;
  /// Internal implementation for getting mutable configuration.
  fn get_config_mut_impl(&mut self) -> &mut ProducerConfig<Self::Output>;
}
