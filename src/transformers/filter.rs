use crate::input::Input;
use crate::output::Output;
use crate::record::{Record, Threshold};
use crate::transformer::{Transformer, TransformerConfig};
use async_trait::async_trait;
use futures::{Stream, StreamExt, future};
use std::pin::Pin;

/// Keeps the records that pass a [`Threshold`].
#[derive(Debug, Clone)]
pub struct FilterTransformer {
  threshold: Threshold,
  config: TransformerConfig,
}

impl FilterTransformer {
  /// Creates a filter for `threshold`.
  pub fn new(threshold: Threshold) -> Self {
    Self {
      threshold,
      config: TransformerConfig::default(),
    }
  }

  /// The threshold applied.
  pub fn threshold(&self) -> Threshold {
    self.threshold
  }
}

impl Input for FilterTransformer {
  type Input = Record;
  type InputStream = Pin<Box<dyn Stream<Item = Record> + Send>>;
}

impl Output for FilterTransformer {
  type Output = Record;
  type OutputStream = Pin<Box<dyn Stream<Item = Record> + Send>>;
}

#[async_trait]
impl Transformer for FilterTransformer {
  fn transform(&mut self, input: Self::InputStream) -> Self::OutputStream {
    let threshold = self.threshold;
    Box::pin(input.filter(move |record| future::ready(threshold.matches(record))))
  }

  fn get_config_impl(&self) -> &TransformerConfig {
    &self.config
  }

  fn get_config_mut_impl(&mut self) -> &mut TransformerConfig {
    &mut self.config
  }
}
