//! # Transformer Trait
//!
//! Transformers turn one record stream into another. The report writer runs
//! its input through [`crate::transformers::FilterTransformer`] so that the
//! predicate is re-applied at output time.

use crate::{input::Input, output::Output};
use async_trait::async_trait;

/// Configuration for a transformer component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformerConfig {
  /// Optional name for logs.
  pub name: Option<String>,
}

impl TransformerConfig {
  /// Sets the component name.
  #[must_use]
  pub fn with_name(mut self, name: String) -> Self {
    self.name = Some(name);
    self
  }

  /// Returns the name, if set.
  pub fn name(&self) -> Option<String> {
    self.name.clone()
  }
}

/// Trait for components that transform one stream into another.
#[async_trait]
pub trait Transformer: Input + Output
where
  Self::Input: std::fmt::Debug + Clone + Send + Sync,
{
  /// Transforms `input` into the output stream.
  fn transform(&mut self, input: Self::InputStream) -> Self::OutputStream;

  /// Returns the configuration.
  fn config(&self) -> &TransformerConfig {
    self.get_config_impl()
  }

  /// Returns the configuration mutably.
  fn config_mut(&mut self) -> &mut TransformerConfig {
    self.get_config_mut_impl()
  }

  /// Sets the component name.
  #[must_use]
  fn with_name(mut self, name: String) -> Self
  where
    Self: Sized,
  {
    self.config_mut().name = Some(name);
    self
  }

  /// Internal implementation for getting configuration.
  fn get_config_impl(&self) -> &TransformerConfig;
  /// Internal implementation for getting mutable configuration.
  fn get_config_mut_impl(&mut self) -> &mut TransformerConfig;
}
