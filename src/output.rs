//! Output trait for components that produce record streams.
//!
//! Implemented by producers and transformers. Works together with
//! [`crate::input::Input`]: a downstream component's `InputStream` must be
//! constructible from the upstream `OutputStream`.

use futures::Stream;

/// Trait for components that produce an output stream.
pub trait Output
where
  Self::Output: Send + 'static,
{
  /// The item type produced.
  type Output;
  /// The stream type that yields `Self::Output`.
  type OutputStream: Stream<Item = Self::Output> + Send + 'static;
}
