//! Input trait for components that consume record streams.
//!
//! Implemented by transformers and consumers. The associated stream type is
//! what the upstream component must hand over; in this crate that is usually a
//! pinned, boxed stream of [`crate::record::Record`]s, or a
//! [`tokio_stream::wrappers::ReceiverStream`] when the items arrive over a
//! channel from concurrent workers.

use futures::Stream;

/// Trait for components that accept an input stream.
pub trait Input
where
  Self::Input: Send + 'static,
{
  /// The item type consumed.
  type Input;
  /// The stream type that yields `Self::Input`.
  type InputStream: Stream<Item = Self::Input> + Send + 'static;
}
