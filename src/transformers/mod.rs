//! Built-in transformers.

/// Threshold filter over record streams.
pub mod filter;

pub use filter::FilterTransformer;
