//! Built-in producers.

/// Delimited text reader.
pub mod record_reader;

pub use record_reader::{RecordReader, parse_line};
