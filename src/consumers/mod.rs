//! Built-in consumers.

/// Fixed-width report writer.
pub mod report_writer;

pub use report_writer::{ReportWriter, render_report};
