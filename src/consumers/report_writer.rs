//! Fixed-width text report of a [`ResultSet`].
//!
//! ```text
//! -----------------------------------------------------
//! |    Name         |     Count     |   Score      |
//! -----------------------------------------------------
//! | Alice           |          250 |         7.00 |
//! -----------------------------------------------------
//! Number of data : 1
//! ```
//!
//! Rows are re-filtered through the threshold on the way out. The footer
//! counts every entry the writer was given, not only the rows that survived
//! that second filter. An empty input produces only [`NO_DATA_LINE`].

use crate::aggregator::ResultSet;
use crate::consumer::{Consumer, ConsumerConfig};
use crate::error::SieveError;
use crate::input::Input;
use crate::record::{Record, Threshold};
use crate::transformer::Transformer;
use crate::transformers::FilterTransformer;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error};

/// Horizontal rule framing the table.
pub const RULE: &str = "-----------------------------------------------------\n";
/// Column headings.
pub const HEADING: &str = "|    Name         |     Count     |   Score      |\n";
/// Written instead of a table when there is nothing to report.
pub const NO_DATA_LINE: &str = "No data is filtered\n";

fn render_header() -> String {
  format!("{RULE}{HEADING}{RULE}")
}

fn render_row(record: &Record) -> String {
  format!(
    "| {:<15} | {:>12} | {:>12.2} |\n",
    record.name(),
    record.count(),
    record.score()
  )
}

fn render_footer(total: usize) -> String {
  format!("{RULE}Number of data : {total}\n")
}

/// The report for `rows` out of `total` entries handed over.
fn render_document<'a>(rows: impl IntoIterator<Item = &'a Record>, total: usize) -> String {
  if total == 0 {
    return NO_DATA_LINE.to_string();
  }
  let mut report = render_header();
  for record in rows {
    report.push_str(&render_row(record));
  }
  report.push_str(&render_footer(total));
  report
}

/// Renders the whole report for `results` in memory.
pub fn render_report(results: &ResultSet, threshold: &Threshold) -> String {
  render_document(
    results.iter().filter(|r| threshold.matches(r)),
    results.len(),
  )
}

type ReportSink = BufWriter<Pin<Box<dyn AsyncWrite + Send>>>;

/// Writes the report to a file or any async sink.
pub struct ReportWriter {
  sink: ReportSink,
  destination: PathBuf,
  filter: FilterTransformer,
  rows_written: usize,
  write_error: Option<std::io::Error>,
  config: ConsumerConfig,
}

impl std::fmt::Debug for ReportWriter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ReportWriter")
      .field("destination", &self.destination)
      .field("threshold", &self.filter.threshold())
      .field("rows_written", &self.rows_written)
      .field("write_error", &self.write_error)
      .finish()
  }
}

impl ReportWriter {
  /// Creates (or truncates) the report file at `path`.
  ///
  /// # Errors
  ///
  /// [`SieveError::Create`] if the file cannot be created. This is fatal for a run.
  pub async fn create(path: impl AsRef<Path>, threshold: Threshold) -> Result<Self, SieveError> {
    let path = path.as_ref();
    let file = tokio::fs::File::create(path)
      .await
      .map_err(|source| SieveError::Create {
        path: path.to_path_buf(),
        source,
      })?;
    Ok(Self::with_destination(file, path.to_path_buf(), threshold))
  }

  /// Writes to an already-open sink such as stdout.
  pub fn from_writer<W>(writer: W, threshold: Threshold) -> Self
  where
    W: AsyncWrite + Send + 'static,
  {
    Self::with_destination(writer, PathBuf::from("<writer>"), threshold)
  }

  fn with_destination<W>(writer: W, destination: PathBuf, threshold: Threshold) -> Self
  where
    W: AsyncWrite + Send + 'static,
  {
    let sink: Pin<Box<dyn AsyncWrite + Send>> = Box::pin(writer);
    Self {
      sink: BufWriter::new(sink),
      destination,
      filter: FilterTransformer::new(threshold).with_name("report_refilter".to_string()),
      rows_written: 0,
      write_error: None,
      config: ConsumerConfig::default().with_name("report_writer".to_string()),
    }
  }

  /// Writes `results` as the report.
  pub async fn write_result_set(&mut self, results: &ResultSet) {
    let records: Vec<Record> = results.iter().cloned().collect();
    self.consume(Box::pin(futures::stream::iter(records))).await;
  }

  /// Table rows written so far.
  pub fn rows_written(&self) -> usize {
    self.rows_written
  }

  /// Reports the outcome of everything written.
  ///
  /// # Errors
  ///
  /// [`SieveError::Write`] with the first write or flush failure.
  pub fn finish(self) -> Result<usize, SieveError> {
    match self.write_error {
      Some(source) => Err(SieveError::Write {
        path: self.destination,
        source,
      }),
      None => Ok(self.rows_written),
    }
  }

  async fn emit(&mut self, text: &str) {
    if self.write_error.is_some() {
      return;
    }
    if let Err(e) = self.sink.write_all(text.as_bytes()).await {
      error!(
        component = %self.config.name,
        destination = %self.destination.display(),
        error = %e,
        "report write failed"
      );
      self.write_error = Some(e);
    }
  }
}

impl Input for ReportWriter {
  type Input = Record;
  type InputStream = Pin<Box<dyn Stream<Item = Record> + Send>>;
}

#[async_trait]
impl Consumer for ReportWriter {
  async fn consume(&mut self, stream: Self::InputStream) {
    let total = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&total);
    let counted: Pin<Box<dyn Stream<Item = Record> + Send>> = Box::pin(stream.inspect(move |_| {
      counter.fetch_add(1, Ordering::Relaxed);
    }));
    let rows: Vec<Record> = self.filter.transform(counted).collect().await;

    let report = render_document(&rows, total.load(Ordering::Relaxed));
    self.emit(&report).await;
    if self.write_error.is_none() {
      self.rows_written += rows.len();
    }

    if self.write_error.is_none()
      && let Err(e) = self.sink.flush().await
    {
      error!(
        component = %self.config.name,
        destination = %self.destination.display(),
        error = %e,
        "report flush failed"
      );
      self.write_error = Some(e);
    }
    debug!(
      component = %self.config.name,
      destination = %self.destination.display(),
      rows = self.rows_written,
      "report written"
    );
  }

  fn get_config_impl(&self) -> &ConsumerConfig {
    &self.config
  }
}
