//! Delimited text → [`Record`] producer.
//!
//! Each line is `name<delim>count<delim>score`. Lines with any other number of
//! fields are skipped without a warning. A numeric field that does not parse
//! becomes zero instead of rejecting the line.
//!
//! Numeric fields are trimmed before parsing, so `" 250"` or a score followed
//! by a stray `\r` still parse. A strict parser would read both as zero.
//! Lines are decoded lossily: bytes that are not UTF-8 turn into `U+FFFD` in
//! the name, and the line is kept.
//!
//! A failed read goes through the producer's [`ErrorStrategy`]:
//!
//! - `Stop` (default) ends the input and keeps the error for
//!   [`RecordReader::finish`];
//! - `Skip` ends the input quietly;
//! - `Retry(n)` reads again, up to `n` consecutive failures.

use crate::config::ReaderConfig;
use crate::error::{ErrorAction, ErrorContext, ErrorStrategy, SieveError, StreamError};
use crate::output::Output;
use crate::producer::{Producer, ProducerConfig};
use crate::record::Record;
use async_trait::async_trait;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, trace, warn};

type LineSource = Pin<Box<dyn AsyncBufRead + Send>>;
type ReadFailure = Arc<Mutex<Option<std::io::Error>>>;

/// Parses one line. Returns `None` unless it has exactly three fields.
///
/// ```rust
/// use recordsieve::producers::parse_line;
///
/// let record = parse_line("Alice,250,7.0", ',').unwrap();
/// assert_eq!(record.count(), 250);
/// assert_eq!(parse_line("Bob,x,oops", ',').unwrap().score(), 0.0);
/// assert!(parse_line("too,many,fields,here", ',').is_none());
/// ```
pub fn parse_line(line: &str, delimiter: char) -> Option<Record> {
  let mut fields = line.split(delimiter);
  let (Some(name), Some(count), Some(score), None) =
    (fields.next(), fields.next(), fields.next(), fields.next())
  else {
    return None;
  };
  let count = count.trim().parse::<i64>().unwrap_or(0);
  let score = score.trim().parse::<f64>().unwrap_or(0.0);
  Some(Record::new(name, count, score))
}

fn strip_line_ending(line: &mut Vec<u8>) {
  if line.last() == Some(&b'\n') {
    line.pop();
    if line.last() == Some(&b'\r') {
      line.pop();
    }
  }
}

/// Streams records out of a delimited text source.
pub struct RecordReader {
  source: Option<LineSource>,
  origin: PathBuf,
  reader_config: ReaderConfig,
  failure: ReadFailure,
  config: ProducerConfig<Record>,
}

impl std::fmt::Debug for RecordReader {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RecordReader")
      .field("origin", &self.origin)
      .field("reader_config", &self.reader_config)
      .field("config", &self.config)
      .field("consumed", &self.source.is_none())
      .finish()
  }
}

impl RecordReader {
  /// Opens `path` for reading.
  ///
  /// # Errors
  ///
  /// [`SieveError::Open`] if the file cannot be opened. This is fatal for a run.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, SieveError> {
    let path = path.as_ref();
    let file = tokio::fs::File::open(path)
      .await
      .map_err(|source| SieveError::Open {
        path: path.to_path_buf(),
        source,
      })?;
    Ok(Self::with_origin(BufReader::new(file), path.to_path_buf()))
  }

  /// Reads from an in-memory or otherwise already-open source.
  pub fn from_reader<R>(reader: R) -> Self
  where
    R: AsyncBufRead + Send + 'static,
  {
    Self::with_origin(reader, PathBuf::from("<reader>"))
  }

  fn with_origin<R>(reader: R, origin: PathBuf) -> Self
  where
    R: AsyncBufRead + Send + 'static,
  {
    Self {
      source: Some(Box::pin(reader)),
      origin,
      reader_config: ReaderConfig::default(),
      failure: Arc::new(Mutex::new(None)),
      config: ProducerConfig::default()
        .with_error_strategy(ErrorStrategy::Stop)
        .with_name("record_reader".to_string()),
    }
  }

  /// Sets the decoding settings.
  #[must_use]
  pub fn with_reader_config(mut self, reader_config: ReaderConfig) -> Self {
    self.reader_config = reader_config;
    self
  }

  /// Sets the strategy for failed reads.
  #[must_use]
  pub fn with_error_strategy(mut self, strategy: ErrorStrategy<Record>) -> Self {
    self.config_mut().error_strategy = strategy;
    self
  }

  /// Where the records come from.
  pub fn origin(&self) -> &Path {
    &self.origin
  }

  /// Reports whether the input was read to the end.
  ///
  /// # Errors
  ///
  /// [`SieveError::Read`] if a failed read stopped the input early.
  pub fn finish(self) -> Result<(), SieveError> {
    let failure = match self.failure.lock() {
      Ok(mut slot) => slot.take(),
      Err(poisoned) => poisoned.into_inner().take(),
    };
    match failure {
      Some(source) => Err(SieveError::Read {
        path: self.origin,
        source,
      }),
      None => Ok(()),
    }
  }
}

impl Output for RecordReader {
  type Output = Record;
  type OutputStream = Pin<Box<dyn Stream<Item = Record> + Send>>;
}

#[async_trait]
impl Producer for RecordReader {
  /// Yields one record per well-formed line.
  ///
  /// The source is read once; producing again yields an empty stream.
  fn produce(&mut self) -> Self::OutputStream {
    let Some(mut source) = self.source.take() else {
      warn!(
        component = "record_reader",
        origin = %self.origin.display(),
        "source already consumed"
      );
      return Box::pin(futures::stream::empty());
    };
    let delimiter = self.reader_config.delimiter;
    let origin = self.origin.display().to_string();
    let error_strategy = self.config().error_strategy();
    let component = self.component_info();
    let context = self.create_error_context(None);
    let failure = Arc::clone(&self.failure);

    Box::pin(async_stream::stream! {
      let mut buffer = Vec::new();
      let mut line_number = 0usize;
      let mut produced = 0usize;
      let mut retries = 0usize;
      loop {
        buffer.clear();
        match source.read_until(b'\n', &mut buffer).await {
          Ok(0) => break,
          Ok(_) => retries = 0,
          Err(e) => {
            let kept = std::io::Error::new(e.kind(), e.to_string());
            let mut stream_error = StreamError::new(
              Box::new(e),
              ErrorContext {
                timestamp: chrono::Utc::now(),
                ..context.clone()
              },
              component.clone(),
            );
            stream_error.retries = retries;
            match error_strategy.resolve(&stream_error) {
              ErrorAction::Retry => {
                retries += 1;
                warn!(
                  component = %component.name,
                  origin = %origin,
                  retries,
                  error = %stream_error,
                  "read failed; retrying"
                );
                continue;
              }
              ErrorAction::Skip => {
                warn!(
                  component = %component.name,
                  origin = %origin,
                  error = %stream_error,
                  "read failed; ending input"
                );
                break;
              }
              ErrorAction::Stop => {
                error!(
                  component = %component.name,
                  origin = %origin,
                  error = %stream_error,
                  "read failed; ending input"
                );
                match failure.lock() {
                  Ok(mut slot) => *slot = Some(kept),
                  Err(poisoned) => *poisoned.into_inner() = Some(kept),
                }
                break;
              }
            }
          }
        }
        line_number += 1;
        strip_line_ending(&mut buffer);

        let line = String::from_utf8_lossy(&buffer);
        match parse_line(&line, delimiter) {
          Some(record) => {
            produced += 1;
            yield record;
          }
          None => trace!(component = %component.name, line = line_number, "skipping malformed line"),
        }
      }
      debug!(
        component = %component.name,
        origin = %origin,
        lines = line_number,
        records = produced,
        "input exhausted"
      );
    })
  }

  fn get_config_impl(&self) -> &ProducerConfig<Record> {
    &self.config
  }

  fn get_config_mut_impl(&mut self) -> &mut ProducerConfig<Record> {
    &mut self.config
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::StreamExt;
  use std::io::Write;
  use tempfile::NamedTempFile;
  use tokio_test::io::Builder;

  async fn read_all(reader: &mut RecordReader) -> Vec<Record> {
    reader.produce().collect().await
  }

  #[test]
  fn test_parse_line_field_count() {
    assert_eq!(
      parse_line("Alice,250,7.0", ','),
      Some(Record::new("Alice", 250, 7.0))
    );
    assert_eq!(parse_line("Alice,250", ','), None);
    assert_eq!(parse_line("a,1,2,3", ','), None);
    assert_eq!(parse_line("", ','), None);
  }

  #[test]
  fn test_parse_line_numeric_fallbacks() {
    assert_eq!(parse_line("Bob,abc,8.5", ','), Some(Record::new("Bob", 0, 8.5)));
    assert_eq!(parse_line("Bob,210,", ','), Some(Record::new("Bob", 210, 0.0)));
    assert_eq!(parse_line("Bob, 210 , 6.5 ", ','), Some(Record::new("Bob", 210, 6.5)));
    assert_eq!(parse_line(" Bob ,1,1", ',').unwrap().name(), " Bob ");
  }

  #[tokio::test]
  async fn test_reader_skips_malformed_lines() {
    let text = "Alice,250,7.0\nbroken line\nBob,150,8.0\r\n\nCara,300,6.5";
    let mut reader = RecordReader::from_reader(BufReader::new(text.as_bytes()));
    let records = read_all(&mut reader).await;
    assert_eq!(
      records,
      vec![
        Record::new("Alice", 250, 7.0),
        Record::new("Bob", 150, 8.0),
        Record::new("Cara", 300, 6.5),
      ]
    );

    assert!(read_all(&mut reader).await.is_empty());
  }

  #[tokio::test]
  async fn test_reader_custom_delimiter() {
    let text = "Alice;250;7.0\nAlice,250,7.0\n";
    let mut reader = RecordReader::from_reader(BufReader::new(text.as_bytes()))
      .with_reader_config(ReaderConfig::default().with_delimiter(';'));
    assert_eq!(read_all(&mut reader).await, vec![Record::new("Alice", 250, 7.0)]);
  }

  #[tokio::test]
  async fn test_non_utf8_name_is_kept() {
    let bytes: &'static [u8] = b"Jos\xe9,300,7.0\nCara,300,6.5\n";
    let mut reader = RecordReader::from_reader(BufReader::new(bytes));
    let records = read_all(&mut reader).await;
    assert_eq!(
      records,
      vec![
        Record::new("Jos\u{FFFD}", 300, 7.0),
        Record::new("Cara", 300, 6.5),
      ]
    );
    reader.finish().unwrap();
  }

  fn disk_error() -> std::io::Error {
    std::io::Error::other("disk gone")
  }

  #[tokio::test]
  async fn test_read_error_stops_and_is_reported() {
    let mock = Builder::new().read(b"a,1,1\n").read_error(disk_error()).build();
    let mut reader = RecordReader::from_reader(BufReader::new(mock));

    assert_eq!(read_all(&mut reader).await, vec![Record::new("a", 1, 1.0)]);
    let err = reader.finish().unwrap_err();
    assert!(matches!(err, SieveError::Read { .. }));
    assert!(err.to_string().contains("disk gone"));
  }

  #[tokio::test]
  async fn test_read_error_skip_ends_quietly() {
    let mock = Builder::new().read(b"a,1,1\n").read_error(disk_error()).build();
    let mut reader =
      RecordReader::from_reader(BufReader::new(mock)).with_error_strategy(ErrorStrategy::Skip);

    assert_eq!(read_all(&mut reader).await, vec![Record::new("a", 1, 1.0)]);
    reader.finish().unwrap();
  }

  #[tokio::test]
  async fn test_read_error_retry() {
    let mock = Builder::new()
      .read(b"a,1,1\n")
      .read_error(disk_error())
      .read(b"b,2,2\n")
      .build();
    let mut reader =
      RecordReader::from_reader(BufReader::new(mock)).with_error_strategy(ErrorStrategy::Retry(1));

    assert_eq!(
      read_all(&mut reader).await,
      vec![Record::new("a", 1, 1.0), Record::new("b", 2, 2.0)]
    );
    reader.finish().unwrap();
  }

  #[tokio::test]
  async fn test_read_error_retry_exhausted() {
    let mock = Builder::new()
      .read(b"a,1,1\n")
      .read_error(disk_error())
      .read_error(disk_error())
      .build();
    let mut reader =
      RecordReader::from_reader(BufReader::new(mock)).with_error_strategy(ErrorStrategy::Retry(1));

    assert_eq!(read_all(&mut reader).await, vec![Record::new("a", 1, 1.0)]);
    assert!(matches!(reader.finish(), Err(SieveError::Read { .. })));
  }

  #[tokio::test]
  async fn test_open_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Alice,250,7.0").unwrap();
    writeln!(file, "Cara,300,6.5").unwrap();

    let mut reader = RecordReader::open(file.path()).await.unwrap();
    assert_eq!(reader.origin(), file.path());
    assert_eq!(read_all(&mut reader).await.len(), 2);
  }

  #[tokio::test]
  async fn test_open_missing_file_is_fatal() {
    let err = RecordReader::open("/no/such/dir/f3.txt").await.unwrap_err();
    assert!(matches!(err, SieveError::Open { .. }));
  }

  #[test]
  fn test_default_strategy_is_stop() {
    let reader = RecordReader::from_reader(BufReader::new(&b""[..]));
    assert_eq!(reader.config().error_strategy, ErrorStrategy::Stop);
    assert_eq!(reader.component_info().name, "record_reader");
  }
}
