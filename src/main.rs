//! recordsieve CLI: filter a delimited record file into a sorted report.

use clap::{ArgAction, Parser};
use recordsieve::SieveError;
use recordsieve::config::SieveConfig;
use recordsieve::consumers::ReportWriter;
use recordsieve::pipeline::Pipeline;
use recordsieve::producers::RecordReader;
use std::path::PathBuf;
use tracing::{Level, info};

/// Filter `name,count,score` records and write the matches as a table.
///
/// Records with `count >= --min-count` and `score >= --min-score` are kept,
/// one per name, sorted by name.
#[derive(Parser, Debug)]
#[command(name = "recordsieve")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Input file [default: f3.txt].
  #[arg(value_name = "INPUT")]
  input: Option<PathBuf>,

  /// Report file, or `-` for stdout [default: output.txt].
  #[arg(short, long, value_name = "OUTPUT")]
  output: Option<PathBuf>,

  /// Number of workers.
  #[arg(short, long)]
  workers: Option<usize>,

  /// Inclusive lower bound on the count field.
  #[arg(long)]
  min_count: Option<i64>,

  /// Inclusive lower bound on the score field.
  #[arg(long)]
  min_score: Option<f64>,

  /// Field delimiter.
  #[arg(short, long)]
  delimiter: Option<char>,

  /// JSON configuration file. Flags override its values.
  #[arg(short, long, value_name = "CONFIG")]
  config: Option<PathBuf>,

  /// More log output (-v debug, -vv trace).
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

impl Cli {
  fn settings(&self) -> Result<SieveConfig, SieveError> {
    let mut config = match &self.config {
      Some(path) => SieveConfig::from_json_file(path)?,
      None => SieveConfig::default(),
    };
    if let Some(input) = &self.input {
      config.input = input.clone();
    }
    if let Some(output) = &self.output {
      config.output = output.clone();
    }
    if let Some(workers) = self.workers {
      config.pipeline.worker_count = workers;
    }
    if let Some(min_count) = self.min_count {
      config.pipeline.threshold.min_count = min_count;
    }
    if let Some(min_score) = self.min_score {
      config.pipeline.threshold.min_score = min_score;
    }
    if let Some(delimiter) = self.delimiter {
      config.reader.delimiter = delimiter;
    }
    config.validate()?;
    Ok(config)
  }

  fn log_level(&self) -> Level {
    match self.verbose {
      0 => Level::INFO,
      1 => Level::DEBUG,
      _ => Level::TRACE,
    }
  }
}

async fn run(config: SieveConfig) -> Result<(), SieveError> {
  let threshold = config.pipeline.threshold;
  let mut reader = RecordReader::open(&config.input)
    .await?
    .with_reader_config(config.reader.clone());
  let outcome = Pipeline::new(config.pipeline)?
    .run_producer(&mut reader)
    .await?;
  reader.finish()?;

  let mut writer = if config.output.as_os_str() == "-" {
    ReportWriter::from_writer(tokio::io::stdout(), threshold)
  } else {
    ReportWriter::create(&config.output, threshold).await?
  };
  writer.write_result_set(&outcome.results).await;
  let rows = writer.finish()?;

  info!(
    input = %config.input.display(),
    output = %config.output.display(),
    rows,
    duplicates = outcome.stats.duplicates,
    rejected = outcome.stats.rejected,
    "report written"
  );
  Ok(())
}

#[tokio::main]
async fn main() {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_max_level(cli.log_level())
    .with_writer(std::io::stderr)
    .init();

  let result = match cli.settings() {
    Ok(config) => run(config).await,
    Err(e) => Err(e),
  };
  if let Err(e) = result {
    eprintln!("Error: {e}");
    std::process::exit(1);
  }
}
