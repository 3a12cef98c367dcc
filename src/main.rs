use anyhow::{Context, Result};
use clap::builder::TypedValueParser;
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use wikistat::config::{self, PipelineConfig};
use wikistat::pipeline::{FileStatus, Pipeline};
use wikistat::tokenizer::Alphabet;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Clone, Copy, ValueEnum)]
enum AlphabetArg {
    Cyrillic,
    Latin,
}

impl From<AlphabetArg> for Alphabet {
    fn from(arg: AlphabetArg) -> Self {
        match arg {
            AlphabetArg::Cyrillic => Alphabet::Cyrillic,
            AlphabetArg::Latin => Alphabet::Latin,
        }
    }
}

#[derive(Parser)]
#[command(name = "wikistat")]
#[command(about = "Word, size and year statistics over Wikipedia XML dumps")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path(s) to bzip2-compressed XML dumps, comma separated
    #[arg(long, required = true, value_delimiter = ',')]
    inputs: Vec<PathBuf>,

    /// Report output file
    #[arg(long, default_value = "statistics.txt")]
    output: PathBuf,

    /// Parser threads (also aggregation threads unless --aggregate-threads is set)
    #[arg(long, default_value_t = config::DEFAULT_THREADS,
          value_parser = clap::value_parser!(u16).range(1..=config::MAX_THREADS as i64).map(usize::from))]
    threads: usize,

    /// Aggregation threads
    #[arg(long,
          value_parser = clap::value_parser!(u16).range(1..=config::MAX_THREADS as i64).map(usize::from))]
    aggregate_threads: Option<usize>,

    /// Pages buffered between parsers and aggregators
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Words listed per ranking
    #[arg(long, default_value_t = config::DEFAULT_TOP_WORDS)]
    top_words: usize,

    /// Seconds to wait for aggregation to drain after parsing
    #[arg(long, default_value_t = config::DEFAULT_AGGREGATE_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Seconds to wait for parsing before cancelling (0 waits without bound)
    #[arg(long, default_value_t = config::DEFAULT_PARSE_TIMEOUT_SECS)]
    parse_timeout_secs: u64,

    /// Ignore words shorter than this many letters
    #[arg(long, default_value_t = 0)]
    min_word_len: usize,

    /// Letters that make up words
    #[arg(long, value_enum, default_value = "cyrillic")]
    alphabet: AlphabetArg,

    /// First year of the year histogram
    #[arg(long, default_value_t = 0)]
    min_year: u32,

    /// Also write the report as JSON (for chart rendering)
    #[arg(long)]
    json: Option<PathBuf>,

    /// Show a progress spinner
    #[arg(long)]
    progress: bool,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let aggregate_threads = self.aggregate_threads.unwrap_or(self.threads);
        PipelineConfig {
            parse_threads: self.threads,
            aggregate_threads,
            queue_capacity: self
                .queue_capacity
                .unwrap_or(aggregate_threads * config::QUEUE_PAGES_PER_WORKER),
            parse_timeout: (self.parse_timeout_secs > 0)
                .then(|| Duration::from_secs(self.parse_timeout_secs)),
            aggregate_timeout: Duration::from_secs(self.timeout_secs),
            alphabet: self.alphabet.into(),
            min_word_len: self.min_word_len,
            min_year: self.min_year,
            top_words: self.top_words,
            show_progress: self.progress,
        }
    }
}

/// Returns whether every file was processed and the run completed
fn run(cli: Cli) -> Result<bool> {
    let pipeline = Pipeline::new(cli.pipeline_config())?;
    let summary = pipeline.run(&cli.inputs)?;

    let report = summary.report(pipeline.config().top_words);
    fs::write(&cli.output, report.render())
        .with_context(|| format!("Failed to write report: {}", cli.output.display()))?;
    info!(path = %cli.output.display(), "Report written");

    if let Some(json_path) = &cli.json {
        let json = report.to_json().context("Failed to serialize report")?;
        fs::write(json_path, json)
            .with_context(|| format!("Failed to write JSON: {}", json_path.display()))?;
        info!(path = %json_path.display(), "JSON written");
    }

    let counters = &summary.counters;
    println!();
    println!("=== Summary ===");
    println!("Time:               {} ms", summary.elapsed.as_millis());
    println!("Pages extracted:    {}", counters.pages_extracted);
    println!("Pages aggregated:   {}", counters.pages_aggregated);
    println!("Incomplete pages:   {}", counters.pages_incomplete);
    println!("Out-of-range pages: {}", counters.pages_out_of_range);
    println!("Failed pages:       {}", counters.pages_panicked);
    println!("Title words:        {}", counters.title_words);
    println!("Text words:         {}", counters.text_words);

    for file in summary.failed_files() {
        let reason = match &file.status {
            FileStatus::Failed(reason) => reason.clone(),
            FileStatus::Cancelled { pages } => format!("cancelled after {pages} pages"),
            FileStatus::TimedOut => "timed out".to_string(),
            FileStatus::Completed { .. } => continue,
        };
        warn!(file = %file.path.display(), %reason, "Input not fully processed");
        eprintln!("Failed: {}: {}", file.path.display(), reason);
    }
    if let Some(incomplete) = summary.incomplete {
        error!("Run incomplete: {}", incomplete);
        eprintln!("Run incomplete: {}", incomplete);
    }

    Ok(summary.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(true) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
