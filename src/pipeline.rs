//! Two-pool pipeline: files are parsed on one rayon pool, pages are counted on another
//!
//! Parse tasks (one per file) push completed pages into a bounded queue, so a fast
//! parser blocks instead of buffering a whole dump in memory. Aggregation workers
//! drain the queue into the shared [`Statistics`]. A file that fails to decode or
//! parse is reported and skipped; the other files still contribute.

use crate::config::{PipelineConfig, PROGRESS_INTERVAL};
use crate::counters::{CounterSnapshot, RunCounters};
use crate::extract::Pages;
use crate::models::Page;
use crate::parser::DumpReader;
use crate::report::Report;
use crate::stats::{Statistics, StatsWriter, WordTable};
use crate::tokenizer::Tokenizer;
use anyhow::{bail, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared flag that stops parse tasks between pages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Completed { pages: u64 },
    Failed(String),
    /// Stopped early; pages sent before cancellation were still counted
    Cancelled { pages: u64 },
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Why a run's statistics may be missing contributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Incomplete {
    #[error("parsing did not finish within {0:?}")]
    ParseTimeout(Duration),
    #[error("aggregation did not drain within {0:?}")]
    AggregationTimeout(Duration),
}

pub struct RunSummary {
    pub statistics: Statistics,
    pub files: Vec<FileOutcome>,
    pub counters: CounterSnapshot,
    pub incomplete: Option<Incomplete>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Files that did not run to completion
    pub fn failed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| !matches!(f.status, FileStatus::Completed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.incomplete.is_none() && self.failed_files().next().is_none()
    }

    pub fn report(&self, top_words: usize) -> Report {
        Report::from_statistics(&self.statistics, top_words)
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle for stopping the run from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Parse and aggregate every input, returning once statistics are quiesced
    ///
    /// Per-file failures and timeouts are recorded in the summary; only setup
    /// problems (no inputs, thread pools that cannot start) are returned as errors.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<RunSummary> {
        if inputs.is_empty() {
            bail!("No input files given");
        }
        let started = Instant::now();
        let config = &self.config;

        let parse_pool = build_pool("parse", config.parse_threads)?;
        let aggregate_pool = build_pool("aggregate", config.aggregate_threads)?;

        let (statistics, writer) = Statistics::for_config(config);
        let counters = Arc::new(RunCounters::new());
        let tokenizer = Tokenizer::new(config.alphabet, config.min_word_len);
        let progress = make_progress(config.show_progress);

        info!(
            files = inputs.len(),
            parse_threads = config.parse_threads,
            aggregate_threads = config.aggregate_threads,
            queue_capacity = config.queue_capacity,
            "Starting pipeline"
        );

        let (page_tx, page_rx) = crossbeam_channel::bounded::<Page>(config.queue_capacity);
        for _ in 0..config.aggregate_threads {
            let page_rx = page_rx.clone();
            let writer = writer.clone();
            let counters = Arc::clone(&counters);
            aggregate_pool.spawn(move || aggregate_worker(page_rx, writer, tokenizer, &counters));
        }
        // Workers now hold the only receivers and writers
        drop(page_rx);
        drop(writer);

        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();
        for (index, path) in inputs.iter().enumerate() {
            let path = path.clone();
            let page_tx = page_tx.clone();
            let outcome_tx = outcome_tx.clone();
            let cancel = self.cancel.clone();
            let counters = Arc::clone(&counters);
            let progress = progress.clone();
            parse_pool.spawn(move || {
                let status = parse_file(&path, &page_tx, &cancel, &counters, &progress);
                // Close this task's end of the queue before reporting
                drop(page_tx);
                let _ = outcome_tx.send((index, status));
            });
        }
        drop(page_tx);
        drop(outcome_tx);

        let mut statuses: Vec<Option<FileStatus>> = vec![None; inputs.len()];
        let mut incomplete = None;
        let deadline = config.parse_timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let received = match deadline {
                Some(deadline) => outcome_rx.recv_deadline(deadline),
                None => outcome_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, status)) => statuses[index] = Some(status),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let waited = config.parse_timeout.unwrap_or_default();
                    warn!(?waited, "Parsing timed out, cancelling remaining files");
                    self.cancel.cancel();
                    incomplete = Some(Incomplete::ParseTimeout(waited));
                    break;
                }
            }
        }
        debug!("Parse stage finished, draining aggregation queue");

        if let Err(e) = statistics.completion_barrier(config.aggregate_timeout) {
            error!(error = %e, "Aggregation did not finish, statistics are partial");
            incomplete.get_or_insert(Incomplete::AggregationTimeout(e.waited));
        }
        progress.finish_and_clear();

        // Late reports from tasks that stopped after a parse timeout
        for (index, status) in outcome_rx.try_iter() {
            statuses[index] = Some(status);
        }
        let timed_out = matches!(incomplete, Some(Incomplete::ParseTimeout(_)));
        let files: Vec<FileOutcome> = inputs
            .iter()
            .zip(statuses)
            .map(|(path, status)| FileOutcome {
                path: path.clone(),
                status: status.unwrap_or_else(|| {
                    if timed_out {
                        FileStatus::TimedOut
                    } else {
                        FileStatus::Failed("parse task panicked".to_string())
                    }
                }),
            })
            .collect();

        let counters = counters.snapshot();
        let elapsed = started.elapsed();
        info!(
            duration_secs = elapsed.as_secs_f64(),
            pages = counters.pages_aggregated,
            incomplete_pages = counters.pages_incomplete,
            failed_files = files
                .iter()
                .filter(|f| !matches!(f.status, FileStatus::Completed { .. }))
                .count(),
            "Pipeline finished"
        );

        Ok(RunSummary {
            statistics,
            files,
            counters,
            incomplete,
            elapsed,
        })
    }
}

/// Convenience wrapper: validate `config`, then run it over `inputs`
pub fn run(config: &PipelineConfig, inputs: &[PathBuf]) -> Result<RunSummary> {
    Pipeline::new(config.clone())?.run(inputs)
}

fn build_pool(role: &'static str, threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("wikistat-{role}-{i}"))
        .panic_handler(move |_| error!(pool = role, "Worker task panicked"))
        .build()
        .with_context(|| format!("Failed to build {role} thread pool"))
}

fn make_progress(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {pos} pages") {
        pb.set_style(style);
    }
    pb
}

fn parse_file(
    path: &Path,
    page_tx: &Sender<Page>,
    cancel: &CancelToken,
    counters: &RunCounters,
    progress: &ProgressBar,
) -> FileStatus {
    if cancel.is_cancelled() {
        return FileStatus::Cancelled { pages: 0 };
    }
    info!(file = %path.display(), "Parsing dump");

    let reader = match DumpReader::open(path) {
        Ok(reader) => reader,
        Err(e) => return file_failed(path, e.into()),
    };
    let mut pages = Pages::new(reader);
    let mut sent = 0u64;

    let status = loop {
        if cancel.is_cancelled() {
            warn!(file = %path.display(), pages = sent, "Parsing cancelled");
            break FileStatus::Cancelled { pages: sent };
        }
        match pages.next() {
            Some(Ok(page)) => {
                if page_tx.send(page).is_err() {
                    break file_failed(path, anyhow::anyhow!("aggregation queue closed"));
                }
                sent += 1;
                counters.inc_extracted();
                if sent % PROGRESS_INTERVAL == 0 {
                    progress.set_position(counters.extracted());
                }
            }
            Some(Err(e)) => break file_failed(path, e.into()),
            None => {
                info!(file = %path.display(), pages = sent, "Finished dump");
                break FileStatus::Completed { pages: sent };
            }
        }
    };
    counters.add_incomplete(pages.incomplete());
    status
}

fn file_failed(path: &Path, e: anyhow::Error) -> FileStatus {
    error!(file = %path.display(), "Failed to process dump: {:#}", e);
    FileStatus::Failed(format!("{:#}", e))
}

fn aggregate_worker(
    pages: Receiver<Page>,
    writer: StatsWriter,
    tokenizer: Tokenizer,
    counters: &RunCounters,
) {
    for page in pages {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            aggregate_page(&page, &writer, &tokenizer, counters)
        }));
        match outcome {
            Ok(true) => counters.inc_aggregated(),
            Ok(false) => counters.inc_out_of_range(),
            Err(_) => {
                counters.inc_panicked();
                error!(title = %page.title, "Aggregation panicked, page skipped");
            }
        }
    }
}

/// Count one page into the statistics
///
/// Returns `false`, recording nothing, if its size bucket or year falls outside
/// the histograms.
pub fn aggregate_page(
    page: &Page,
    writer: &StatsWriter,
    tokenizer: &Tokenizer,
    counters: &RunCounters,
) -> bool {
    if !writer.size_in_range(page.size_bucket) || !writer.year_in_range(page.year) {
        warn!(
            title = %page.title,
            size_bucket = page.size_bucket,
            year = page.year,
            "Dropping page with out-of-range size or year"
        );
        return false;
    }
    let recorded = writer
        .record_size(page.size_bucket)
        .and_then(|()| writer.record_year(page.year));
    if let Err(e) = recorded {
        warn!(title = %page.title, error = %e, "Dropping page");
        return false;
    }

    counters.add_title_words(count_words(writer, tokenizer, WordTable::Title, &page.title));
    counters.add_text_words(count_words(writer, tokenizer, WordTable::Text, &page.text));
    true
}

fn count_words(writer: &StatsWriter, tokenizer: &Tokenizer, table: WordTable, text: &str) -> u64 {
    let mut words = tokenizer.words(text);
    let mut counted = 0;
    while let Some(word) = words.next_word() {
        writer.record_word(table, word);
        counted += 1;
    }
    counted
}
