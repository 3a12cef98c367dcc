//! Shared statistics for one run
//!
//! [`Statistics`] owns two fixed-size histograms and two word tables. All
//! mutation goes through [`StatsWriter`] handles: histogram cells are atomic
//! counters, and a word-table increment (including first insertion) happens under
//! the owning DashMap shard's write lock, so concurrent writers never lose an
//! update. [`Statistics::completion_barrier`] waits until every writer handle has
//! been dropped, which orders all increments before any read that follows it.

use crate::config::{PipelineConfig, SIZE_BUCKETS, YEAR_SPAN};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type WordCounts = DashMap<String, u64, FxBuildHasher>;

/// Which word table a word is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordTable {
    Title,
    Text,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("size bucket {bucket} outside 0..{buckets}")]
    SizeOutOfRange { bucket: u32, buckets: usize },
    #[error("year {year} outside {min}..{end}")]
    YearOutOfRange { year: u32, min: u32, end: u64 },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("statistics writers still active after {waited:?}")]
pub struct BarrierTimeout {
    pub waited: Duration,
}

#[derive(Debug)]
struct Histogram {
    cells: Box<[AtomicU64]>,
}

impl Histogram {
    fn new(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn increment(&self, index: usize) -> bool {
        match self.cells.get(index) {
            Some(cell) => {
                cell.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<u64> {
        self.cells
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect()
    }
}

#[derive(Debug)]
struct Counters {
    sizes: Histogram,
    years: Histogram,
    min_year: u32,
    title_words: WordCounts,
    text_words: WordCounts,
}

impl Counters {
    fn year_index(&self, year: u32) -> Option<usize> {
        let offset = year.checked_sub(self.min_year)? as usize;
        (offset < YEAR_SPAN).then_some(offset)
    }

    fn table(&self, table: WordTable) -> &WordCounts {
        match table {
            WordTable::Title => &self.title_words,
            WordTable::Text => &self.text_words,
        }
    }
}

/// Aggregated statistics for one run
#[derive(Debug)]
pub struct Statistics {
    counters: Arc<Counters>,
    writers_gone: Receiver<Infallible>,
}

/// Cloneable handle through which statistics are recorded
#[derive(Debug, Clone)]
pub struct StatsWriter {
    counters: Arc<Counters>,
    _alive: Sender<Infallible>,
}

impl Statistics {
    /// Fresh statistics plus the root writer; clone it for every producer
    pub fn new(min_year: u32) -> (Self, StatsWriter) {
        let counters = Arc::new(Counters {
            sizes: Histogram::new(SIZE_BUCKETS),
            years: Histogram::new(YEAR_SPAN),
            min_year,
            title_words: WordCounts::default(),
            text_words: WordCounts::default(),
        });
        let (alive, writers_gone) = crossbeam_channel::bounded(0);
        let writer = StatsWriter {
            counters: Arc::clone(&counters),
            _alive: alive,
        };
        (
            Self {
                counters,
                writers_gone,
            },
            writer,
        )
    }

    pub fn for_config(config: &PipelineConfig) -> (Self, StatsWriter) {
        Self::new(config.min_year)
    }

    /// Block until every [`StatsWriter`] is dropped, or fail after `timeout`
    pub fn completion_barrier(&self, timeout: Duration) -> Result<(), BarrierTimeout> {
        match self.writers_gone.recv_timeout(timeout) {
            Ok(never) => match never {},
            Err(RecvTimeoutError::Disconnected) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(BarrierTimeout { waited: timeout }),
        }
    }

    /// Page counts indexed by size bucket
    pub fn size_histogram(&self) -> Vec<u64> {
        self.counters.sizes.snapshot()
    }

    /// Page counts indexed by `year - min_year`
    pub fn year_histogram(&self) -> Vec<u64> {
        self.counters.years.snapshot()
    }

    pub fn min_year(&self) -> u32 {
        self.counters.min_year
    }

    pub fn words(&self, table: WordTable) -> &WordCounts {
        self.counters.table(table)
    }
}

impl StatsWriter {
    pub fn size_in_range(&self, bucket: u32) -> bool {
        (bucket as usize) < SIZE_BUCKETS
    }

    pub fn year_in_range(&self, year: u32) -> bool {
        self.counters.year_index(year).is_some()
    }

    pub fn record_size(&self, bucket: u32) -> Result<(), StatsError> {
        if self.counters.sizes.increment(bucket as usize) {
            Ok(())
        } else {
            Err(StatsError::SizeOutOfRange {
                bucket,
                buckets: SIZE_BUCKETS,
            })
        }
    }

    pub fn record_year(&self, year: u32) -> Result<(), StatsError> {
        let recorded = self
            .counters
            .year_index(year)
            .is_some_and(|index| self.counters.years.increment(index));
        if recorded {
            Ok(())
        } else {
            Err(StatsError::YearOutOfRange {
                year,
                min: self.counters.min_year,
                end: self.counters.min_year as u64 + YEAR_SPAN as u64,
            })
        }
    }

    /// Count one occurrence of `word`, inserting it on first sight
    pub fn record_word(&self, table: WordTable, word: &str) {
        let counts = self.counters.table(table);
        // Known words are bumped in place without allocating a key
        if let Some(mut count) = counts.get_mut(word) {
            *count += 1;
            return;
        }
        *counts.entry(word.to_owned()).or_insert(0) += 1;
    }
}
