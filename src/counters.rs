use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pipeline bookkeeping collected during a run
#[derive(Default)]
pub struct RunCounters {
    pub pages_extracted: AtomicU64,
    pub pages_incomplete: AtomicU64,
    pub pages_aggregated: AtomicU64,
    pub pages_out_of_range: AtomicU64,
    pub pages_panicked: AtomicU64,
    pub title_words: AtomicU64,
    pub text_words: AtomicU64,
}

/// Plain copy of [`RunCounters`] taken once the run has quiesced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub pages_extracted: u64,
    pub pages_incomplete: u64,
    pub pages_aggregated: u64,
    pub pages_out_of_range: u64,
    pub pages_panicked: u64,
    pub title_words: u64,
    pub text_words: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_extracted(&self) {
        self.pages_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_incomplete(&self, count: u64) {
        self.pages_incomplete.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_aggregated(&self) {
        self.pages_aggregated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_out_of_range(&self) {
        self.pages_out_of_range.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_panicked(&self) {
        self.pages_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_title_words(&self, count: u64) {
        self.title_words.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_text_words(&self, count: u64) {
        self.text_words.fetch_add(count, Ordering::Relaxed);
    }

    pub fn extracted(&self) -> u64 {
        self.pages_extracted.load(Ordering::Relaxed)
    }

    pub fn aggregated(&self) -> u64 {
        self.pages_aggregated.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            pages_extracted: self.extracted(),
            pages_incomplete: self.pages_incomplete.load(Ordering::Relaxed),
            pages_aggregated: self.aggregated(),
            pages_out_of_range: self.pages_out_of_range.load(Ordering::Relaxed),
            pages_panicked: self.pages_panicked.load(Ordering::Relaxed),
            title_words: self.title_words.load(Ordering::Relaxed),
            text_words: self.text_words.load(Ordering::Relaxed),
        }
    }
}
