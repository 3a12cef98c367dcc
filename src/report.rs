//! Ranked and segmented views over quiesced statistics

use crate::stats::{Statistics, WordCounts, WordTable};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

/// One histogram cell: size bucket or calendar year, and its page count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bar {
    pub key: u64,
    pub count: u64,
}

/// Heap key whose maximum is the weakest entry: lowest count, then greatest word
type Ranked = (Reverse<u64>, String);

/// The `k` most frequent words, by descending count then ascending word
pub fn top_words(counts: &WordCounts, k: usize) -> Vec<WordCount> {
    if k == 0 {
        return Vec::new();
    }

    let top = counts
        .par_iter()
        // Each thread keeps its own k best entries...
        .fold(
            || BinaryHeap::with_capacity(k + 1),
            |mut heap: BinaryHeap<Ranked>, entry| {
                let count = *entry.value();
                let beats_weakest = heap.len() < k
                    || heap.peek().is_some_and(|(Reverse(weak_count), weak_word)| {
                        (Reverse(count), entry.key().as_str())
                            < (Reverse(*weak_count), weak_word.as_str())
                    });
                if beats_weakest {
                    heap.push((Reverse(count), entry.key().clone()));
                    if heap.len() > k {
                        heap.pop();
                    }
                }
                heap
            },
        )
        // ...then thread results are merged down to k overall
        .reduce(BinaryHeap::new, |heap1, heap2| {
            let (mut dst, src) = if heap1.len() >= heap2.len() {
                (heap1, heap2)
            } else {
                (heap2, heap1)
            };
            for ranked in src {
                dst.push(ranked);
                if dst.len() > k {
                    dst.pop();
                }
            }
            dst
        });

    top.into_sorted_vec()
        .into_iter()
        .map(|(Reverse(count), word)| WordCount { word, count })
        .collect()
}

/// Every `(index, count)` from the first non-zero cell through the last one
///
/// Zero cells between the two ends are kept; an all-zero array yields nothing.
pub fn non_zero_segment(counts: &[u64]) -> Vec<(usize, u64)> {
    let Some(first) = counts.iter().position(|&c| c != 0) else {
        return Vec::new();
    };
    let last = counts.iter().rposition(|&c| c != 0).unwrap_or(first);
    (first..=last).map(|i| (i, counts[i])).collect()
}

/// Presentation-ready statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub top_words: usize,
    pub title_words: Vec<WordCount>,
    pub text_words: Vec<WordCount>,
    pub sizes: Vec<Bar>,
    pub years: Vec<Bar>,
}

impl Report {
    /// Reduce statistics; only meaningful after their completion barrier
    pub fn from_statistics(stats: &Statistics, top: usize) -> Self {
        let min_year = stats.min_year() as u64;
        let bars = |segment: Vec<(usize, u64)>, offset: u64| {
            segment
                .into_iter()
                .map(|(i, count)| Bar {
                    key: i as u64 + offset,
                    count,
                })
                .collect()
        };
        Self {
            top_words: top,
            title_words: top_words(stats.words(WordTable::Title), top),
            text_words: top_words(stats.words(WordTable::Text), top),
            sizes: bars(non_zero_segment(&stats.size_histogram()), 0),
            years: bars(non_zero_segment(&stats.year_histogram()), min_year),
        }
    }

    /// Text report: two word rankings, then the size and year distributions
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut num = itoa::Buffer::new();

        push_header(&mut out, &mut num, "слов в заголовках статей:", self.top_words);
        push_words(&mut out, &mut num, &self.title_words);
        out.push('\n');

        push_header(&mut out, &mut num, "слов в статьях:", self.top_words);
        push_words(&mut out, &mut num, &self.text_words);
        out.push('\n');

        out.push_str("Распределение статей по размеру:\n");
        push_bars(&mut out, &mut num, &self.sizes);
        out.push('\n');

        out.push_str("Распределение статей по времени:\n");
        push_bars(&mut out, &mut num, &self.years);
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `Топ-<top> <label>` line heading a word ranking
fn push_header(out: &mut String, num: &mut itoa::Buffer, label: &str, top: usize) {
    out.push_str("Топ-");
    out.push_str(num.format(top));
    out.push(' ');
    out.push_str(label);
    out.push('\n');
}

fn push_words(out: &mut String, num: &mut itoa::Buffer, words: &[WordCount]) {
    for entry in words {
        out.push_str(num.format(entry.count));
        out.push(' ');
        out.push_str(&entry.word);
        out.push('\n');
    }
}

fn push_bars(out: &mut String, num: &mut itoa::Buffer, bars: &[Bar]) {
    for bar in bars {
        out.push_str(num.format(bar.key));
        out.push(' ');
        out.push_str(num.format(bar.count));
        out.push('\n');
    }
}
