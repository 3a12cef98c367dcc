use crate::tokenizer::Alphabet;
use std::time::Duration;

/// Number of page size buckets (bucket = decimal digit count of the declared byte size)
pub const SIZE_BUCKETS: usize = 10;

/// Number of consecutive years tracked by the year histogram, starting at `min_year`
pub const YEAR_SPAN: usize = 3000;

/// Entries reported per word table
pub const DEFAULT_TOP_WORDS: usize = 300;

/// Default worker count for each pool
pub const DEFAULT_THREADS: usize = 4;

/// Upper bound for either pool's worker count
pub const MAX_THREADS: usize = 32;

/// Default bound on the parse stage; generous enough for a full dump on one thread
pub const DEFAULT_PARSE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Default bound on the aggregation drain after parsing has finished
pub const DEFAULT_AGGREGATE_TIMEOUT_SECS: u64 = 180;

/// Queued pages allowed per aggregation worker before parsers block
pub const QUEUE_PAGES_PER_WORKER: usize = 64;

/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{pool} parallelism must be in 1..={max}, got {value}")]
    Parallelism {
        pool: &'static str,
        value: usize,
        max: usize,
    },
    #[error("page queue capacity must be positive")]
    ZeroQueueCapacity,
    #[error("minimum year {0} leaves no room for the year histogram")]
    MinYear(u32),
}

/// Everything the pipeline needs to know for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Workers decompressing and parsing files (one task per file)
    pub parse_threads: usize,
    /// Workers tokenizing and counting pages
    pub aggregate_threads: usize,
    /// Pages buffered between the two pools
    pub queue_capacity: usize,
    /// Bound on waiting for parse tasks; `None` waits for as long as parsing takes
    pub parse_timeout: Option<Duration>,
    /// Bound on the aggregation drain once parsing is done
    pub aggregate_timeout: Duration,
    pub alphabet: Alphabet,
    /// Shortest token counted, in characters (0 counts everything)
    pub min_word_len: usize,
    /// Year stored at index 0 of the year histogram
    pub min_year: u32,
    pub top_words: usize,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parse_threads: DEFAULT_THREADS,
            aggregate_threads: DEFAULT_THREADS,
            queue_capacity: DEFAULT_THREADS * QUEUE_PAGES_PER_WORKER,
            parse_timeout: Some(Duration::from_secs(DEFAULT_PARSE_TIMEOUT_SECS)),
            aggregate_timeout: Duration::from_secs(DEFAULT_AGGREGATE_TIMEOUT_SECS),
            alphabet: Alphabet::Cyrillic,
            min_word_len: 0,
            min_year: 0,
            top_words: DEFAULT_TOP_WORDS,
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    /// Same parallelism for both pools, queue sized to match
    pub fn with_threads(threads: usize) -> Self {
        Self {
            parse_threads: threads,
            aggregate_threads: threads,
            queue_capacity: threads.max(1) * QUEUE_PAGES_PER_WORKER,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (pool, value) in [
            ("parse", self.parse_threads),
            ("aggregate", self.aggregate_threads),
        ] {
            if !(1..=MAX_THREADS).contains(&value) {
                return Err(ConfigError::Parallelism {
                    pool,
                    value,
                    max: MAX_THREADS,
                });
            }
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if (self.min_year as u64) + (YEAR_SPAN as u64) > u32::MAX as u64 {
            return Err(ConfigError::MinYear(self.min_year));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn both_waits_are_bounded_by_default() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.parse_timeout,
            Some(Duration::from_secs(DEFAULT_PARSE_TIMEOUT_SECS))
        );
        assert_eq!(
            config.aggregate_timeout,
            Duration::from_secs(DEFAULT_AGGREGATE_TIMEOUT_SECS)
        );
    }

    #[test]
    fn rejects_zero_threads() {
        let config = PipelineConfig {
            parse_threads: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Parallelism {
                pool: "parse",
                value: 0,
                max: MAX_THREADS
            })
        );
    }

    #[test]
    fn rejects_too_many_aggregate_threads() {
        let config = PipelineConfig {
            aggregate_threads: MAX_THREADS + 1,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Parallelism {
                pool: "aggregate",
                ..
            })
        ));
    }

    #[test]
    fn accepts_bounds() {
        assert!(PipelineConfig::with_threads(1).validate().is_ok());
        assert!(PipelineConfig::with_threads(MAX_THREADS).validate().is_ok());
    }

    #[test]
    fn rejects_zero_queue() {
        let config = PipelineConfig {
            queue_capacity: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn rejects_overflowing_min_year() {
        let config = PipelineConfig {
            min_year: u32::MAX - 10,
            ..PipelineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::MinYear(u32::MAX - 10)));
    }
}
