//! Wikistat: word and page statistics over Wikipedia XML dumps
//!
//! This crate streams one or more bzip2-compressed MediaWiki dumps and aggregates:
//!
//! 1. **Title words** -- frequency of every normalized word in page titles
//! 2. **Text words** -- frequency of every normalized word in page bodies
//! 3. **Page sizes** -- pages per order of magnitude of their declared byte size
//! 4. **Publication years** -- pages per year of their revision timestamp
//!
//! The aggregated statistics are reduced into a text report (top words plus the
//! non-zero part of each histogram) and optionally JSON for chart rendering.
//!
//! # Architecture
//!
//! - **Streaming XML parsing** -- Never loads a dump into memory; pulls markup events
//!   through a multistream BZ2 decoder
//! - **Tag-stack state machine** -- Recognizes `page/title/revision/text/timestamp`
//!   only in their expected positions and emits each complete page exactly once
//! - **Two worker pools** -- One rayon pool parses files, another counts pages; a
//!   bounded queue between them applies back-pressure
//! - **Concurrent aggregation** -- Atomic histogram cells and DashMap word tables
//!   accept updates from every worker without losing increments
//! - **Completion barrier** -- Statistics are read only after every writer handle
//!   has been dropped
//!
//! # Key Modules
//!
//! - [`parser`] -- BZ2 decompression and markup events
//! - [`extract`] -- Page extraction state machine
//! - [`tokenizer`] -- Word splitting and case folding
//! - [`stats`] -- Shared histograms and word tables
//! - [`pipeline`] -- Worker pools, failure isolation, timeouts
//! - [`report`] -- Top-K words and histogram segments
//! - [`models`] -- Page records and tag hierarchy
//! - [`counters`] -- Run bookkeeping
//! - [`config`] -- Constants and pipeline configuration
//!
//! # Example Usage
//!
//! ```bash
//! wikistat --inputs ruwiki-1.xml.bz2,ruwiki-2.xml.bz2 --output statistics.txt --threads 8
//! ```

pub mod config;
pub mod counters;
pub mod extract;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod tokenizer;
