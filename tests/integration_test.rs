//! End-to-end tests for the wikistat pipeline.
//!
//! Dumps are built in memory, compressed with BZ2 and written to temp files whose
//! names end in `.xml.bz2`, so the reader picks the decompressor just as it would
//! for a real dump. Tests are grouped as:
//!
//! - **Reader Tests** -- BZ2 decompression, multistream input, page extraction
//! - **Pipeline Tests** -- Statistics over several files, failure isolation, timeouts
//! - **Report Tests** -- Rendered layout and determinism across parallelism levels

use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use wikistat::config::PipelineConfig;
use wikistat::extract::Pages;
use wikistat::parser::DumpReader;
use wikistat::pipeline::{self, FileStatus, Incomplete};
use wikistat::stats::{Statistics, WordTable};

fn compress(xml: &str) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Write raw bytes to a temp file named like a compressed dump
fn dump_file(bytes: &[u8]) -> NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(".xml.bz2")
        .tempfile()
        .unwrap();
    tmp.write_all(bytes).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn bz2_dump(xml: &str) -> NamedTempFile {
    dump_file(&compress(xml))
}

fn page(title: &str, bytes: u64, timestamp: &str, text: &str) -> String {
    format!(
        "  <page>\n    <title>{title}</title>\n    <ns>0</ns>\n    <revision>\n      \
         <id>1</id>\n      <timestamp>{timestamp}</timestamp>\n      \
         <contributor><username>Bot</username></contributor>\n      \
         <text xml:space=\"preserve\" bytes=\"{bytes}\">{text}</text>\n    \
         </revision>\n  </page>\n"
    )
}

fn mediawiki(pages: &[String]) -> String {
    format!(
        "<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.10/\" xml:lang=\"ru\">\n  \
         <siteinfo><sitename>Википедия</sitename></siteinfo>\n{}</mediawiki>\n",
        pages.concat()
    )
}

/// Two small dumps with overlapping vocabulary
fn sample_dumps() -> (NamedTempFile, NamedTempFile) {
    let first = mediawiki(&[
        page(
            "Москва",
            12345,
            "2008-05-01T10:00:00Z",
            "Москва столица России. Москва большой город.",
        ),
        page("Река", 87, "2010-02-03T00:00:00Z", "Река течёт в море."),
    ]);
    let second = mediawiki(&[
        page(
            "Город Москва",
            640,
            "2010-11-30T12:00:00Z",
            "Город и столица.",
        ),
        page("Пустая", 0, "2012-01-01T00:00:00Z", "текст"),
    ]);
    (bz2_dump(&first), bz2_dump(&second))
}

fn paths(files: &[&NamedTempFile]) -> Vec<PathBuf> {
    files.iter().map(|f| f.path().to_path_buf()).collect()
}

fn config(threads: usize) -> PipelineConfig {
    PipelineConfig {
        aggregate_timeout: Duration::from_secs(60),
        ..PipelineConfig::with_threads(threads)
    }
}

fn sorted_words(stats: &Statistics, table: WordTable) -> Vec<(String, u64)> {
    let mut words: Vec<_> = stats
        .words(table)
        .iter()
        .map(|e| (e.key().clone(), *e.value()))
        .collect();
    words.sort();
    words
}

// ============================================================================
// Reader Tests
// ============================================================================

#[test]
fn test_reads_pages_from_bz2() {
    let (first, _) = sample_dumps();
    let reader = DumpReader::open(first.path()).unwrap();
    let pages: Vec<_> = Pages::new(reader).collect::<Result<_, _>>().unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].title, "Москва");
    assert_eq!(pages[0].size_bucket, 5);
    assert_eq!(pages[0].year, 2008);
    assert_eq!(pages[0].text, "Москва столица России. Москва большой город.");
    assert_eq!(pages[1].title, "Река");
    assert_eq!(pages[1].size_bucket, 2);
    assert_eq!(pages[1].year, 2010);
}

#[test]
fn test_reads_multistream_bz2() {
    let head = format!(
        "<mediawiki>\n{}",
        page("Первая", 10, "2001-01-01T00:00:00Z", "один")
    );
    let tail = format!(
        "{}</mediawiki>\n",
        page("Вторая", 100, "2002-01-01T00:00:00Z", "два")
    );
    let mut bytes = compress(&head);
    bytes.extend(compress(&tail));
    let dump = dump_file(&bytes);

    let reader = DumpReader::open(dump.path()).unwrap();
    let titles: Vec<_> = Pages::new(reader)
        .map(|p| p.unwrap().title)
        .collect();
    assert_eq!(titles, ["Первая", "Вторая"]);
}

#[test]
fn test_missing_timestamp_is_incomplete() {
    let xml = mediawiki(&[
        "<page><title>Без даты</title><revision><text bytes=\"4\">тело</text></revision></page>"
            .to_string(),
        page("С датой", 4, "2019-06-01T00:00:00Z", "тело"),
    ]);
    let dump = bz2_dump(&xml);

    let reader = DumpReader::open(dump.path()).unwrap();
    let mut pages = Pages::new(reader);
    let titles: Vec<_> = pages.by_ref().map(|p| p.unwrap().title).collect();
    assert_eq!(titles, ["С датой"]);
    assert_eq!(pages.incomplete(), 1);
}

#[test]
fn test_split_text_keeps_word_boundaries() {
    let xml = mediawiki(&[page(
        "Раз<!-- c --> два",
        10,
        "2019-06-01T00:00:00Z",
        "слово<!-- c --> другое <b>x</b>третье",
    )]);
    let dump = bz2_dump(&xml);

    let summary = pipeline::run(&config(1), &paths(&[&dump])).unwrap();
    let text = sorted_words(&summary.statistics, WordTable::Text);
    assert_eq!(
        text,
        [
            ("другое".to_string(), 1),
            ("слово".to_string(), 1),
            ("третье".to_string(), 1)
        ]
    );
    let titles = sorted_words(&summary.statistics, WordTable::Title);
    assert_eq!(titles, [("два".to_string(), 1), ("раз".to_string(), 1)]);
}

#[test]
fn test_open_missing_file_fails() {
    assert!(DumpReader::open(std::path::Path::new("/nonexistent/dump.xml.bz2")).is_err());
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[test]
fn test_pipeline_aggregates_all_files() {
    let (first, second) = sample_dumps();
    let summary = pipeline::run(&config(2), &paths(&[&first, &second])).unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.counters.pages_extracted, 4);
    assert_eq!(summary.counters.pages_aggregated, 4);

    let stats = &summary.statistics;
    let sizes = stats.size_histogram();
    // A zero-byte page has one digit
    assert_eq!(sizes[0], 0);
    assert_eq!(sizes[1], 1);
    assert_eq!(sizes[2], 1);
    assert_eq!(sizes[3], 1);
    assert_eq!(sizes[5], 1);
    assert_eq!(sizes.iter().sum::<u64>(), 4);

    let years = stats.year_histogram();
    assert_eq!(years[2008], 1);
    assert_eq!(years[2010], 2);
    assert_eq!(years[2012], 1);

    let titles = stats.words(WordTable::Title);
    assert_eq!(*titles.get("москва").unwrap(), 2);
    assert_eq!(*titles.get("город").unwrap(), 1);

    let text = stats.words(WordTable::Text);
    assert_eq!(*text.get("москва").unwrap(), 2);
    assert_eq!(*text.get("столица").unwrap(), 2);
    assert_eq!(*text.get("город").unwrap(), 2);
    // "течёт" splits on ё
    assert_eq!(*text.get("теч").unwrap(), 1);
    assert_eq!(*text.get("т").unwrap(), 1);
}

#[test]
fn test_corrupt_file_fails_alone() {
    let (first, second) = sample_dumps();
    let corrupt = dump_file(b"this is not a bzip2 stream at all");

    let summary = pipeline::run(&config(3), &paths(&[&first, &corrupt, &second])).unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.files[0].status, FileStatus::Completed { pages: 2 });
    assert!(matches!(summary.files[1].status, FileStatus::Failed(_)));
    assert_eq!(summary.files[2].status, FileStatus::Completed { pages: 2 });
    assert_eq!(summary.counters.pages_aggregated, 4);
    assert!(summary.incomplete.is_none());
}

#[test]
fn test_truncated_markup_keeps_earlier_pages() {
    let xml = format!(
        "<mediawiki>{}<page><title>Обрыв</title><revision>",
        page("Целая", 10, "2015-01-01T00:00:00Z", "слово")
    );
    let dump = bz2_dump(&xml);

    let summary = pipeline::run(&config(1), &paths(&[&dump])).unwrap();
    assert!(matches!(summary.files[0].status, FileStatus::Failed(_)));
    assert_eq!(summary.counters.pages_aggregated, 1);
    assert_eq!(summary.statistics.year_histogram()[2015], 1);
}

#[test]
fn test_parse_timeout_cancels_run() {
    let pages: Vec<String> = (0..20_000)
        .map(|i| {
            page(
                &format!("Статья {i}"),
                i,
                "2020-01-01T00:00:00Z",
                "много разных слов в длинной статье",
            )
        })
        .collect();
    let dump = bz2_dump(&mediawiki(&pages));
    let config = PipelineConfig {
        parse_timeout: Some(Duration::from_millis(1)),
        ..config(1)
    };

    let summary = pipeline::run(&config, &paths(&[&dump])).unwrap();
    assert_eq!(
        summary.incomplete,
        Some(Incomplete::ParseTimeout(Duration::from_millis(1)))
    );
    assert!(!summary.is_success());
    assert!(!matches!(
        summary.files[0].status,
        FileStatus::Completed { .. }
    ));
    // Pages counted before cancellation are consistent across the histograms
    let stats = &summary.statistics;
    assert_eq!(
        stats.size_histogram().iter().sum::<u64>(),
        summary.counters.pages_aggregated
    );
    assert_eq!(
        stats.year_histogram().iter().sum::<u64>(),
        summary.counters.pages_aggregated
    );
}

// ============================================================================
// Report Tests
// ============================================================================

#[test]
fn test_report_layout() {
    let (first, second) = sample_dumps();
    let summary = pipeline::run(&config(2), &paths(&[&first, &second])).unwrap();
    let rendered = summary.report(2).render();

    let expected = "Топ-2 слов в заголовках статей:\n\
                    2 москва\n\
                    1 город\n\
                    \n\
                    Топ-2 слов в статьях:\n\
                    2 город\n\
                    2 москва\n\
                    \n\
                    Распределение статей по размеру:\n\
                    1 1\n\
                    2 1\n\
                    3 1\n\
                    4 0\n\
                    5 1\n\
                    \n\
                    Распределение статей по времени:\n\
                    2008 1\n\
                    2009 0\n\
                    2010 2\n\
                    2011 0\n\
                    2012 1\n";
    assert_eq!(rendered, expected);
}

#[test]
fn test_statistics_independent_of_parallelism() {
    let dumps: Vec<NamedTempFile> = (0..6)
        .map(|f| {
            let pages: Vec<String> = (0..50u64)
                .map(|i| {
                    page(
                        &format!("Файл {f} страница"),
                        i * 37,
                        &format!("{}-01-01T00:00:00Z", 2000 + (i % 7)),
                        &"альфа бета гамма бета ".repeat((i % 5 + 1) as usize),
                    )
                })
                .collect();
            bz2_dump(&mediawiki(&pages))
        })
        .collect();
    let inputs: Vec<PathBuf> = dumps.iter().map(|f| f.path().to_path_buf()).collect();

    let serial = pipeline::run(&config(1), &inputs).unwrap();
    let parallel = pipeline::run(&config(16), &inputs).unwrap();

    assert!(serial.is_success() && parallel.is_success());
    assert_eq!(serial.counters, parallel.counters);
    assert_eq!(
        serial.statistics.size_histogram(),
        parallel.statistics.size_histogram()
    );
    assert_eq!(
        serial.statistics.year_histogram(),
        parallel.statistics.year_histogram()
    );
    for table in [WordTable::Title, WordTable::Text] {
        assert_eq!(
            sorted_words(&serial.statistics, table),
            sorted_words(&parallel.statistics, table)
        );
    }
    assert_eq!(serial.report(10).render(), parallel.report(10).render());
    assert_eq!(
        *serial.statistics.words(WordTable::Text).get("бета").unwrap(),
        6 * 2 * 150
    );
}

#[test]
fn test_report_is_repeatable() {
    let (first, second) = sample_dumps();
    let summary = pipeline::run(&config(4), &paths(&[&first, &second])).unwrap();
    let once = summary.report(300).render();
    let twice = summary.report(300).render();
    assert_eq!(once, twice);
    assert_eq!(
        summary.report(300).to_json().unwrap(),
        summary.report(300).to_json().unwrap()
    );
}
