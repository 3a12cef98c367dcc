use bzip2::read::MultiBzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const READ_BUFFER: usize = 256 * 1024;

/// Markup event as seen by the page extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Start {
        name: String,
        attributes: Vec<(String, String)>,
    },
    End,
    Text(String),
}

impl MarkupEvent {
    pub fn start(name: &str) -> Self {
        MarkupEvent::Start {
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn start_with(name: &str, attributes: &[(&str, &str)]) -> Self {
        MarkupEvent::Start {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn text(text: &str) -> Self {
        MarkupEvent::Text(text.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decode error at byte {position}")]
    Decode {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("malformed markup at byte {position}")]
    Markup {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("end tag without a matching start tag")]
    UnbalancedEnd,
    #[error("input ended with {open} unclosed element(s)")]
    UnexpectedEof { open: usize },
}

impl ExtractError {
    fn from_xml(position: u64, source: quick_xml::Error) -> Self {
        match source {
            // The decompressor reports corrupt or truncated input as I/O errors
            quick_xml::Error::Io(_) => ExtractError::Decode { position, source },
            source => ExtractError::Markup { position, source },
        }
    }
}

/// Pull-based markup events over a (possibly bzip2-compressed) dump
pub struct DumpReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    pending_end: bool,
    done: bool,
}

pub type BoxedInput = Box<dyn BufRead + Send>;

impl DumpReader<BoxedInput> {
    /// Open a dump; `.bz2` files are decompressed, anything else is read as XML
    pub fn open(path: &Path) -> Result<Self, ExtractError> {
        let file = File::open(path).map_err(|source| ExtractError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let is_bz2 = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));
        let input: BoxedInput = if is_bz2 {
            Box::new(BufReader::with_capacity(
                READ_BUFFER,
                MultiBzDecoder::new(file),
            ))
        } else {
            Box::new(BufReader::with_capacity(READ_BUFFER, file))
        };
        Ok(Self::from_reader(input))
    }
}

impl<R: BufRead> DumpReader<R> {
    pub fn from_reader(input: R) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::with_capacity(64 * 1024),
            pending_end: false,
            done: false,
        }
    }

    /// Offset into the decoded stream
    pub fn byte_offset(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn fail(&mut self, source: quick_xml::Error) -> Option<Result<MarkupEvent, ExtractError>> {
        self.done = true;
        Some(Err(ExtractError::from_xml(self.byte_offset(), source)))
    }
}

fn start_event(e: &BytesStart) -> Result<MarkupEvent, quick_xml::Error> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        attributes.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(MarkupEvent::Start { name, attributes })
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<MarkupEvent, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending_end {
            self.pending_end = false;
            return Some(Ok(MarkupEvent::End));
        }
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => start_event(&e),
                Ok(Event::Empty(e)) => {
                    let start = start_event(&e);
                    self.pending_end = start.is_ok();
                    start
                }
                Ok(Event::End(_)) => Ok(MarkupEvent::End),
                Ok(Event::Text(e)) => e.unescape().map(|t| MarkupEvent::Text(t.into_owned())),
                Ok(Event::CData(e)) => Ok(MarkupEvent::Text(
                    String::from_utf8_lossy(&e.into_inner()).into_owned(),
                )),
                Ok(Event::Eof) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => continue,
                Err(e) => Err(e),
            };
            return match event {
                Ok(event) => Some(Ok(event)),
                Err(e) => self.fail(e),
            };
        }
    }
}
