//! Page extraction from a markup event stream
//!
//! [`PageExtractor`] is a tag-stack state machine. A start tag is recognized only
//! when its declared parent is the tag currently on top of the stack, so foreign
//! markup nested anywhere in the dump is tracked for depth but never handled.
//! Each `<page>` element yields at most one [`Page`], at its closing tag, and only
//! if title, text, size and year were all seen.

use crate::models::{parse_year, size_bucket, Page, PageBuilder, Tag};
use crate::parser::{ExtractError, MarkupEvent};
use tracing::{trace, warn};

#[derive(Debug, Default)]
pub struct PageExtractor {
    /// `None` entries mark unrecognized elements
    stack: Vec<Option<Tag>>,
    page: Option<PageBuilder>,
    timestamp: String,
}

impl PageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the machine by one event, returning a page when one completes
    pub fn handle(&mut self, event: MarkupEvent) -> Result<Option<Page>, ExtractError> {
        match event {
            MarkupEvent::Start { name, attributes } => {
                self.start(&name, &attributes);
                Ok(None)
            }
            MarkupEvent::Text(text) => {
                self.characters(&text);
                Ok(None)
            }
            MarkupEvent::End => self.end(),
        }
    }

    /// Check the document closed cleanly once events run out
    pub fn finish(&self) -> Result<(), ExtractError> {
        match self.stack.len() {
            0 => Ok(()),
            open => Err(ExtractError::UnexpectedEof { open }),
        }
    }

    fn start(&mut self, name: &str, attributes: &[(String, String)]) {
        let tag = Tag::from_name(name).filter(|tag| match (tag.parent(), self.stack.last()) {
            (None, None) => true,
            (Some(parent), Some(Some(top))) => parent == *top,
            _ => false,
        });
        self.stack.push(tag);

        match tag {
            Some(Tag::Page) => self.page = Some(PageBuilder::default()),
            Some(Tag::Text) => self.declared_size(attributes),
            Some(Tag::Timestamp) => self.timestamp.clear(),
            _ => {}
        }
    }

    fn declared_size(&mut self, attributes: &[(String, String)]) {
        let Some(page) = self.page.as_mut() else {
            return;
        };
        let Some((_, value)) = attributes.iter().find(|(key, _)| key == "bytes") else {
            return;
        };
        match value.trim().parse::<u64>() {
            Ok(bytes) => page.size_bucket = Some(size_bucket(bytes)),
            Err(e) => warn!(value = %value, error = %e, "Ignoring unparsable text size"),
        }
    }

    fn characters(&mut self, text: &str) {
        let Some(Some(top)) = self.stack.last().copied() else {
            return;
        };
        match top {
            Tag::Timestamp => self.timestamp.push_str(text),
            Tag::Title => {
                if let Some(page) = self.page.as_mut() {
                    page.title.push_str(text);
                }
            }
            Tag::Text => {
                if let Some(page) = self.page.as_mut() {
                    page.text.push_str(text);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self) -> Result<Option<Page>, ExtractError> {
        let tag = self.stack.pop().ok_or(ExtractError::UnbalancedEnd)?;
        match tag {
            Some(Tag::Timestamp) => {
                // Resolved at the close tag: the digits may have arrived in pieces
                let year = parse_year(&self.timestamp);
                if let Some(page) = self.page.as_mut() {
                    page.year = year;
                }
                Ok(None)
            }
            Some(Tag::Page) => {
                let page = self.page.take().and_then(PageBuilder::build);
                if page.is_none() {
                    trace!("Dropping incomplete page");
                }
                Ok(page)
            }
            _ => Ok(None),
        }
    }
}

/// Completed pages over a markup event stream
///
/// Yields `Err` at most once; the sequence ends after an error.
pub struct Pages<I> {
    events: I,
    extractor: PageExtractor,
    done: bool,
    incomplete: u64,
}

impl<I> Pages<I>
where
    I: Iterator<Item = Result<MarkupEvent, ExtractError>>,
{
    pub fn new(events: I) -> Self {
        Self {
            events,
            extractor: PageExtractor::new(),
            done: false,
            incomplete: 0,
        }
    }

    /// `<page>` elements closed without all four fields so far
    pub fn incomplete(&self) -> u64 {
        self.incomplete
    }
}

impl<I> Iterator for Pages<I>
where
    I: Iterator<Item = Result<MarkupEvent, ExtractError>>,
{
    type Item = Result<Page, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(event) = self.events.next() else {
                self.done = true;
                return self.extractor.finish().err().map(Err);
            };
            let closes_page = matches!(event, Ok(MarkupEvent::End))
                && self.extractor.stack.last() == Some(&Some(Tag::Page));
            match event.and_then(|event| self.extractor.handle(event)) {
                Ok(Some(page)) => return Some(Ok(page)),
                Ok(None) if closes_page => self.incomplete += 1,
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
