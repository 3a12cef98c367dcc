/// Dump elements the extractor tracks, each with the parent it must appear under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    MediaWiki,
    Page,
    Title,
    Revision,
    Text,
    Timestamp,
}

impl Tag {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mediawiki" => Some(Tag::MediaWiki),
            "page" => Some(Tag::Page),
            "title" => Some(Tag::Title),
            "revision" => Some(Tag::Revision),
            "text" => Some(Tag::Text),
            "timestamp" => Some(Tag::Timestamp),
            _ => None,
        }
    }

    /// `None` for the document root
    pub fn parent(self) -> Option<Tag> {
        match self {
            Tag::MediaWiki => None,
            Tag::Page => Some(Tag::MediaWiki),
            Tag::Title | Tag::Revision => Some(Tag::Page),
            Tag::Text | Tag::Timestamp => Some(Tag::Revision),
        }
    }
}

/// A fully populated page, ready for aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub text: String,
    /// Decimal digit count of the declared text size in bytes
    pub size_bucket: u32,
    pub year: u32,
}

/// Page under construction while its `<page>` element is open
#[derive(Debug, Default)]
pub struct PageBuilder {
    pub title: String,
    pub text: String,
    pub size_bucket: Option<u32>,
    pub year: Option<u32>,
}

impl PageBuilder {
    /// `None` unless title, text, size and year were all populated
    pub fn build(self) -> Option<Page> {
        if self.title.is_empty() || self.text.is_empty() {
            return None;
        }
        Some(Page {
            title: self.title,
            text: self.text,
            size_bucket: self.size_bucket?,
            year: self.year?,
        })
    }
}

/// Size bucket for a declared byte length: its number of decimal digits
///
/// `0` is written with one digit, so it shares bucket 1 with `1..=9`.
pub fn size_bucket(bytes: u64) -> u32 {
    bytes.checked_ilog10().map_or(1, |log| log + 1)
}

/// Year from the leading run of digits of an ISO-8601 timestamp
pub fn parse_year(timestamp: &str) -> Option<u32> {
    let timestamp = timestamp.trim_start();
    let digits = timestamp
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    timestamp[..digits].parse().ok()
}
