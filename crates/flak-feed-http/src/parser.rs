// # Report Parsers
//
// Turns a fetched body into items. Parsers are pure: no I/O, no validity
// rules (those are applied by the source after parsing).

use flak_core::{Error, Item, Result};
use serde::Deserialize;
use tracing::trace;

/// Parses a fetched body into items, in source order
pub trait ReportParser: Send + Sync {
    /// Parse a non-blank body
    ///
    /// Entries that cannot become an item (missing title or link) are
    /// skipped. A body that cannot be read at all is an error.
    fn parse(&self, body: &str) -> Result<Vec<Item>>;

    /// Get the parser name (for logging/debugging)
    fn parser_name(&self) -> &'static str;
}

/// One entry of a JSON feed
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Stable external link of the entry
    #[serde(default, alias = "link", alias = "source")]
    pub source_link: Option<String>,

    /// Free-text age, e.g. "3 hours ago"
    #[serde(default, alias = "time_ago")]
    pub age: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default, alias = "image")]
    pub image_link: Option<String>,

    #[serde(default, alias = "video")]
    pub video_link: Option<String>,
}

impl RawItem {
    /// Convert into an item, if the entry has the fields identity needs
    pub fn into_item(self) -> Option<Item> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let source_link = self.source_link.filter(|l| !l.trim().is_empty())?;
        let id = self.id.unwrap_or_else(|| source_link.clone());

        let mut item = Item::new(id, title.trim(), source_link.trim());
        if let Some(age) = non_blank(self.age) {
            item = item.with_age(age);
        }
        if let Some(location) = non_blank(self.location) {
            item = item.with_location(location);
        }
        if let Some(image) = non_blank(self.image_link) {
            item = item.with_image_link(image);
        }
        if let Some(video) = non_blank(self.video_link) {
            item = item.with_video_link(video);
        }
        Some(item)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Body shapes accepted by [`JsonReportParser`]
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBody {
    Items(Vec<RawItem>),
    Wrapped { items: Vec<RawItem> },
}

/// Parser for JSON feeds
///
/// Accepts either a bare array of entries or an object with an `items`
/// array:
///
/// ```json
/// [{"id": "p1", "title": "...", "link": "https://.../en/p1", "age": "5 minutes ago"}]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportParser;

impl ReportParser for JsonReportParser {
    fn parse(&self, body: &str) -> Result<Vec<Item>> {
        let raw = match serde_json::from_str::<JsonBody>(body) {
            Ok(JsonBody::Items(items)) | Ok(JsonBody::Wrapped { items }) => items,
            Err(e) => return Err(Error::feed(format!("Malformed feed body: {}", e))),
        };

        let total = raw.len();
        let items: Vec<Item> = raw.into_iter().filter_map(RawItem::into_item).collect();

        if items.len() < total {
            trace!("Skipped {} incomplete feed entries", total - items.len());
        }
        Ok(items)
    }

    fn parser_name(&self) -> &'static str {
        "json"
    }
}
