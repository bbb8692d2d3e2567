//! Rendered message cards
//!
//! A [`Card`] is the transport-neutral form of one delivered item. The
//! footer always carries the item's fingerprint: that footer is the only
//! delivery record the pipeline has, so it must never be omitted.

use crate::ordering::Candidate;

/// One rendered item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Author/marker field, carrying the item id
    pub author: String,
    /// Item title (already truncated)
    pub title: String,
    pub description: String,
    /// Thumbnail URL, when the item has an image
    pub thumbnail: Option<String>,
    /// Fingerprint of the item
    pub footer: String,
}

impl Card {
    /// Render a candidate
    pub fn render(candidate: &Candidate) -> Self {
        let item = &candidate.item;

        let mut description = format!(
            ":alarm_clock: Reported **{}** for the following location: **{}**\n\n\
             :information_source: Find out more at: {}\n",
            item.age().unwrap_or("recently"),
            item.location().unwrap_or("unknown"),
            item.source_link()
        );
        if let Some(video) = item.video_link() {
            description.push_str(&format!(":camera_with_flash: Video: {}\n", video));
        }

        Self {
            author: item.id().to_string(),
            title: item.title().to_string(),
            description,
            thumbnail: item.image_link().map(str::to_string),
            footer: candidate.fingerprint.to_string(),
        }
    }
}
