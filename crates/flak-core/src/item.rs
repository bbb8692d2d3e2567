//! Feed items and reports
//!
//! An [`Item`] is one unit of feed content. Its identity is its source link;
//! everything else is presentation. A [`FeedReport`] is the ordered set of
//! items returned by one fetch, in the source's presentation order
//! (newest-first as far as the source is concerned).
//!
//! Items are validated when a report is assembled: an item rejected by any
//! rule in [`ValidityRules`] never enters the report and so never becomes a
//! broadcast candidate.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Maximum title length, in characters, including the ellipsis marker
pub const MAX_TITLE_LENGTH: usize = 256;

/// Marker appended to titles cut at [`MAX_TITLE_LENGTH`]
pub const ELLIPSIS: &str = "...";

/// A single feed entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: String,
    title: String,
    source_link: String,
    age: Option<String>,
    location: Option<String>,
    image_link: Option<String>,
    video_link: Option<String>,
}

impl Item {
    /// Create a new item
    ///
    /// The title is truncated to [`MAX_TITLE_LENGTH`] characters: a longer
    /// title keeps its first `MAX_TITLE_LENGTH - 3` characters followed by
    /// [`ELLIPSIS`].
    ///
    /// # Parameters
    ///
    /// - `id`: Source-assigned item id (display only, not used for identity)
    /// - `title`: Headline
    /// - `source_link`: Stable external URL; the sole basis of identity
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_link: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: truncate_title(title.into()),
            source_link: source_link.into(),
            age: None,
            location: None,
            image_link: None,
            video_link: None,
        }
    }

    /// Set the free-text age descriptor (e.g. "3 hours ago")
    pub fn with_age(mut self, age: impl Into<String>) -> Self {
        self.age = Some(age.into());
        self
    }

    /// Set the reported location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the image link
    pub fn with_image_link(mut self, link: impl Into<String>) -> Self {
        self.image_link = Some(link.into());
        self
    }

    /// Set the video link
    pub fn with_video_link(mut self, link: impl Into<String>) -> Self {
        self.video_link = Some(link.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Title, already truncated
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_link(&self) -> &str {
        &self.source_link
    }

    pub fn age(&self) -> Option<&str> {
        self.age.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn image_link(&self) -> Option<&str> {
        self.image_link.as_deref()
    }

    pub fn video_link(&self) -> Option<&str> {
        self.video_link.as_deref()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.source_link)
    }
}

fn truncate_title(title: String) -> String {
    if title.chars().count() <= MAX_TITLE_LENGTH {
        return title;
    }

    let keep = MAX_TITLE_LENGTH - ELLIPSIS.chars().count();
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// Predicate deciding whether a parsed item may become a candidate
pub type ItemValidator = Arc<dyn Fn(&Item) -> bool + Send + Sync>;

/// Set of validity predicates applied when a report is assembled
///
/// An item is accepted only if every predicate accepts it. An empty rule
/// set accepts everything.
#[derive(Clone, Default)]
pub struct ValidityRules {
    validators: Vec<ItemValidator>,
}

impl ValidityRules {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build rules from a feed configuration's link filters
    pub fn from_config(config: &crate::config::FeedConfig) -> Self {
        config
            .link_filters
            .iter()
            .fold(Self::new(), |rules, filter| rules.link_contains(filter.clone()))
    }

    /// Require `needle` to appear in the item's source link
    pub fn link_contains(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.with(move |item: &Item| item.source_link().contains(&needle))
    }

    /// Add an arbitrary predicate
    pub fn with<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Item) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Check an item against every rule
    pub fn accepts(&self, item: &Item) -> bool {
        self.validators.iter().all(|v| v(item))
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl fmt::Debug for ValidityRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidityRules")
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// One fetch's ordered set of items
#[derive(Debug, Clone)]
pub struct FeedReport {
    items: Vec<Item>,
    fetched_at: DateTime<Utc>,
}

impl FeedReport {
    /// Create a report from already-validated items
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            fetched_at: Utc::now(),
        }
    }

    /// Assemble a report from parsed items, dropping those the rules reject
    ///
    /// Source order is preserved for the items that remain.
    pub fn from_parsed(items: impl IntoIterator<Item = Item>, rules: &ValidityRules) -> Self {
        let mut rejected = 0usize;
        let items: Vec<Item> = items
            .into_iter()
            .filter(|item| {
                let ok = rules.accepts(item);
                if !ok {
                    rejected += 1;
                }
                ok
            })
            .collect();

        if rejected > 0 {
            tracing::trace!("Rejected {} item(s) failing validity rules", rejected);
        }

        Self::new(items)
    }

    /// Items in source order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When this report was fetched
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}
