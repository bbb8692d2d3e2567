//! Configuration types for the Flak pipeline
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main Flak configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakConfig {
    /// Feed source configuration
    pub feed: FeedConfig,

    /// Destination transport configuration
    pub transport: TransportConfig,

    /// Optional emitter settings
    #[serde(default)]
    pub emitter: EmitterConfig,
}

impl FlakConfig {
    /// Create a new configuration for the given feed and transport
    pub fn new(feed: FeedConfig, transport: TransportConfig) -> Self {
        Self {
            feed,
            transport,
            emitter: EmitterConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.feed.validate()?;
        self.transport.validate()?;
        self.emitter.validate()?;

        Ok(())
    }
}

/// Feed source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// URL the feed report is fetched from
    pub url: String,

    /// Substrings every item's source link must contain to become a candidate
    ///
    /// An empty list accepts every item. The usual entry is a locale
    /// segment such as `/en/`.
    #[serde(default)]
    pub link_filters: Vec<String>,
}

impl FeedConfig {
    /// Create a feed configuration with no link filters
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            link_filters: Vec::new(),
        }
    }

    /// Require the given substring in every item's source link
    pub fn with_link_filter(mut self, filter: impl Into<String>) -> Self {
        self.link_filters.push(filter.into());
        self
    }

    /// Validate the feed configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Feed URL cannot be empty"));
        }
        if self.link_filters.iter().any(|f| f.is_empty()) {
            return Err(crate::Error::config("Feed link filters cannot be empty strings"));
        }
        Ok(())
    }
}

/// Destination transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Discord REST API
    Discord {
        /// Bot token
        token: String,
        /// API base URL override (defaults to the public v10 endpoint)
        #[serde(default)]
        api_base: Option<String>,
    },
}

impl TransportConfig {
    /// Validate the transport configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            TransportConfig::Discord { token, api_base } => {
                if token.is_empty() {
                    return Err(crate::Error::config("Discord bot token cannot be empty"));
                }
                if let Some(base) = api_base
                    && !base.starts_with("https://")
                    && !base.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "Discord API base must be an HTTP(S) URL, got: {}",
                        base
                    )));
                }
                Ok(())
            }
        }
    }

    /// Get the transport type name
    pub fn type_name(&self) -> &str {
        match self {
            TransportConfig::Discord { .. } => "discord",
        }
    }
}

/// Emitter (poll loop and broadcast) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Fixed delay between poll ticks, in milliseconds
    ///
    /// The same delay is used after a failed fetch; there is no backoff growth.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of leading report items considered per cycle
    #[serde(default = "default_max_broadcast_posts")]
    pub max_broadcast_posts: usize,

    /// Display name of the channel that receives broadcasts in each destination
    #[serde(default = "default_feed_channel_name")]
    pub feed_channel_name: String,

    /// Number of recent messages read per destination when reconciling
    ///
    /// This is the whole lookback window: only one page is ever read.
    #[serde(default = "default_history_page_size")]
    pub history_page_size: usize,

    /// Maximum number of destinations delivered to concurrently
    #[serde(default = "default_broadcast_concurrency")]
    pub broadcast_concurrency: usize,

    /// Capacity of the emitter event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EmitterConfig {
    /// Poll interval as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the per-cycle item cap
    pub fn with_max_broadcast_posts(mut self, max: usize) -> Self {
        self.max_broadcast_posts = max;
        self
    }

    /// Set the feed channel display name
    pub fn with_feed_channel_name(mut self, name: impl Into<String>) -> Self {
        self.feed_channel_name = name.into();
        self
    }

    /// Validate the emitter configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.max_broadcast_posts == 0 {
            return Err(crate::Error::config("Max broadcast posts must be > 0"));
        }
        if self.feed_channel_name.trim().is_empty() {
            return Err(crate::Error::config("Feed channel name cannot be empty"));
        }
        if !(1..=100).contains(&self.history_page_size) {
            return Err(crate::Error::config(format!(
                "History page size must be between 1 and 100, got {}",
                self.history_page_size
            )));
        }
        if self.broadcast_concurrency == 0 {
            return Err(crate::Error::config("Broadcast concurrency must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_broadcast_posts: default_max_broadcast_posts(),
            feed_channel_name: default_feed_channel_name(),
            history_page_size: default_history_page_size(),
            broadcast_concurrency: default_broadcast_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5 * 60 * 1000
}

fn default_max_broadcast_posts() -> usize {
    10
}

fn default_feed_channel_name() -> String {
    "flak-jacket".to_string()
}

fn default_history_page_size() -> usize {
    50
}

fn default_broadcast_concurrency() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    1000
}
