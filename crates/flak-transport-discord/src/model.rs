//! Discord REST wire types
//!
//! Only the fields the transport reads or writes are modelled; everything
//! else in Discord's payloads is ignored on deserialization.

use flak_core::Card;
use serde::{Deserialize, Serialize};

/// Guild text channel
pub const CHANNEL_TYPE_GUILD_TEXT: u8 = 0;

/// Guild announcement channel
pub const CHANNEL_TYPE_GUILD_ANNOUNCEMENT: u8 = 5;

/// Channel object, as returned by `GET /guilds/{guild.id}/channels`
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

impl Channel {
    /// Whether messages can be posted to this channel by name lookup
    pub fn is_text(&self) -> bool {
        matches!(self.kind, CHANNEL_TYPE_GUILD_TEXT | CHANNEL_TYPE_GUILD_ANNOUNCEMENT)
    }
}

/// Message object, as returned by `GET /channels/{channel.id}/messages`
#[derive(Debug, Clone, Deserialize)]
pub struct MessageObject {
    pub id: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// Body of `POST /channels/{channel.id}/messages`
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessage {
    pub embeds: Vec<Embed>,
}

/// Embed object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl From<&Card> for Embed {
    fn from(card: &Card) -> Self {
        Self {
            title: Some(card.title.clone()),
            description: Some(card.description.clone()),
            author: Some(EmbedAuthor {
                name: card.author.clone(),
            }),
            thumbnail: card.thumbnail.clone().map(|url| EmbedImage { url }),
            footer: Some(EmbedFooter {
                text: card.footer.clone(),
            }),
        }
    }
}

/// Error body Discord returns with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u32,
    /// Seconds to wait, on 429 responses
    #[serde(default)]
    pub retry_after: Option<f64>,
}
