// # Discord Transport
//
// This crate provides a Discord REST transport for the Flak pipeline.
//
// ## Scope
//
// - One HTTP request per trait call, errors propagated as-is
// - Feed channel resolved by name among the guild's text channels
// - One page of channel history per reconciliation
// - Up to 10 cards (embeds) per posted message
//
// No retries, backoff or caching: the emitter retries a failed destination
// on its next tick.
//
// ## Security Requirements
//
// - The bot token NEVER appears in logs or Debug output
// - An empty token is a configuration error
//
// ## API Reference
//
// - Discord API v10: https://discord.com/developers/docs/reference
// - List Guild Channels: GET `/guilds/:guild_id/channels`
// - Get Channel Messages: GET `/channels/:channel_id/messages?limit=N`
// - Create Message: POST `/channels/:channel_id/messages`

pub mod model;

use async_trait::async_trait;
use flak_core::config::TransportConfig;
use flak_core::{Card, DestinationId, Error, Location, Message, Result, Transport};
use std::time::Duration;

use model::{ApiError, Channel, CreateMessage, Embed, MessageObject};

/// Discord API base URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Maximum embeds Discord accepts in one message
pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

/// Maximum messages one history request may return
const MAX_HISTORY_LIMIT: usize = 100;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Service name used in remote errors
const SERVICE: &str = "discord";

/// Discord REST transport
///
/// # Trust Level: Untrusted
///
/// This transport is isolated, stateless, and single-shot. All coordination
/// (reconciliation, fan-out, retry on the next tick) is owned by `FlakEmitter`.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the bot token.
pub struct DiscordTransport {
    /// Bot token
    /// ⚠️ NEVER log this value
    token: String,

    /// API base URL, without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the bot token
impl std::fmt::Debug for DiscordTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordTransport")
            .field("token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl DiscordTransport {
    /// Create a new Discord transport
    ///
    /// # Parameters
    ///
    /// - `token`: Bot token
    /// - `api_base`: Optional API base override (tests, proxies)
    ///
    /// # Errors
    ///
    /// Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, api_base: Option<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("Discord bot token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!(
                "DiscordBot (https://github.com/flakjacket/flak, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = api_base
            .unwrap_or_else(|| DISCORD_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            token,
            api_base,
            client,
        })
    }

    /// Create a transport from configuration
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        config.validate()?;

        match config {
            TransportConfig::Discord { token, api_base } => Self::new(token.clone(), api_base.clone()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("Authorization", format!("Bot {}", self.token))
    }

    /// Send a request, mapping non-success statuses to errors
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed ({}): {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(map_status(status.as_u16(), &body, what))
    }
}

/// Map a non-success Discord response to an error
///
/// The remote's own `message` is kept as the error detail so failed
/// deliveries can be logged with Discord's explanation.
fn map_status(status: u16, body: &str, what: &str) -> Error {
    let api_error: Option<ApiError> = serde_json::from_str(body).ok();
    let message = api_error
        .as_ref()
        .map(|e| e.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 => Error::auth(format!("Invalid bot token ({})", what)),
        404 => Error::not_found(format!("{}: {}", what, message)),
        429 => {
            let retry_after = api_error.and_then(|e| e.retry_after).unwrap_or_default();
            Error::rate_limited(format!("{} (retry after {:.1}s)", message, retry_after))
        }
        _ => Error::remote(SERVICE, status, message),
    }
}

/// Parse a snowflake id
fn snowflake(id: &str) -> Result<u64> {
    id.parse()
        .map_err(|_| Error::transport(format!("Invalid snowflake in response: {}", id)))
}

#[async_trait]
impl Transport for DiscordTransport {
    async fn resolve_feed_location(
        &self,
        destination: DestinationId,
        channel_name: &str,
    ) -> Result<Option<Location>> {
        let request = self.client.get(self.url(&format!("/guilds/{}/channels", destination)));

        let response = match self.send(request, "list guild channels").await {
            Ok(response) => response,
            Err(Error::NotFound(_)) => {
                tracing::debug!("Guild {} not found, treating as not onboarded", destination);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let channels: Vec<Channel> = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("Failed to parse channel list: {}", e)))?;

        // Exact match: a channel that only differs in case is someone else's
        let found = channels
            .iter()
            .find(|c| c.is_text() && c.name.as_deref() == Some(channel_name));

        match found {
            Some(channel) => Ok(Some(Location(snowflake(&channel.id)?))),
            None => Ok(None),
        }
    }

    async fn list_recent_messages(&self, location: Location, limit: usize) -> Result<Vec<Message>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let request = self
            .client
            .get(self.url(&format!("/channels/{}/messages", location)))
            .query(&[("limit", limit)]);

        let response = self.send(request, "get channel messages").await?;

        let messages: Vec<MessageObject> = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("Failed to parse channel messages: {}", e)))?;

        Ok(messages
            .into_iter()
            .map(|m| Message {
                id: m.id,
                footers: m
                    .embeds
                    .into_iter()
                    .filter_map(|embed| embed.footer.map(|f| f.text))
                    .collect(),
            })
            .collect())
    }

    async fn post_messages(&self, location: Location, cards: &[Card]) -> Result<()> {
        if cards.is_empty() {
            return Ok(());
        }
        if cards.len() > MAX_EMBEDS_PER_MESSAGE {
            return Err(Error::invalid_input(format!(
                "At most {} cards per message, got {}",
                MAX_EMBEDS_PER_MESSAGE,
                cards.len()
            )));
        }

        let body = CreateMessage {
            embeds: cards.iter().map(Embed::from).collect(),
        };

        let request = self
            .client
            .post(self.url(&format!("/channels/{}/messages", location)))
            .json(&body);

        self.send(request, "create message").await?;

        tracing::debug!("Posted {} embed(s) to channel {}", cards.len(), location);
        Ok(())
    }

    fn max_cards_per_message(&self) -> usize {
        MAX_EMBEDS_PER_MESSAGE
    }

    fn transport_name(&self) -> &'static str {
        "discord"
    }
}
