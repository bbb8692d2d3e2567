// # Transport Trait
//
// Defines the interface for reading and writing destination messages.
//
// ## Implementations
//
// - Discord REST: `flak-transport-discord` crate
//
// ## Usage
//
// ```rust,ignore
// use flak_core::Transport;
//
// let location = transport
//     .resolve_feed_location(destination, "flak-jacket")
//     .await?;
//
// if let Some(location) = location {
//     let history = transport.list_recent_messages(location, 50).await?;
//     transport.post_messages(location, &cards).await?;
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::card::Card;

/// Identifier of a destination community (e.g. a Discord guild)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationId(pub u64);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DestinationId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(Self)
            .map_err(|_| crate::Error::invalid_input(format!("Invalid destination id: {}", s)))
    }
}

impl From<u64> for DestinationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Concrete writable location inside a destination (e.g. a channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location(pub u64);

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message already present at a location
///
/// Only the footers matter to reconciliation; a message may carry several
/// cards, each with its own footer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub id: String,
    pub footers: Vec<String>,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            footers: Vec::new(),
        }
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footers.push(footer.into());
        self
    }
}

/// Trait for destination transport implementations
///
/// # Trust Level: Untrusted
///
/// Transports are isolated, stateless, and single-shot:
/// - one remote call per method invocation (no pagination, no retry)
/// - no background tasks
/// - no decisions about what to send
///
/// Reconciliation and fan-out belong to the core; a transport only moves
/// bytes and reports the remote's answer, including its error detail via
/// [`Error::Remote`](crate::Error::Remote).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve the writable feed location inside a destination
    ///
    /// # Parameters
    ///
    /// - `destination`: The destination to look in
    /// - `channel_name`: Display name the feed location must have
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Location))`: The destination is onboarded
    /// - `Ok(None)`: No location with that name exists (not onboarded)
    /// - `Err(Error)`: The lookup itself failed
    async fn resolve_feed_location(
        &self,
        destination: DestinationId,
        channel_name: &str,
    ) -> Result<Option<Location>, crate::Error>;

    /// List the most recent messages at a location
    ///
    /// Reads a single page of at most `limit` messages, newest first.
    async fn list_recent_messages(
        &self,
        location: Location,
        limit: usize,
    ) -> Result<Vec<Message>, crate::Error>;

    /// Post cards to a location as one message
    ///
    /// Callers never pass more than [`max_cards_per_message`](Self::max_cards_per_message)
    /// cards at once.
    async fn post_messages(&self, location: Location, cards: &[Card]) -> Result<(), crate::Error>;

    /// Maximum number of cards one message may carry
    ///
    /// Returning 1 means the transport has no multi-card messages and every
    /// item is written separately.
    fn max_cards_per_message(&self) -> usize {
        1
    }

    /// Get the transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
