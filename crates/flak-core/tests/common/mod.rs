//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without talking to a real feed or a real platform.

#![allow(dead_code)]

use flak_core::error::Result;
use flak_core::{
    Card, DestinationId, DestinationRegistry, EmitterConfig, EmitterEvent, Error, FeedReport,
    FeedSource, FlakEmitter, Item, Location, Message, Transport,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Channel name used by every test destination
pub const CHANNEL: &str = "flak-jacket";

/// One scripted answer of the feed
#[derive(Debug, Clone)]
pub enum Step {
    Items(Vec<Item>),
    Fail,
}

/// A FeedSource that answers from a script
///
/// Queued steps are served first; once the queue is empty every fetch gets
/// the fallback step.
pub struct ScriptedFeedSource {
    queue: Arc<Mutex<VecDeque<Step>>>,
    fallback: Arc<Mutex<Step>>,
    fetch_count: Arc<AtomicUsize>,
}

impl ScriptedFeedSource {
    pub fn new(fallback: Step) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Arc::new(Mutex::new(fallback)),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always returns these items
    pub fn serving(items: Vec<Item>) -> Self {
        Self::new(Step::Items(items))
    }

    /// A source whose every fetch fails
    pub fn failing() -> Self {
        Self::new(Step::Fail)
    }

    /// Queue a one-off answer
    pub fn push(&self, step: Step) {
        self.queue.lock().unwrap().push_back(step);
    }

    /// Replace the fallback answer
    pub fn set(&self, step: Step) {
        *self.fallback.lock().unwrap() = step;
    }

    /// Get the number of times fetch_latest() was called
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl FeedSource for ScriptedFeedSource {
    async fn fetch_latest(&self) -> Result<FeedReport> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let step = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().unwrap().clone());

        match step {
            Step::Items(items) => Ok(FeedReport::new(items)),
            Step::Fail => Err(Error::feed("Feed returned status 503")),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// In-memory channel of a test destination
#[derive(Debug, Default)]
struct Channel {
    name: String,
    /// Newest first
    messages: Vec<Message>,
    cards: Vec<Card>,
}

#[derive(Debug, Default)]
struct Failures {
    resolve: HashSet<DestinationId>,
    history: HashSet<DestinationId>,
    post: HashSet<DestinationId>,
}

/// A Transport that keeps channels in memory and counts calls
///
/// Each destination has at most one channel, at `Location(destination id)`.
pub struct RecordingTransport {
    channels: Arc<Mutex<HashMap<DestinationId, Channel>>>,
    failures: Arc<Mutex<Failures>>,
    resolve_count: Arc<AtomicUsize>,
    history_count: Arc<AtomicUsize>,
    post_count: Arc<AtomicUsize>,
    history_limits: Arc<Mutex<Vec<usize>>>,
    stalls: Arc<Mutex<HashMap<DestinationId, Arc<Notify>>>>,
    max_cards: usize,
}

impl RecordingTransport {
    /// A transport with single-card messages
    pub fn new() -> Self {
        Self::with_max_cards(1)
    }

    /// A transport whose messages carry up to `max_cards` cards
    pub fn with_max_cards(max_cards: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(Failures::default())),
            resolve_count: Arc::new(AtomicUsize::new(0)),
            history_count: Arc::new(AtomicUsize::new(0)),
            post_count: Arc::new(AtomicUsize::new(0)),
            history_limits: Arc::new(Mutex::new(Vec::new())),
            stalls: Arc::new(Mutex::new(HashMap::new())),
            max_cards,
        }
    }

    /// Create a new RecordingTransport that shares channels and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            channels: Arc::clone(&other.channels),
            failures: Arc::clone(&other.failures),
            resolve_count: Arc::clone(&other.resolve_count),
            history_count: Arc::clone(&other.history_count),
            post_count: Arc::clone(&other.post_count),
            history_limits: Arc::clone(&other.history_limits),
            stalls: Arc::clone(&other.stalls),
            max_cards: other.max_cards,
        }
    }

    /// Give a destination a feed channel with the default name
    pub fn onboard(&self, destination: DestinationId) {
        self.onboard_with_name(destination, CHANNEL);
    }

    /// Give a destination a channel with an arbitrary name
    pub fn onboard_with_name(&self, destination: DestinationId, name: &str) {
        self.channels.lock().unwrap().insert(
            destination,
            Channel {
                name: name.to_string(),
                ..Default::default()
            },
        );
    }

    /// Put a pre-existing message into a destination's history
    pub fn seed_message(&self, destination: DestinationId, message: Message) {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(destination).or_default();
        channel.messages.insert(0, message);
    }

    pub fn fail_resolve_for(&self, destination: DestinationId) {
        self.failures.lock().unwrap().resolve.insert(destination);
    }

    pub fn fail_history_for(&self, destination: DestinationId) {
        self.failures.lock().unwrap().history.insert(destination);
    }

    pub fn fail_posts_to(&self, destination: DestinationId) {
        self.failures.lock().unwrap().post.insert(destination);
    }

    /// Hold every write to a destination until the returned gate is notified
    pub fn stall_posts_to(&self, destination: DestinationId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.stalls.lock().unwrap().insert(destination, Arc::clone(&gate));
        gate
    }

    /// Clear every injected failure
    pub fn heal(&self) {
        *self.failures.lock().unwrap() = Failures::default();
    }

    /// Cards delivered to a destination, oldest first
    pub fn cards_for(&self, destination: DestinationId) -> Vec<Card> {
        self.channels
            .lock()
            .unwrap()
            .get(&destination)
            .map(|c| c.cards.clone())
            .unwrap_or_default()
    }

    /// Footers delivered to a destination, oldest first
    pub fn footers_for(&self, destination: DestinationId) -> Vec<String> {
        self.cards_for(destination)
            .into_iter()
            .map(|card| card.footer)
            .collect()
    }

    /// Number of messages in a destination's channel (seeded ones included)
    pub fn message_count(&self, destination: DestinationId) -> usize {
        self.channels
            .lock()
            .unwrap()
            .get(&destination)
            .map(|c| c.messages.len())
            .unwrap_or(0)
    }

    pub fn resolve_count(&self) -> usize {
        self.resolve_count.load(Ordering::SeqCst)
    }

    pub fn history_count(&self) -> usize {
        self.history_count.load(Ordering::SeqCst)
    }

    /// Get the number of times post_messages() was called
    pub fn post_count(&self) -> usize {
        self.post_count.load(Ordering::SeqCst)
    }

    /// Limits passed to list_recent_messages(), in call order
    pub fn history_limits(&self) -> Vec<usize> {
        self.history_limits.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn resolve_feed_location(
        &self,
        destination: DestinationId,
        channel_name: &str,
    ) -> Result<Option<Location>> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);

        if self.failures.lock().unwrap().resolve.contains(&destination) {
            return Err(Error::remote("test", 500, "resolve failed"));
        }

        let channels = self.channels.lock().unwrap();
        Ok(channels
            .get(&destination)
            .filter(|c| c.name == channel_name)
            .map(|_| Location(destination.0)))
    }

    async fn list_recent_messages(&self, location: Location, limit: usize) -> Result<Vec<Message>> {
        self.history_count.fetch_add(1, Ordering::SeqCst);
        self.history_limits.lock().unwrap().push(limit);

        let destination = DestinationId(location.0);
        if self.failures.lock().unwrap().history.contains(&destination) {
            return Err(Error::remote("test", 502, "history unavailable"));
        }

        let channels = self.channels.lock().unwrap();
        Ok(channels
            .get(&destination)
            .map(|c| c.messages.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn post_messages(&self, location: Location, cards: &[Card]) -> Result<()> {
        self.post_count.fetch_add(1, Ordering::SeqCst);
        assert!(
            cards.len() <= self.max_cards,
            "posted {} cards, limit is {}",
            cards.len(),
            self.max_cards
        );

        let destination = DestinationId(location.0);
        let gate = self.stalls.lock().unwrap().get(&destination).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failures.lock().unwrap().post.contains(&destination) {
            return Err(Error::remote("test", 403, "Missing Permissions"));
        }

        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(destination).or_default();

        let mut message = Message::new(format!("msg-{}", channel.messages.len()));
        for card in cards {
            message = message.with_footer(card.footer.clone());
            channel.cards.push(card.clone());
        }
        channel.messages.insert(0, message);
        Ok(())
    }

    fn max_cards_per_message(&self) -> usize {
        self.max_cards
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}

/// A dated test item whose link contains `/en/`
pub fn item(id: &str, age: &str) -> Item {
    Item::new(id, format!("Item {}", id), format!("https://feed.example/en/{}", id)).with_age(age)
}

/// Emitter configuration with a short poll interval
pub fn fast_config() -> EmitterConfig {
    EmitterConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_feed_channel_name(CHANNEL)
}

/// Registry pre-filled with destinations
pub fn registry_with(ids: &[u64]) -> DestinationRegistry {
    let registry = DestinationRegistry::new();
    for id in ids {
        registry.add(DestinationId(*id), None);
    }
    registry
}

/// Build an emitter over shared doubles
pub fn emitter(
    feed: &Arc<ScriptedFeedSource>,
    transport: &Arc<RecordingTransport>,
    registry: DestinationRegistry,
    config: EmitterConfig,
) -> (FlakEmitter, mpsc::Receiver<EmitterEvent>) {
    let feed: Arc<dyn FeedSource> = feed.clone();
    let transport: Arc<dyn Transport> = transport.clone();

    FlakEmitter::new(feed, transport, registry, config).expect("emitter construction succeeds")
}

/// Drain every event currently queued
pub fn drain(rx: &mut mpsc::Receiver<EmitterEvent>) -> Vec<EmitterEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
