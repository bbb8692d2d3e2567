//! Architectural Contract Test: Delivery State & Idempotency
//!
//! This test verifies that delivery state is derived from the destination's
//! own history and that repeated cycles do not duplicate messages.
//!
//! Constraints verified:
//! - The same report twice produces one message per fingerprint
//! - Entries repeating a source link within one report are sent once
//! - A fresh emitter (simulated restart) sends nothing already present
//! - Fingerprints are derived from the source link only
//! - Only one page of history is read
//!
//! If this test fails, the dedup scheme is broken.

mod common;

use common::*;
use flak_core::{DeliveryOutcome, DestinationId, Fingerprint, Item, Message, TickOutcome};
use std::sync::Arc;

#[tokio::test]
async fn same_report_twice_delivers_each_item_once() {
    let feed = Arc::new(ScriptedFeedSource::serving(vec![
        item("a", "5 minutes ago"),
        item("b", "1 hour ago"),
    ]));
    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));

    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());

    emitter.poll_once().await;
    emitter.poll_once().await;

    let footers = transport.footers_for(DestinationId(1));
    assert_eq!(footers.len(), 2, "expected one message per item, got {:?}", footers);
    assert_eq!(transport.post_count(), 2);
}

#[tokio::test]
async fn repeated_link_in_one_report_is_sent_once() {
    let feed = Arc::new(ScriptedFeedSource::serving(vec![
        Item::new("a", "Item a", "https://feed.example/en/same").with_age("5 minutes ago"),
        Item::new("b", "Item b", "https://feed.example/en/same").with_age("6 minutes ago"),
    ]));
    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));

    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());

    let outcome = emitter.poll_once().await;

    assert_eq!(
        outcome,
        TickOutcome::Fetched {
            outcomes: vec![(DestinationId(1), DeliveryOutcome::Delivered { count: 1 })]
        }
    );
    let cards = transport.cards_for(DestinationId(1));
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].author, "a");
}

#[tokio::test]
async fn second_cycle_reports_up_to_date() {
    let feed = Arc::new(ScriptedFeedSource::serving(vec![item("a", "5 minutes ago")]));
    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));

    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());

    let first = emitter.poll_once().await;
    let second = emitter.poll_once().await;

    assert_eq!(
        first,
        TickOutcome::Fetched {
            outcomes: vec![(DestinationId(1), DeliveryOutcome::Delivered { count: 1 })]
        }
    );
    assert_eq!(
        second,
        TickOutcome::Fetched {
            outcomes: vec![(DestinationId(1), DeliveryOutcome::UpToDate)]
        }
    );
}

#[tokio::test]
async fn restart_simulation_no_duplicate_messages() {
    let items = vec![item("a", "5 minutes ago"), item("b", "2 hours ago")];
    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));

    // First "run"
    {
        let feed = Arc::new(ScriptedFeedSource::serving(items.clone()));
        let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());
        emitter.poll_once().await;
    }
    assert_eq!(transport.post_count(), 2);

    // Second "run": new emitter, nothing carried over except the channel itself
    let shared = Arc::new(RecordingTransport::sharing_counters_with(&transport));
    let feed = Arc::new(ScriptedFeedSource::serving(items));
    let (emitter, _rx) = emitter(&feed, &shared, registry_with(&[1]), fast_config());
    emitter.poll_once().await;

    assert_eq!(
        transport.post_count(),
        2,
        "restart must not re-send items already in the channel"
    );
}

#[tokio::test]
async fn only_missing_items_are_sent() {
    let a = item("a", "5 minutes ago");
    let b = item("b", "10 minutes ago");

    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));
    transport.seed_message(
        DestinationId(1),
        Message::new("old").with_footer(Fingerprint::of(&a).as_str()),
    );

    let feed = Arc::new(ScriptedFeedSource::serving(vec![a, b.clone()]));
    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());
    emitter.poll_once().await;

    assert_eq!(
        transport.footers_for(DestinationId(1)),
        vec![Fingerprint::of(&b).to_string()]
    );
}

#[tokio::test]
async fn edited_title_keeps_identity() {
    let original = item("a", "5 minutes ago");
    let retitled = flak_core::Item::new("a", "Completely new title", original.source_link())
        .with_age("6 minutes ago");

    let feed = Arc::new(ScriptedFeedSource::serving(vec![original]));
    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));

    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());
    emitter.poll_once().await;

    feed.set(Step::Items(vec![retitled]));
    emitter.poll_once().await;

    assert_eq!(transport.post_count(), 1);
}

#[tokio::test]
async fn history_is_read_one_page_at_configured_size() {
    let feed = Arc::new(ScriptedFeedSource::serving(vec![item("a", "5 minutes ago")]));
    let transport = Arc::new(RecordingTransport::new());
    transport.onboard(DestinationId(1));

    let mut config = fast_config();
    config.history_page_size = 25;

    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), config);
    emitter.poll_once().await;

    assert_eq!(transport.history_limits(), vec![25]);
}

#[tokio::test]
async fn multi_card_transport_batches_into_chunks() {
    let items: Vec<_> = (0..5)
        .map(|n| item(&n.to_string(), &format!("{} minutes ago", n + 1)))
        .collect();
    let feed = Arc::new(ScriptedFeedSource::serving(items));
    let transport = Arc::new(RecordingTransport::with_max_cards(2));
    transport.onboard(DestinationId(1));

    let (emitter, _rx) = emitter(&feed, &transport, registry_with(&[1]), fast_config());
    emitter.poll_once().await;

    // 5 cards, 2 per message
    assert_eq!(transport.post_count(), 3);
    assert_eq!(transport.message_count(DestinationId(1)), 3);
    assert_eq!(transport.footers_for(DestinationId(1)).len(), 5);

    // Footers of multi-card messages are all read back
    emitter.poll_once().await;
    assert_eq!(transport.post_count(), 3);
}
