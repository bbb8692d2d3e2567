//! Fan-out delivery
//!
//! Each destination is reconciled and written to independently. A failure
//! in one destination becomes that destination's [`DeliveryOutcome`] and
//! never reaches the others.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use super::reconcile::{reconcile, Reconciliation};
use crate::card::Card;
use crate::ordering::Candidate;
use crate::traits::{DestinationId, Transport};

/// Result of one delivery attempt to one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The destination has no feed location
    NotOnboarded,

    /// Nothing new to send
    UpToDate,

    /// Cards were written
    Delivered { count: usize },

    /// Resolution or a write failed; retried on the next tick
    Failed { error: String },
}

/// Settings for one broadcast
#[derive(Debug, Clone)]
pub(crate) struct BroadcastPlan {
    pub channel_name: String,
    pub history_page_size: usize,
    pub concurrency: usize,
}

/// Reconcile and deliver to one destination
pub(crate) async fn deliver(
    transport: &dyn Transport,
    destination: DestinationId,
    plan: &BroadcastPlan,
    candidates: &[Candidate],
) -> DeliveryOutcome {
    let reconciliation = match reconcile(
        transport,
        destination,
        &plan.channel_name,
        plan.history_page_size,
        candidates,
    )
    .await
    {
        Ok(reconciliation) => reconciliation,
        Err(e) => {
            warn!(
                "Failed to resolve feed channel in destination {}, skipping: {}",
                destination, e
            );
            return DeliveryOutcome::Failed {
                error: e.to_string(),
            };
        }
    };

    let (location, pending) = match reconciliation {
        Reconciliation::NotOnboarded => return DeliveryOutcome::NotOnboarded,
        Reconciliation::UpToDate => return DeliveryOutcome::UpToDate,
        Reconciliation::Pending {
            location,
            candidates,
        } => (location, candidates),
    };

    let cards: Vec<Card> = pending.iter().map(Card::render).collect();
    let per_message = transport.max_cards_per_message().max(1);

    let mut delivered = 0;
    for chunk in cards.chunks(per_message) {
        if let Err(e) = transport.post_messages(location, chunk).await {
            let detail = e.remote_detail().unwrap_or("no remote detail").to_string();
            error!(
                "Failed to deliver {} card(s) to destination {} ({} already delivered this cycle): {} [{}]",
                chunk.len(),
                destination,
                delivered,
                e,
                detail
            );
            return DeliveryOutcome::Failed {
                error: e.to_string(),
            };
        }
        delivered += chunk.len();
    }

    info!("Delivered {} item(s) to destination {}", delivered, destination);
    DeliveryOutcome::Delivered { count: delivered }
}

/// Deliver to every destination with bounded concurrency
///
/// Returns once every destination has an outcome. Outcomes come back in
/// completion order, not destination order.
///
/// A stalled destination only holds its own slot. With `concurrency`
/// slots all held by stalled destinations, healthy ones queue behind them
/// until a transport call returns or times out.
pub(crate) async fn broadcast(
    transport: Arc<dyn Transport>,
    destinations: Vec<DestinationId>,
    plan: &BroadcastPlan,
    candidates: Arc<[Candidate]>,
) -> Vec<(DestinationId, DeliveryOutcome)> {
    let concurrency = plan.concurrency.max(1);

    stream::iter(destinations)
        .map(|destination| {
            let transport = transport.clone();
            let candidates = candidates.clone();
            async move {
                let outcome = deliver(transport.as_ref(), destination, plan, &candidates).await;
                (destination, outcome)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await
}
