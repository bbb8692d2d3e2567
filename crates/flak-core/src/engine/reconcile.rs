//! Per-destination reconciliation
//!
//! Works out which candidates a destination has not seen yet by reading the
//! fingerprints back out of the footers of its most recent messages. Only
//! one page of history is read, so an item that scrolled out of that page
//! can be delivered again.

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::fingerprint::Fingerprint;
use crate::ordering::Candidate;
use crate::traits::{DestinationId, Location, Message, Transport};

/// What a destination needs this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No feed location with the configured name exists
    NotOnboarded,

    /// Every candidate is already present
    UpToDate,

    /// Some candidates still have to be written
    Pending {
        location: Location,
        /// Undelivered candidates, in candidate order
        candidates: Vec<Candidate>,
    },
}

/// Fingerprints present in a page of history
///
/// Footers that are not well-formed fingerprints are ignored.
pub fn delivered_fingerprints(history: &[Message]) -> HashSet<Fingerprint> {
    history
        .iter()
        .flat_map(|message| message.footers.iter())
        .filter_map(|footer| Fingerprint::from_footer(footer))
        .collect()
}

/// Candidates not present in `history`, keeping candidate order
pub fn undelivered(candidates: &[Candidate], history: &[Message]) -> Vec<Candidate> {
    let present = delivered_fingerprints(history);

    candidates
        .iter()
        .filter(|candidate| !present.contains(&candidate.fingerprint))
        .cloned()
        .collect()
}

/// Reconcile one destination against its delivery history
///
/// # Parameters
///
/// - `transport`: Transport used to resolve the location and read history
/// - `destination`: The destination to reconcile
/// - `channel_name`: Display name of the feed location
/// - `history_page_size`: Number of recent messages to read
/// - `candidates`: This cycle's ordered candidates
///
/// # Returns
///
/// - `Ok(Reconciliation)`: What the destination needs
/// - `Err(Error)`: The location could not be resolved
///
/// A failed history read is not an error: it is logged and the history is
/// treated as empty, which may re-send items the destination already has.
pub async fn reconcile(
    transport: &dyn Transport,
    destination: DestinationId,
    channel_name: &str,
    history_page_size: usize,
    candidates: &[Candidate],
) -> crate::Result<Reconciliation> {
    let Some(location) = transport
        .resolve_feed_location(destination, channel_name)
        .await?
    else {
        trace!("Destination {} has no '{}' channel, skipping", destination, channel_name);
        return Ok(Reconciliation::NotOnboarded);
    };

    let history = match transport.list_recent_messages(location, history_page_size).await {
        Ok(history) => history,
        Err(e) => {
            warn!(
                "Failed to read history of {} in destination {}, treating it as empty: {}",
                location, destination, e
            );
            Vec::new()
        }
    };

    let pending = undelivered(candidates, &history);
    if pending.is_empty() {
        trace!("Destination {} is up to date", destination);
        return Ok(Reconciliation::UpToDate);
    }

    Ok(Reconciliation::Pending {
        location,
        candidates: pending,
    })
}
