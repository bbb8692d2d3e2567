//! Destination registry
//!
//! The registry is the set of destinations the pipeline currently knows
//! about. It is driven from outside (join/leave events from the platform
//! gateway) and read by the poll loop and the on-demand emit path.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flak_core::{DestinationRegistry, MembershipEvent, DestinationId};
//!
//! let registry = DestinationRegistry::new();
//!
//! // Seed from a known list
//! registry.add(DestinationId(1), Some("Guild one".to_string()));
//!
//! // Or follow a stream of join/leave events
//! tokio::spawn({
//!     let registry = registry.clone();
//!     async move { registry.follow(events).await }
//! });
//! ```
//!
//! Clones share the same underlying set, so the registry is handed to each
//! component explicitly instead of living in a global.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::traits::DestinationId;

/// A join/leave signal from the external event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// The pipeline gained access to a destination
    Joined {
        id: DestinationId,
        /// Display name, if the event source knows it
        name: Option<String>,
    },
    /// The pipeline lost access to a destination
    Left { id: DestinationId },
}

/// Concurrent set of known destinations
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// snapshots and exclusive inserts/removals.
#[derive(Debug, Clone, Default)]
pub struct DestinationRegistry {
    inner: Arc<RwLock<HashMap<DestinationId, Option<String>>>>,
}

impl DestinationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a destination
    ///
    /// # Returns
    ///
    /// `true` if the destination was not known before. Re-adding a known
    /// destination only refreshes its name when a new one is given.
    pub fn add(&self, id: DestinationId, name: Option<String>) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match guard.get_mut(&id) {
            Some(existing) => {
                if name.is_some() {
                    *existing = name;
                }
                false
            }
            None => {
                guard.insert(id, name);
                true
            }
        }
    }

    /// Remove a destination
    ///
    /// # Returns
    ///
    /// `true` if the destination was known
    pub fn remove(&self, id: DestinationId) -> bool {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&id).is_some()
    }

    /// Check whether a destination is known
    pub fn contains(&self, id: DestinationId) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(&id)
    }

    /// Display name of a destination, if known
    pub fn name(&self, id: DestinationId) -> Option<String> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(&id).cloned().flatten()
    }

    /// Point-in-time copy of the known destinations, in id order
    ///
    /// Mutations after the snapshot is taken do not affect it.
    pub fn snapshot(&self) -> Vec<DestinationId> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<DestinationId> = guard.keys().copied().collect();
        drop(guard);

        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// Apply a single membership event
    ///
    /// # Returns
    ///
    /// `true` if the event changed the set
    pub fn apply(&self, event: MembershipEvent) -> bool {
        match event {
            MembershipEvent::Joined { id, name } => {
                let label = name.clone().unwrap_or_else(|| "N/A".to_string());
                let added = self.add(id, name);
                if added {
                    info!("Joined destination: {} ({})", label, id);
                    info!("Destination count: {}", self.len());
                }
                added
            }
            MembershipEvent::Left { id } => {
                let label = self.name(id).unwrap_or_else(|| "N/A".to_string());
                let removed = self.remove(id);
                if removed {
                    info!("Left destination: {} ({})", label, id);
                    info!("Destination count: {}", self.len());
                }
                removed
            }
        }
    }

    /// Apply events from a stream until it ends
    pub async fn follow<S>(&self, events: S)
    where
        S: Stream<Item = MembershipEvent> + Send,
    {
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_snapshot() {
        let registry = DestinationRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.add(DestinationId(2), None));
        assert!(registry.add(DestinationId(1), Some("one".to_string())));
        assert!(!registry.add(DestinationId(1), None));

        assert_eq!(registry.snapshot(), vec![DestinationId(1), DestinationId(2)]);
        assert_eq!(registry.name(DestinationId(1)).as_deref(), Some("one"));

        assert!(registry.remove(DestinationId(1)));
        assert!(!registry.remove(DestinationId(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let registry = DestinationRegistry::new();
        let other = registry.clone();

        other.add(DestinationId(7), None);
        assert!(registry.contains(DestinationId(7)));
    }

    #[test]
    fn snapshot_is_detached() {
        let registry = DestinationRegistry::new();
        registry.add(DestinationId(1), None);

        let snapshot = registry.snapshot();
        registry.add(DestinationId(2), None);

        assert_eq!(snapshot, vec![DestinationId(1)]);
    }

    #[tokio::test]
    async fn follow_applies_join_and_leave_events() {
        let registry = DestinationRegistry::new();
        let events = tokio_stream::iter(vec![
            MembershipEvent::Joined { id: DestinationId(1), name: Some("a".to_string()) },
            MembershipEvent::Joined { id: DestinationId(2), name: None },
            MembershipEvent::Left { id: DestinationId(1) },
        ]);

        registry.follow(events).await;

        assert_eq!(registry.snapshot(), vec![DestinationId(2)]);
    }

    #[tokio::test]
    async fn concurrent_mutation_is_safe() {
        let registry = DestinationRegistry::new();

        let handles: Vec<_> = (0..32u64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.add(DestinationId(i), None);
                    if i % 2 == 0 {
                        registry.remove(DestinationId(i));
                    }
                    registry.snapshot().len()
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 16);
    }
}
