//! Core Flak emitter
//!
//! The FlakEmitter is responsible for:
//! - Polling the feed source on a fixed interval
//! - Keeping the last successfully fetched report
//! - Reconciling each known destination against its own message history
//! - Delivering the undelivered items to every destination in isolation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ FeedSource  │─── FeedReport ──────┐
//! └─────────────┘                     │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │ FlakEmitter  │
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ Registry    │           │ Transport    │           │   Events    │
//! │ (who)       │           │ (history,    │           │  (notify)   │
//! └─────────────┘           │  post)       │           └─────────────┘
//!                           └──────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Skip the tick if no destination is known
//! 2. Fetch the latest report, keep it as the last report
//! 3. Select and order candidates (first N items, freshest first)
//! 4. For every destination: resolve, read history, diff by fingerprint
//! 5. Post what is missing, one destination's failure never touching another
//! 6. Sleep the poll interval (the same after a failed fetch)

pub mod broadcast;
pub mod reconcile;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::EmitterConfig;
use crate::error::Result;
use crate::item::FeedReport;
use crate::ordering::select_candidates;
use crate::registry::DestinationRegistry;
use crate::state::LastReport;
use crate::traits::{DestinationId, FeedSource, Transport};

use self::broadcast::{broadcast, deliver, BroadcastPlan};
pub use self::broadcast::DeliveryOutcome;
pub use self::reconcile::Reconciliation;

/// Events emitted by the FlakEmitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitterEvent {
    /// Poll loop started
    Started,

    /// Tick skipped because no destination is known
    Idle,

    /// A report was fetched
    ReportFetched { items: usize },

    /// Fetching failed; the loop will try again after the poll interval
    FetchFailed { error: String },

    /// A fetch succeeded after one or more failures
    Recovered,

    /// Items were written to a destination
    Delivered {
        destination: DestinationId,
        count: usize,
    },

    /// A destination could not be delivered to this cycle
    DeliveryFailed {
        destination: DestinationId,
        error: String,
    },

    /// A broadcast cycle finished across all destinations
    CycleCompleted {
        destinations: usize,
        delivered: usize,
        failed: usize,
    },

    /// Poll loop stopped
    Stopped,
}

/// What one tick of the poll loop did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No destinations, nothing fetched
    Idle,

    /// The fetch failed
    FetchFailed,

    /// A report was fetched; one outcome per destination that was broadcast to
    Fetched {
        outcomes: Vec<(DestinationId, DeliveryOutcome)>,
    },
}

/// Handle on a running poll loop
struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared emitter state, owned by the handle and the poll task
struct Inner {
    feed: Arc<dyn FeedSource>,
    transport: Arc<dyn Transport>,
    registry: DestinationRegistry,
    last_report: LastReport,
    config: EmitterConfig,
    plan: BroadcastPlan,
    faulted: AtomicBool,
    event_tx: mpsc::Sender<EmitterEvent>,
}

/// Core Flak emitter
///
/// ## Lifecycle
///
/// 1. Create with [`FlakEmitter::new()`]
/// 2. Start the poll loop with [`FlakEmitter::start()`]
/// 3. Replay to new destinations with [`FlakEmitter::emit_to()`]
/// 4. Stop with [`FlakEmitter::stop()`] (dropping the emitter also cancels the loop)
///
/// ## Load Resistance
///
/// - **Bounded event channel**: events are dropped (logged) when it is full
/// - **Bounded fan-out**: at most `broadcast_concurrency` destinations are
///   delivered to at once, and a cycle finishes before the next tick is armed
pub struct FlakEmitter {
    inner: Arc<Inner>,
    running: Mutex<Option<Running>>,
}

impl FlakEmitter {
    /// Create a new emitter
    ///
    /// # Parameters
    ///
    /// - `feed`: Feed source implementation
    /// - `transport`: Transport implementation
    /// - `registry`: Destination registry, shared with whatever drives it
    /// - `config`: Emitter configuration
    ///
    /// # Returns
    ///
    /// A tuple of (emitter, event_receiver) where event_receiver yields emitter events
    pub fn new(
        feed: Arc<dyn FeedSource>,
        transport: Arc<dyn Transport>,
        registry: DestinationRegistry,
        config: EmitterConfig,
    ) -> Result<(Self, mpsc::Receiver<EmitterEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let plan = BroadcastPlan {
            channel_name: config.feed_channel_name.clone(),
            history_page_size: config.history_page_size,
            concurrency: config.broadcast_concurrency,
        };

        let inner = Inner {
            feed,
            transport,
            registry,
            last_report: LastReport::new(),
            config,
            plan,
            faulted: AtomicBool::new(false),
            event_tx: tx,
        };

        let emitter = Self {
            inner: Arc::new(inner),
            running: Mutex::new(None),
        };

        Ok((emitter, rx))
    }

    /// Start the poll loop
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// `true` if a loop was started, `false` if one was already running
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = running.as_ref()
            && !current.token.is_cancelled()
            && !current.handle.is_finished()
        {
            debug!("Flak emitter already running, ignoring start");
            return false;
        }

        info!(
            "Starting Flak emitter (feed: {}, transport: {})",
            self.inner.feed.source_name(),
            self.inner.transport.transport_name()
        );

        let token = CancellationToken::new();
        let inner = self.inner.clone();
        let handle = tokio::spawn(inner.run(token.clone()));

        *running = Some(Running { token, handle });
        true
    }

    /// Stop the poll loop and wait for it to exit
    ///
    /// A fetch or broadcast already in flight runs to completion first.
    ///
    /// # Returns
    ///
    /// `true` if a loop was running
    pub async fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(Running { token, handle }) = running else {
            return false;
        };

        token.cancel();
        if let Err(e) = handle.await {
            error!("Flak emitter task ended abnormally: {}", e);
        }
        true
    }

    /// Check whether the poll loop is running
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled() && !r.handle.is_finished())
    }

    /// Most recently fetched report, if any
    pub fn last_report(&self) -> Option<Arc<FeedReport>> {
        self.inner.last_report.get()
    }

    /// The registry this emitter broadcasts to
    pub fn registry(&self) -> &DestinationRegistry {
        &self.inner.registry
    }

    /// Replay the last report to a single destination
    ///
    /// Used when a destination finishes onboarding, so it does not have to
    /// wait for the next tick. No fetch is made.
    ///
    /// # Returns
    ///
    /// - `Some(DeliveryOutcome)`: The destination was reconciled
    /// - `None`: The emitter is not running, or no non-empty report exists yet
    pub async fn emit_to(&self, destination: DestinationId) -> Option<DeliveryOutcome> {
        if !self.is_running() {
            debug!("Flak emitter not running, ignoring emit to {}", destination);
            return None;
        }

        let report = self.inner.last_report.get()?;
        if report.is_empty() {
            debug!("Last report is empty, nothing to emit to {}", destination);
            return None;
        }

        let candidates = select_candidates(&report, self.inner.config.max_broadcast_posts);
        if candidates.is_empty() {
            return Some(DeliveryOutcome::UpToDate);
        }

        let outcome = deliver(
            self.inner.transport.as_ref(),
            destination,
            &self.inner.plan,
            &candidates,
        )
        .await;

        self.inner.record_outcome(destination, &outcome);
        Some(outcome)
    }

    /// Run a single tick of the poll loop, without sleeping
    ///
    /// # Visibility
    ///
    /// This is `pub` for contract tests and embedders that drive their own
    /// schedule. It shares the recovery state with the background loop.
    pub async fn poll_once(&self) -> TickOutcome {
        self.inner.tick().await
    }
}

impl Drop for FlakEmitter {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(running) = running.take() {
            running.token.cancel();
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, token: CancellationToken) {
        self.emit_event(EmitterEvent::Started);

        let interval = self.config.poll_interval();

        while !token.is_cancelled() {
            self.tick().await;

            if let Ok(delay) = chrono::Duration::from_std(interval)
                && let Some(next) = Utc::now().checked_add_signed(delay)
            {
                info!("Next update at {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Flak emitter has been cancelled");
        self.emit_event(EmitterEvent::Stopped);
    }

    async fn tick(&self) -> TickOutcome {
        if self.registry.is_empty() {
            info!("No destinations to receive broadcasts");
            self.emit_event(EmitterEvent::Idle);
            return TickOutcome::Idle;
        }

        info!("Downloading latest content from {}", self.feed.source_name());

        let report = match self.feed.fetch_latest().await {
            Ok(report) => report,
            Err(e) => {
                self.faulted.store(true, Ordering::SeqCst);
                error!(
                    "Failed to fetch latest content: {}. Retrying in {:?}",
                    e,
                    self.config.poll_interval()
                );
                self.emit_event(EmitterEvent::FetchFailed {
                    error: e.to_string(),
                });
                return TickOutcome::FetchFailed;
            }
        };

        if self.faulted.swap(false, Ordering::SeqCst) {
            info!("Connection re-established");
            self.emit_event(EmitterEvent::Recovered);
        }

        let report = Arc::new(report);
        self.last_report.replace(report.clone());
        debug!(
            "Fetched {} item(s) at {}",
            report.len(),
            report.fetched_at().format("%H:%M:%S")
        );
        self.emit_event(EmitterEvent::ReportFetched {
            items: report.len(),
        });

        if report.is_empty() {
            return TickOutcome::Fetched {
                outcomes: Vec::new(),
            };
        }

        let outcomes = self.broadcast_cycle(&report).await;
        TickOutcome::Fetched { outcomes }
    }

    async fn broadcast_cycle(&self, report: &FeedReport) -> Vec<(DestinationId, DeliveryOutcome)> {
        let candidates = select_candidates(report, self.config.max_broadcast_posts);
        if candidates.is_empty() {
            debug!("No dated items among the first {}", self.config.max_broadcast_posts);
            return Vec::new();
        }

        let destinations = self.registry.snapshot();
        let total = destinations.len();

        let outcomes = broadcast(self.transport.clone(), destinations, &self.plan, candidates).await;

        let mut delivered = 0;
        let mut failed = 0;
        for (destination, outcome) in &outcomes {
            match outcome {
                DeliveryOutcome::Delivered { .. } => delivered += 1,
                DeliveryOutcome::Failed { .. } => failed += 1,
                _ => {}
            }
            self.record_outcome(*destination, outcome);
        }

        debug!(
            "Broadcast cycle finished: {} destination(s), {} delivered, {} failed",
            total, delivered, failed
        );
        self.emit_event(EmitterEvent::CycleCompleted {
            destinations: total,
            delivered,
            failed,
        });

        outcomes
    }

    fn record_outcome(&self, destination: DestinationId, outcome: &DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered { count } => self.emit_event(EmitterEvent::Delivered {
                destination,
                count: *count,
            }),
            DeliveryOutcome::Failed { error } => self.emit_event(EmitterEvent::DeliveryFailed {
                destination,
                error: error.clone(),
            }),
            DeliveryOutcome::NotOnboarded | DeliveryOutcome::UpToDate => {}
        }
    }

    fn emit_event(&self, event: EmitterEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
