// # flak-core
//
// Core library for the Flak feed mirroring pipeline.
//
// ## Architecture Overview
//
// This library mirrors items from an external feed into many independent
// destination channels, delivering each item to each destination at most
// once without any local database:
// - **FeedSource**: Trait for fetching the latest feed report
// - **Transport**: Trait for reading destination history and posting cards
// - **Fingerprint**: Stable content address of an item, written into footers
// - **DestinationRegistry**: Injectable set of known destinations
// - **FlakEmitter**: Poll loop, reconciliation and isolated fan-out
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Fetching and transport live behind traits
// 2. **No Local State**: Delivery history is read back from the destinations
// 3. **Failure Isolation**: One destination never blocks or fails another
// 4. **Library-First**: The daemon is a thin wrapper over this crate

pub mod card;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod item;
pub mod ordering;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use card::Card;
pub use config::{EmitterConfig, FeedConfig, FlakConfig, TransportConfig};
pub use engine::{DeliveryOutcome, EmitterEvent, FlakEmitter, Reconciliation, TickOutcome};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use item::{FeedReport, Item, ItemValidator, ValidityRules};
pub use ordering::{select_candidates, Candidate, RecencyKey};
pub use registry::{DestinationRegistry, MembershipEvent};
pub use state::LastReport;
pub use traits::{DestinationId, FeedSource, Location, Message, Transport};
