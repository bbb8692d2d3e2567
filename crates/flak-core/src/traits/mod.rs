//! Core traits for the Flak pipeline
//!
//! This module defines the abstract interfaces that collaborators implement.
//!
//! - [`FeedSource`]: Fetch the latest feed report
//! - [`Transport`]: Read destination history and post rendered cards

pub mod feed_source;
pub mod transport;

pub use feed_source::FeedSource;
pub use transport::{DestinationId, Location, Message, Transport};
