// # Feed Source Trait
//
// Defines the interface for fetching the latest feed report.
//
// ## Implementations
//
// - HTTP: `flak-feed-http` crate
//
// ## Usage
//
// ```rust,ignore
// use flak_core::FeedSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* FeedSource implementation */;
//
//     let report = source.fetch_latest().await?;
//     for item in report.items() {
//         println!("{}", item);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::item::FeedReport;

/// Trait for feed source implementations
///
/// A feed source performs exactly one fetch per call and turns the response
/// into a validated [`FeedReport`]. It must not retry, sleep, or cache: the
/// poll loop in [`FlakEmitter`](crate::FlakEmitter) owns scheduling and
/// treats every error as transient.
///
/// # Errors
///
/// Implementations return an error for:
/// - network failure
/// - a non-success status
/// - an empty or blank body
///
/// A well-formed body that yields zero valid items is **not** an error; it
/// is an empty report.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the latest report
    async fn fetch_latest(&self) -> Result<FeedReport, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
