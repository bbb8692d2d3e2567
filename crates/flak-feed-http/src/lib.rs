// # HTTP Feed Source
//
// This crate provides an HTTP-based feed source for the Flak pipeline.
//
// ## Architecture
//
// One GET per `fetch_latest()` call. The body is handed to a
// [`ReportParser`] and the parsed items are filtered by the configured
// [`ValidityRules`] before they become a report.
//
// ## Failure Semantics
//
// Network failure, a non-success status, and a blank body are all errors.
// The poll loop in flak-core decides when to try again; this source never
// retries or sleeps.

pub mod parser;

pub use parser::{JsonReportParser, RawItem, ReportParser};

use flak_core::config::FeedConfig;
use flak_core::{Error, FeedReport, FeedSource, Result, ValidityRules};

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Request timeout for feed fetches
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP-based feed source
pub struct HttpFeedSource {
    /// URL of the feed
    url: String,

    /// Body parser
    parser: Arc<dyn ReportParser>,

    /// Rules an item must pass to enter a report
    rules: ValidityRules,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a feed source from configuration, with the JSON parser
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(concat!("flak/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            parser: Arc::new(JsonReportParser),
            rules: ValidityRules::from_config(config),
            client,
        })
    }

    /// Replace the body parser
    pub fn with_parser(mut self, parser: Arc<dyn ReportParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the validity rules
    pub fn with_rules(mut self, rules: ValidityRules) -> Self {
        self.rules = rules;
        self
    }

    /// Fetch the raw body
    async fn fetch_body(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::feed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::feed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() || body.trim().is_empty() {
            return Err(Error::feed(format!(
                "No content received. Error ({}) {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )));
        }

        Ok(body)
    }
}

#[async_trait::async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_latest(&self) -> Result<FeedReport> {
        let body = self.fetch_body().await?;
        let items = self.parser.parse(&body)?;

        debug!(
            "Parsed {} entries from {} with the {} parser",
            items.len(),
            self.url,
            self.parser.parser_name()
        );

        Ok(FeedReport::from_parsed(items, &self.rules))
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
