// # flakd - Flak Daemon
//
// The flakd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the HTTP feed source and the Discord transport
// 4. Seeding the destination registry and running the emitter until
//    SIGINT/SIGTERM
//
// Polling, reconciliation and delivery all live in flak-core.
//
// ## Configuration
//
// ### Feed
// - `FLAK_FEED_URL`: URL of the JSON feed (required)
// - `FLAK_FEED_LINK_FILTER`: Comma-separated substrings every item link must contain
//
// ### Discord
// - `FLAK_DISCORD_TOKEN`: Bot token (required)
// - `FLAK_DISCORD_API_BASE`: API base override
// - `FLAK_FEED_CHANNEL_NAME`: Channel name that receives broadcasts (default: flak-jacket)
//
// ### Emitter
// - `FLAK_POLL_INTERVAL_SECS`: Seconds between polls (default: 300)
// - `FLAK_MAX_BROADCAST_POSTS`: Leading feed items considered per poll (default: 10)
// - `FLAK_HISTORY_PAGE_SIZE`: Messages read back per destination (default: 50)
// - `FLAK_BROADCAST_CONCURRENCY`: Destinations delivered to at once (default: 16)
// - `FLAK_DESTINATIONS`: Comma-separated guild ids to broadcast to
//
// ### Logging
// - `FLAK_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export FLAK_FEED_URL=https://feed.example/api/latest.json
// export FLAK_FEED_LINK_FILTER=/en/
// export FLAK_DISCORD_TOKEN=your_token
// export FLAK_DESTINATIONS=941245436474568714,941245436474568715
//
// flakd
// ```

use anyhow::{Context, Result};
use flak_core::config::{EmitterConfig, FeedConfig, FlakConfig, TransportConfig};
use flak_core::{DestinationId, DestinationRegistry, EmitterEvent, FeedSource, FlakEmitter, Transport};
use flak_feed_http::HttpFeedSource;
use flak_transport_discord::DiscordTransport;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound on the whole shutdown: stopping the emitter and draining its events
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum FlakExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FlakExitCode> for ExitCode {
    fn from(code: FlakExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    feed_url: String,
    link_filters: Vec<String>,
    discord_token: String,
    discord_api_base: Option<String>,
    feed_channel_name: Option<String>,
    poll_interval_secs: Option<u64>,
    max_broadcast_posts: Option<usize>,
    history_page_size: Option<usize>,
    broadcast_concurrency: Option<usize>,
    destinations: Vec<DestinationId>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            feed_url: var("FLAK_FEED_URL").context("FLAK_FEED_URL is required")?,
            link_filters: split_list(var("FLAK_FEED_LINK_FILTER")),
            discord_token: var("FLAK_DISCORD_TOKEN").context("FLAK_DISCORD_TOKEN is required")?,
            discord_api_base: var("FLAK_DISCORD_API_BASE"),
            feed_channel_name: var("FLAK_FEED_CHANNEL_NAME"),
            poll_interval_secs: parse_var("FLAK_POLL_INTERVAL_SECS", var("FLAK_POLL_INTERVAL_SECS"))?,
            max_broadcast_posts: parse_var("FLAK_MAX_BROADCAST_POSTS", var("FLAK_MAX_BROADCAST_POSTS"))?,
            history_page_size: parse_var("FLAK_HISTORY_PAGE_SIZE", var("FLAK_HISTORY_PAGE_SIZE"))?,
            broadcast_concurrency: parse_var(
                "FLAK_BROADCAST_CONCURRENCY",
                var("FLAK_BROADCAST_CONCURRENCY"),
            )?,
            destinations: split_list(var("FLAK_DESTINATIONS"))
                .iter()
                .map(|id| DestinationId::from_str(id))
                .collect::<flak_core::Result<_>>()
                .context("FLAK_DESTINATIONS must be comma-separated numeric guild ids")?,
            log_level: var("FLAK_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what the environment can get wrong before anything is wired:
    /// URL schemes, placeholder tokens, numeric ranges, the log level.
    fn validate(&self) -> Result<()> {
        if !self.feed_url.starts_with("https://") && !self.feed_url.starts_with("http://") {
            anyhow::bail!(
                "FLAK_FEED_URL must use HTTP or HTTPS scheme. Got: {}",
                self.feed_url
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.discord_token.to_lowercase();
        if token_lower.contains("your_token")
            || token_lower.contains("replace_me")
            || token_lower == "token"
        {
            anyhow::bail!(
                "FLAK_DISCORD_TOKEN appears to be a placeholder. \
                Use the bot token from the Discord developer portal."
            );
        }

        if let Some(interval) = self.poll_interval_secs
            && !(10..=86_400).contains(&interval)
        {
            anyhow::bail!(
                "FLAK_POLL_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                interval
            );
        }

        if let Some(max) = self.max_broadcast_posts
            && !(1..=50).contains(&max)
        {
            anyhow::bail!("FLAK_MAX_BROADCAST_POSTS must be between 1 and 50. Got: {}", max);
        }

        if let Some(size) = self.history_page_size
            && !(1..=100).contains(&size)
        {
            anyhow::bail!("FLAK_HISTORY_PAGE_SIZE must be between 1 and 100. Got: {}", size);
        }

        if let Some(concurrency) = self.broadcast_concurrency
            && !(1..=256).contains(&concurrency)
        {
            anyhow::bail!(
                "FLAK_BROADCAST_CONCURRENCY must be between 1 and 256. Got: {}",
                concurrency
            );
        }

        if self.destinations.is_empty() {
            eprintln!("WARNING: FLAK_DESTINATIONS is empty. The daemon will idle until destinations are added.");
        }

        parse_level(&self.log_level)?;

        Ok(())
    }

    /// Build the library configuration
    fn to_flak_config(&self) -> FlakConfig {
        let feed = self
            .link_filters
            .iter()
            .fold(FeedConfig::new(self.feed_url.clone()), |feed, filter| {
                feed.with_link_filter(filter.clone())
            });

        let transport = TransportConfig::Discord {
            token: self.discord_token.clone(),
            api_base: self.discord_api_base.clone(),
        };

        let mut emitter = EmitterConfig::default();
        if let Some(secs) = self.poll_interval_secs {
            emitter = emitter.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_broadcast_posts {
            emitter = emitter.with_max_broadcast_posts(max);
        }
        if let Some(name) = &self.feed_channel_name {
            emitter = emitter.with_feed_channel_name(name.clone());
        }
        if let Some(size) = self.history_page_size {
            emitter.history_page_size = size;
        }
        if let Some(concurrency) = self.broadcast_concurrency {
            emitter.broadcast_concurrency = concurrency;
        }

        let mut config = FlakConfig::new(feed, transport);
        config.emitter = emitter;
        config
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} must be a number. Got: '{}' ({})", key, v, e))
        })
        .transpose()
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "FLAK_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FlakExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return FlakExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FlakExitCode::ConfigError.into();
    }

    info!("Starting flakd daemon");
    info!(
        "Configuration loaded: {} destination(s), {} link filter(s)",
        config.destinations.len(),
        config.link_filters.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FlakExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => FlakExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                FlakExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let flak_config = config.to_flak_config();
    flak_config.validate()?;

    let feed: Arc<dyn FeedSource> = Arc::new(HttpFeedSource::new(&flak_config.feed)?);
    let transport: Arc<dyn Transport> =
        Arc::new(DiscordTransport::from_config(&flak_config.transport)?);

    info!("Feed source: {} ({})", feed.source_name(), flak_config.feed.url);
    info!("Transport: {}", flak_config.transport.type_name());
    info!("Feed channel: #{}", flak_config.emitter.feed_channel_name);

    let registry = DestinationRegistry::new();
    for destination in &config.destinations {
        registry.add(*destination, None);
    }
    info!("Destination count: {}", registry.len());

    let (emitter, events) = FlakEmitter::new(feed, transport, registry, flak_config.emitter)?;
    let event_logger = tokio::spawn(log_events(events));

    emitter.start();

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    if tokio::time::timeout_at(deadline, emitter.stop()).await.is_err() {
        warn!("Emitter did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }

    // Dropping the emitter closes the event channel unless a detached cycle
    // still holds it
    drop(emitter);
    join_event_logger(event_logger, deadline).await;

    Ok(())
}

/// Wait for the event logger until `deadline`, aborting it after that
///
/// Returns whether the logger finished on its own.
async fn join_event_logger(mut event_logger: JoinHandle<()>, deadline: Instant) -> bool {
    match tokio::time::timeout_at(deadline, &mut event_logger).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Event logger ended abnormally: {}", e);
            true
        }
        Err(_) => {
            warn!("Event logger still running at shutdown deadline, aborting");
            event_logger.abort();
            false
        }
    }
}

/// Log emitter events until the channel closes
async fn log_events(mut events: mpsc::Receiver<EmitterEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EmitterEvent::CycleCompleted {
                destinations,
                delivered,
                failed,
            } if failed > 0 => {
                warn!(
                    "Cycle finished with failures: {} destination(s), {} delivered, {} failed",
                    destinations, delivered, failed
                );
            }
            other => debug!("Emitter event: {:?}", other),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
