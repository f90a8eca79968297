//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{RetryPolicy, max_pending_duration};

/// Headroom on top of the longest saga for store round trips.
const RECOVERY_MARGIN: Duration = Duration::from_secs(5);

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps everything in memory
/// - `LEDGER_URL`: base URL of a remote ledger; unset calls the local ledger in-process
/// - `CONFIRM_TIMEOUT_MS`: per-call ledger timeout (default: `5000`)
/// - `CONFIRM_MAX_RETRIES`: retries after the first attempt (default: `2`)
/// - `CONFIRM_INITIAL_BACKOFF_MS`: first retry delay, doubled per retry (default: `500`)
/// - `RECOVERY_GRACE_SECS`: age of a pending booking before startup recovery touches it
///   (default: `60`, never below the longest a live saga can stay pending)
/// - `SEED_DEMO_DATA`: load the demo hotels and rooms (default: on without a database)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub ledger_url: Option<String>,
    pub confirm_timeout: Duration,
    pub confirm_max_retries: u32,
    pub confirm_initial_backoff: Duration,
    pub recovery_grace: Duration,
    pub seed_demo_data: Option<bool>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::parse(lookup);
        let floor = config.min_recovery_grace();
        if config.recovery_grace < floor {
            tracing::warn!(
                configured_secs = config.recovery_grace.as_secs(),
                floor_secs = floor.as_secs(),
                "RECOVERY_GRACE_SECS below the confirmation retry budget, raising it"
            );
            config.recovery_grace = floor;
        }
        config
    }

    fn parse(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            ledger_url: non_empty("LEDGER_URL"),
            confirm_timeout: parsed("CONFIRM_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.confirm_timeout),
            confirm_max_retries: parsed("CONFIRM_MAX_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.confirm_max_retries),
            confirm_initial_backoff: parsed("CONFIRM_INITIAL_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.confirm_initial_backoff),
            recovery_grace: parsed("RECOVERY_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.recovery_grace),
            seed_demo_data: lookup("SEED_DEMO_DATA").and_then(|v| parse_bool(&v)),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether to load demo data, defaulting to on only for in-memory stores.
    pub fn should_seed(&self) -> bool {
        self.seed_demo_data
            .unwrap_or(self.database_url.is_none())
    }

    /// Shortest grace that keeps the recovery sweep away from sagas still
    /// running under [`retry_policy`](Self::retry_policy).
    pub fn min_recovery_grace(&self) -> Duration {
        max_pending_duration(&self.retry_policy()) + RECOVERY_MARGIN
    }

    /// Timeout and retry settings for ledger calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_call_timeout(self.confirm_timeout)
            .with_max_retries(self.confirm_max_retries)
            .with_initial_backoff(self.confirm_initial_backoff)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            ledger_url: None,
            confirm_timeout: Duration::from_secs(5),
            confirm_max_retries: 2,
            confirm_initial_backoff: Duration::from_millis(500),
            recovery_grace: Duration::from_secs(60),
            seed_demo_data: None,
        }
    }
}
