//! Configuration types for the sync pipeline

use crate::error::{Result, SyncError};
use crate::source::KnownSource;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Configuration for fetching and storing wish lists
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Largest response body accepted from a wish list source
    pub max_body_bytes: u64,
    /// Retry attempts a caller may make for recoverable fetch failures
    pub max_retries: usize,
    /// Initial delay between retries (doubles each retry)
    pub retry_delay: Duration,
    /// Maximum retry delay cap
    pub max_retry_delay: Duration,
    /// Source used when nothing has been configured yet
    pub default_source: String,
    /// How old the active list may get before a refresh fetches it again
    pub max_age: Duration,
    /// Where the active wish list is persisted
    pub state_path: PathBuf,
}

impl SyncConfig {
    /// Calculate retry delay for the given attempt using exponential backoff
    pub fn get_retry_delay(&self, attempt: usize) -> Duration {
        let delay = (self.retry_delay.as_millis() as u64).saturating_mul(2_u64.saturating_pow(attempt as u32));
        Duration::from_millis(delay.min(self.max_retry_delay.as_millis() as u64))
    }

    /// Default location of the persisted state file
    pub fn default_state_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wishlist")
            .join("state.json")
    }

    /// Load configuration from the environment, reading `.env` if present
    ///
    /// Recognized variables: `WISHLIST_SOURCE`, `WISHLIST_STATE_PATH`,
    /// `WISHLIST_TIMEOUT_SECS`, `WISHLIST_MAX_RETRIES`, `WISHLIST_MAX_AGE_HOURS`.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = SyncConfigBuilder::new();

        if let Some(source) = lookup("WISHLIST_SOURCE") {
            debug!("Using wish list source from environment: {}", source);
            builder = builder.default_source(source.trim());
        }
        if let Some(path) = lookup("WISHLIST_STATE_PATH") {
            builder = builder.state_path(path);
        }
        if let Some(secs) = lookup("WISHLIST_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("WISHLIST_TIMEOUT_SECS", &secs)?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(retries) = lookup("WISHLIST_MAX_RETRIES") {
            builder = builder.max_retries(parse_number("WISHLIST_MAX_RETRIES", &retries)?);
        }
        if let Some(hours) = lookup("WISHLIST_MAX_AGE_HOURS") {
            let hours = parse_number::<u64>("WISHLIST_MAX_AGE_HOURS", &hours)?;
            builder = builder.max_age(Duration::from_secs(hours.saturating_mul(3600)));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every fetch fail
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(SyncError::Configuration {
                message: "timeout must be greater than zero".to_string(),
                field: Some("timeout".to_string()),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(SyncError::Configuration {
                message: "max_body_bytes must be greater than zero".to_string(),
                field: Some("max_body_bytes".to_string()),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| SyncError::Configuration {
        message: format!("{} must be a whole number, got '{}'", field, value),
        field: Some(field.to_string()),
    })
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "wishlist/0.1.0".to_string(),
            max_body_bytes: 64 * 1024 * 1024, // Community lists run to tens of MB
            max_retries: 3,
            retry_delay: Duration::from_millis(1000), // Start with 1 second
            max_retry_delay: Duration::from_secs(60),
            default_source: KnownSource::Voltron.url().to_string(),
            max_age: Duration::from_secs(24 * 60 * 60),
            state_path: Self::default_state_path(),
        }
    }
}

/// Builder for SyncConfig
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn max_body_bytes(mut self, max_body_bytes: u64) -> Self {
        self.config.max_body_bytes = max_body_bytes;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.config.max_retry_delay = delay;
        self
    }

    pub fn default_source<S: Into<String>>(mut self, source: S) -> Self {
        self.config.default_source = source.into();
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.config.max_age = max_age;
        self
    }

    pub fn state_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.state_path = path.into();
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}
