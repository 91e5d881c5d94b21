//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunables of the reminder engine and the signed-URL cache.
//! - Parse overrides from JSON and reject inconsistent values.
//!
//! # Invariants
//! - `candidate_fetch_limit >= max_scheduled > 0`.
//! - `0 < url_cache_ratio <= 1`, so cached URLs expire before the backend's.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_MAX_SCHEDULED: usize = 40;
pub const DEFAULT_CANDIDATE_FETCH_LIMIT: usize = 200;
pub const DEFAULT_SETTINGS_TTL_SECS: u64 = 60;
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 60 * 60;
/// Longest lifetime the storage backend grants a signed URL (7 days).
pub const MAX_SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_URL_CACHE_RATIO: f64 = 0.9;
pub const DEFAULT_REMINDER_HOUR: u32 = 9;
pub const DEFAULT_STORAGE_KEY_PREFIX: &str = "dotoring:notif:coupon:";
pub const DEFAULT_IMAGE_BUCKET: &str = "coupon-images";
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "default";

/// Tunables shared by the reminder engine and the URL cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum coupons kept with on-device reminders at once.
    pub max_scheduled: usize,
    /// Upper bound on candidates fetched per full reschedule.
    pub candidate_fetch_limit: usize,
    pub settings_ttl_secs: u64,
    /// Lifetime requested for backend-signed URLs.
    pub signed_url_ttl_secs: u64,
    /// Fraction of `signed_url_ttl_secs` a cached URL is served for.
    pub url_cache_ratio: f64,
    /// Local hour-of-day every reminder fires at.
    pub reminder_hour: u32,
    pub storage_key_prefix: String,
    pub image_bucket: String,
    pub notification_channel: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_scheduled: DEFAULT_MAX_SCHEDULED,
            candidate_fetch_limit: DEFAULT_CANDIDATE_FETCH_LIMIT,
            settings_ttl_secs: DEFAULT_SETTINGS_TTL_SECS,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            url_cache_ratio: DEFAULT_URL_CACHE_RATIO,
            reminder_hour: DEFAULT_REMINDER_HOUR,
            storage_key_prefix: DEFAULT_STORAGE_KEY_PREFIX.to_string(),
            image_bucket: DEFAULT_IMAGE_BUCKET.to_string(),
            notification_channel: DEFAULT_NOTIFICATION_CHANNEL.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object; missing fields keep their defaults.
    ///
    /// # Errors
    /// - Returns `ConfigError::Parse` for malformed JSON.
    /// - Returns `ConfigError::Invalid` when `validate` rejects the result.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_max_scheduled(mut self, max_scheduled: usize) -> Self {
        self.max_scheduled = max_scheduled;
        self
    }

    #[must_use]
    pub fn with_candidate_fetch_limit(mut self, limit: usize) -> Self {
        self.candidate_fetch_limit = limit;
        self
    }

    #[must_use]
    pub fn with_settings_ttl_secs(mut self, secs: u64) -> Self {
        self.settings_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_signed_url_ttl_secs(mut self, secs: u64) -> Self {
        self.signed_url_ttl_secs = secs;
        self
    }

    #[must_use]
    pub fn with_reminder_hour(mut self, hour: u32) -> Self {
        self.reminder_hour = hour;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_scheduled == 0 {
            return Err(ConfigError::Invalid("max_scheduled must be positive".into()));
        }
        if self.candidate_fetch_limit < self.max_scheduled {
            return Err(ConfigError::Invalid(format!(
                "candidate_fetch_limit {} is below max_scheduled {}",
                self.candidate_fetch_limit, self.max_scheduled
            )));
        }
        if self.signed_url_ttl_secs == 0 || self.signed_url_ttl_secs > MAX_SIGNED_URL_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "signed_url_ttl_secs must be 1..={MAX_SIGNED_URL_TTL_SECS}, got {}",
                self.signed_url_ttl_secs
            )));
        }
        if !(self.url_cache_ratio > 0.0 && self.url_cache_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "url_cache_ratio must be in (0, 1], got {}",
                self.url_cache_ratio
            )));
        }
        if self.reminder_hour > 23 {
            return Err(ConfigError::Invalid(format!(
                "reminder_hour must be 0..=23, got {}",
                self.reminder_hour
            )));
        }
        if self.storage_key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_key_prefix cannot be empty".into()));
        }
        if self.image_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("image_bucket cannot be empty".into()));
        }
        Ok(())
    }

    pub fn settings_ttl(&self) -> Duration {
        Duration::from_secs(self.settings_ttl_secs)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    /// How long a signed URL is served from cache (ratio of its real lifetime).
    pub fn url_cache_ttl(&self) -> Duration {
        self.signed_url_ttl().mul_f64(self.url_cache_ratio)
    }
}

/// Configuration load/validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "config parse failed: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {}
