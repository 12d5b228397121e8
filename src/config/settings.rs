//! Process settings loaded from config.toml
//!
//! Every field has a default, so an empty or missing file yields a working setup.
//! `DATABASE_URL` from the environment (or `.env`) takes precedence over the file.
//! Mining thresholds are not here: they live in the `recommendation_config` table.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection string
    pub database_url: String,
    /// Recommendation cache settings
    pub cache: CacheSettings,
    /// Periodic job settings
    pub scheduler: SchedulerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            cache: CacheSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

/// `[cache]` table
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
    /// Time-to-live of per-product recommendation entries, in seconds
    pub product_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            product_ttl_secs: 12 * 60 * 60,
        }
    }
}

impl CacheSettings {
    /// Per-product TTL as a `Duration`
    #[must_use]
    pub const fn product_ttl(&self) -> Duration {
        Duration::from_secs(self.product_ttl_secs)
    }
}

/// `[scheduler]` table
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerSettings {
    /// UTC hour of the daily remine check
    pub remine_hour: u32,
    /// UTC minute of the daily remine check
    pub remine_minute: u32,
    /// Hours between popular-product precompute passes
    pub precompute_every_hours: u32,
    /// Minute offset of the precompute pass within its hour
    pub precompute_minute: u32,
    /// Trailing window, in days, used to rank popular products
    pub popular_window_days: i64,
    /// Number of popular products to warm
    pub popular_limit: u64,
    /// Recommendations computed per popular product
    pub precompute_limit: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            remine_hour: 3,
            remine_minute: 0,
            precompute_every_hours: 4,
            precompute_minute: 15,
            popular_window_days: 30,
            popular_limit: 50,
            precompute_limit: 10,
        }
    }
}

impl SchedulerSettings {
    /// Rejects schedules that can never fire.
    pub fn validate(&self) -> Result<()> {
        if self.remine_hour > 23 || self.remine_minute > 59 || self.precompute_minute > 59 {
            return Err(Error::Config {
                message: format!(
                    "Invalid schedule time: remine {:02}:{:02}, precompute minute {}",
                    self.remine_hour, self.remine_minute, self.precompute_minute
                ),
            });
        }
        if self.precompute_every_hours == 0 || 24 % self.precompute_every_hours != 0 {
            return Err(Error::Config {
                message: format!(
                    "precompute_every_hours must divide 24, got {}",
                    self.precompute_every_hours
                ),
            });
        }
        if self.popular_window_days <= 0 {
            return Err(Error::Config {
                message: format!(
                    "popular_window_days must be positive, got {}",
                    self.popular_window_days
                ),
            });
        }
        Ok(())
    }
}

/// Parses config.toml contents and applies the environment override.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let mut config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    config.scheduler.validate()?;
    Ok(config)
}

/// Loads settings from a TOML file.
///
/// A missing file is not an error: defaults (plus environment overrides) are used.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid or a field has the wrong type
/// - The schedule is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    if !path_ref.exists() {
        info!("No config file at {:?}, using defaults", path_ref);
        return parse_config("");
    }
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}
