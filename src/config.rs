use std::env;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::timeline::window_millis;

/// Upper bound on bars per timeline.
pub const MAX_BAR_AMOUNT: usize = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    // Persistent cache (in-memory store when unset)
    pub database_url: Option<String>,

    // Home Assistant API
    pub hass_base_url: String,
    pub hass_token: String,
    pub hass_timeout_seconds: u64,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,

    // In-memory store
    pub cache_max_bytes: u64,

    // Timeline defaults and background refresh
    pub timeline_entities: Vec<String>,
    pub timeline: TimelineDefaults,
}

/// Values used when a request (or the refresh loop) does not override them.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineDefaults {
    pub hours_to_show: f64,
    pub bar_amount: usize,
    pub severity: f64,
    pub update_interval_seconds: u64,
    pub ok: Option<String>,
    pub ko: Option<String>,
}

impl Default for TimelineDefaults {
    fn default() -> Self {
        Self {
            hours_to_show: 24.0,
            bar_amount: 36,
            severity: 100.0,
            update_interval_seconds: 0,
            ok: None,
            ko: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            hass_base_url: "http://homeassistant.local:8123".to_string(),
            hass_token: String::new(),
            hass_timeout_seconds: 30,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            disable_rate_limiting: false,
            rate_limit_per_second: 10,
            rate_limit_burst: 60,
            cache_max_bytes: 64 * 1024 * 1024,
            timeline_entities: Vec::new(),
            timeline: TimelineDefaults::default(),
        }
    }
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `HASS_TOKEN` is not set, and
    /// `ConfigError::Invalid` if the timeline defaults are out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let timeline = TimelineDefaults {
            hours_to_show: parsed_or("TIMELINE_HOURS_TO_SHOW", defaults.timeline.hours_to_show),
            bar_amount: parsed_or("TIMELINE_BAR_AMOUNT", defaults.timeline.bar_amount),
            severity: parsed_or("TIMELINE_SEVERITY", defaults.timeline.severity),
            update_interval_seconds: parsed_or(
                "TIMELINE_UPDATE_INTERVAL_SECONDS",
                defaults.timeline.update_interval_seconds,
            ),
            ok: non_empty("TIMELINE_OK"),
            ko: non_empty("TIMELINE_KO"),
        };

        let config = Self {
            database_url: non_empty("DATABASE_URL"),

            hass_base_url: env::var("HASS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.hass_base_url),
            hass_token: env::var("HASS_TOKEN").map_err(|_| ConfigError::Missing("HASS_TOKEN"))?,
            hass_timeout_seconds: parsed_or("HASS_TIMEOUT_SECONDS", defaults.hass_timeout_seconds),

            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parsed_or("API_PORT", defaults.api_port),

            disable_rate_limiting: parsed_or("DISABLE_RATE_LIMITING", false),
            rate_limit_per_second: parsed_or("RATE_LIMIT_PER_SECOND", defaults.rate_limit_per_second),
            rate_limit_burst: parsed_or("RATE_LIMIT_BURST", defaults.rate_limit_burst),

            cache_max_bytes: parsed_or("CACHE_MAX_BYTES", defaults.cache_max_bytes),

            timeline_entities: env::var("TIMELINE_ENTITIES")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            timeline,
        };

        // Reject bad defaults at startup rather than on the first request
        for entity in &config.timeline_entities {
            TimelineConfig::from_defaults(entity, &config.timeline)
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

/// Check that `entity_id` has the `domain.object_id` shape, both parts made
/// of lowercase ascii letters, digits and underscores.
///
/// # Errors
///
/// Returns `AppError::BadRequest` otherwise.
pub fn validate_entity_id(entity_id: &str) -> AppResult<()> {
    let valid_part =
        |part: &str| !part.is_empty() && part.bytes().all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'));

    match entity_id.split_once('.') {
        Some((domain, object_id)) if valid_part(domain) && valid_part(object_id) => Ok(()),
        _ => Err(AppError::BadRequest(format!(
            "entity id must look like 'domain.object_id', got '{entity_id}'"
        ))),
    }
}

/// Settings for rendering one entity's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    pub entity: String,
    pub hours_to_show: f64,
    pub bar_amount: usize,
    pub ok: Option<String>,
    pub ko: Option<String>,
    pub severity: f64,
    pub alias_ok: Option<String>,
    pub alias_ko: Option<String>,
}

impl TimelineConfig {
    #[must_use]
    pub fn from_defaults(entity: &str, defaults: &TimelineDefaults) -> Self {
        Self {
            entity: entity.to_string(),
            hours_to_show: defaults.hours_to_show,
            bar_amount: defaults.bar_amount,
            ok: defaults.ok.clone(),
            ko: defaults.ko.clone(),
            severity: defaults.severity,
            alias_ok: None,
            alias_ko: None,
        }
    }

    /// Check the ranges the bar computation relies on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a malformed entity id, a
    /// non-positive window, a bar amount outside `1..=MAX_BAR_AMOUNT` or
    /// larger than the window in milliseconds, or a severity outside
    /// `0..=100`.
    pub fn validate(self) -> AppResult<Self> {
        validate_entity_id(&self.entity)?;
        if !self.hours_to_show.is_finite() || self.hours_to_show <= 0.0 {
            return Err(AppError::BadRequest(format!(
                "hours_to_show must be positive, got {}",
                self.hours_to_show
            )));
        }
        if self.bar_amount == 0 {
            return Err(AppError::BadRequest(
                "bar_amount must be positive".to_string(),
            ));
        }
        // Every bar must cover at least one millisecond
        let window = usize::try_from(window_millis(self.hours_to_show)).unwrap_or(usize::MAX);
        if self.bar_amount > MAX_BAR_AMOUNT.min(window) {
            return Err(AppError::BadRequest(format!(
                "bar_amount must be at most {} for this window, got {}",
                MAX_BAR_AMOUNT.min(window),
                self.bar_amount
            )));
        }
        if !(0.0..=100.0).contains(&self.severity) {
            return Err(AppError::BadRequest(format!(
                "severity must be between 0 and 100, got {}",
                self.severity
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
