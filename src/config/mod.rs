// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module
//!
//! The service reads one file at startup. TOML is the native format; a `.json`
//! file with the `{"profiles": {...}, "settings": {...}}` layout is accepted too.
//! Everything is validated once into a [`ProfileSet`] so that a broken profile
//! table stops the service before the first poll.

mod profiles;

pub use profiles::{Profile, ProfileConfig, ProfileSet, DEFAULT_ICON};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable holding the InfluxDB API token
pub const ENV_INFLUX_TOKEN: &str = "INFLUXDB_TOKEN";
/// Environment variable holding the Pushover application token
pub const ENV_PUSHOVER_TOKEN: &str = "PUSHOVER_TOKEN";
/// Environment variable overriding the Pushover recipient (user or group key)
pub const ENV_PUSHOVER_USER: &str = "PUSHOVER_USER";

/// Errors raised while loading or validating configuration. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("configuration file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to access configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no appliance profiles configured")]
    NoProfiles,

    #[error("profile '{device}': {reason}")]
    InvalidProfile { device: String, reason: String },

    #[error("setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level used when no CLI flag overrides it
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Feed detectors from simulated plugs instead of InfluxDB
    #[serde(default)]
    pub demo_mode: bool,

    /// Global service settings
    #[serde(default)]
    pub settings: Settings,

    /// InfluxDB connection (readings source and optional event store)
    #[serde(default)]
    pub influx: InfluxConfig,

    /// Shared display
    #[serde(default)]
    pub display: DisplayConfig,

    /// Push notifications
    #[serde(default)]
    pub pushover: PushoverConfig,

    /// Event persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Appliance profiles keyed by device identifier
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "coffee-machine".to_string(),
            ProfileConfig {
                event_name: "espresso".to_string(),
                event_name_plural: Some("espressos".to_string()),
                threshold_on: 1000.0,
                threshold_off: 50.0,
                cooldown_seconds: Some(60),
                cooling_confirmation_seconds: None,
                min_duration_seconds: 15,
                max_duration_seconds: Some(600),
                track_duration: false,
                track_energy: true,
                awtrix_icon: Some("2416".to_string()),
            },
        );
        profiles.insert(
            "tv".to_string(),
            ProfileConfig {
                event_name: "tv_session".to_string(),
                event_name_plural: Some("TV sessions".to_string()),
                threshold_on: 60.0,
                threshold_off: 20.0,
                cooldown_seconds: Some(120),
                cooling_confirmation_seconds: Some(120),
                min_duration_seconds: 300,
                max_duration_seconds: None,
                track_duration: true,
                track_energy: true,
                awtrix_icon: Some("7956".to_string()),
            },
        );

        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            demo_mode: false,
            settings: Settings::default(),
            influx: InfluxConfig::default(),
            display: DisplayConfig::default(),
            pushover: PushoverConfig::default(),
            store: StoreConfig::default(),
            profiles,
        }
    }
}

impl Config {
    /// Load configuration from file, pull secrets from the environment and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = if is_json_path(path) {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        config.apply_env();
        config.validate()?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON document without touching the environment
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Save configuration to file, as JSON for a `.json` path and TOML otherwise
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = if is_json_path(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Write a starter configuration with example profiles. Never overwrites.
    pub fn write_template(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Fill secrets and recipient overrides from the process environment
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ENV_INFLUX_TOKEN) {
            debug!("Using InfluxDB token from {}", ENV_INFLUX_TOKEN);
            self.influx.token = Some(SecretString::new(token));
        }
        if let Ok(token) = std::env::var(ENV_PUSHOVER_TOKEN) {
            debug!("Using Pushover token from {}", ENV_PUSHOVER_TOKEN);
            self.pushover.token = Some(SecretString::new(token));
        }
        if let Ok(user) = std::env::var(ENV_PUSHOVER_USER) {
            self.pushover.user = Some(user);
        }
    }

    /// Check global settings and resolve the profile table
    pub fn validate(&self) -> Result<ProfileSet, ConfigError> {
        self.settings.validate()?;
        self.display.validate()?;
        ProfileSet::from_config(&self.profiles, &self.settings)
    }

    /// Resolved, validated profile table
    pub fn profile_set(&self) -> Result<ProfileSet, ConfigError> {
        self.validate()
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("plugwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Global service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between poll cycles
    pub polling_interval_seconds: u64,

    /// Default sustained-low duration that confirms an event ended
    pub cooling_confirmation_seconds: u64,

    /// Default quiet period after an event
    pub cooldown_seconds: u64,

    /// Send the Day/Week/Month/Year summaries at xx:05, xx:25 and xx:45
    pub summary_enabled: bool,

    /// Display time of each period summary
    pub summary_display_seconds: u32,

    /// Local hour of the daily rollup
    pub daily_summary_hour: u32,

    /// Local minute of the daily rollup
    pub daily_summary_minute: u32,

    /// Show a display notification for every completed event
    pub enable_awtrix_on_event: bool,

    /// Push the detailed daily rollup
    pub enable_pushover_daily: bool,

    /// Event type whose total duration is shown last in period summaries
    pub headline_event_type: Option<String>,

    /// Label used for the headline event type
    pub headline_label: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            polling_interval_seconds: 15,
            cooling_confirmation_seconds: 30,
            cooldown_seconds: 60,
            summary_enabled: true,
            summary_display_seconds: 12,
            daily_summary_hour: 21,
            daily_summary_minute: 5,
            enable_awtrix_on_event: false,
            enable_pushover_daily: true,
            headline_event_type: Some("tv_session".to_string()),
            headline_label: "TV".to_string(),
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_seconds == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "polling_interval_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.daily_summary_hour > 23 {
            return Err(ConfigError::InvalidSetting {
                name: "daily_summary_hour",
                reason: format!("{} is not an hour of the day", self.daily_summary_hour),
            });
        }
        if self.daily_summary_minute > 59 {
            return Err(ConfigError::InvalidSetting {
                name: "daily_summary_minute",
                reason: format!("{} is not a minute", self.daily_summary_minute),
            });
        }
        Ok(())
    }
}

/// InfluxDB v2 connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://influxdb:8086`
    pub url: String,

    /// Organization
    pub org: String,

    /// Bucket holding raw power readings
    pub source_bucket: String,

    /// Bucket receiving detected events
    pub events_bucket: String,

    /// Measurement of the raw readings
    pub measurement: String,

    /// Field carrying instantaneous power in watts
    pub power_field: String,

    /// How far back to look for the latest sample, as a Flux duration
    pub lookback: String,

    /// HTTP timeout
    pub timeout_secs: u64,

    /// API token, taken from `INFLUXDB_TOKEN`
    #[serde(skip)]
    pub token: Option<SecretString>,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "None".to_string(),
            source_bucket: "power_consumption".to_string(),
            events_bucket: "appliance_events".to_string(),
            measurement: "power_consumption".to_string(),
            power_field: "power".to_string(),
            lookback: "-1m".to_string(),
            timeout_secs: 10,
            token: None,
        }
    }
}

/// Transport used to reach the display
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayTransport {
    Http,
    Mqtt,
}

/// Shared display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Disabled displays only log what would have been shown
    pub enabled: bool,

    pub transport: DisplayTransport,

    /// HTTP host of the display
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,

    /// MQTT broker used when `transport = "mqtt"`
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub mqtt_prefix: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,

    /// Cadence of the display's own status carousel
    pub carousel_period_minutes: u32,

    /// Minutes at the start of each carousel period that must stay free
    pub carousel_busy_minutes: u32,

    /// Pause between consecutive summary messages
    pub message_spacing_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transport: DisplayTransport::Http,
            host: "awtrix.local".to_string(),
            port: 80,
            timeout_secs: 5,
            mqtt_broker: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: "plugwatch".to_string(),
            mqtt_prefix: "awtrix".to_string(),
            mqtt_username: None,
            mqtt_password: None,
            carousel_period_minutes: 10,
            carousel_busy_minutes: 3,
            message_spacing_ms: 500,
        }
    }
}

impl DisplayConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.carousel_period_minutes == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "carousel_period_minutes",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.carousel_busy_minutes >= self.carousel_period_minutes {
            return Err(ConfigError::InvalidSetting {
                name: "carousel_busy_minutes",
                reason: format!(
                    "{} leaves no safe minute in a {} minute period",
                    self.carousel_busy_minutes, self.carousel_period_minutes
                ),
            });
        }
        Ok(())
    }
}

/// Push notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    pub enabled: bool,
    pub api_url: String,
    pub timeout_secs: u64,

    /// Recipient user or group key
    pub user: Option<String>,

    /// Application token, taken from `PUSHOVER_TOKEN`
    #[serde(skip)]
    pub token: Option<SecretString>,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://api.pushover.net/1/messages.json".to_string(),
            timeout_secs: 10,
            user: None,
            token: None,
        }
    }
}

/// Event store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Influx,
}

/// Event persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// SQLite database path
    pub path: PathBuf,

    /// Rows older than this are removed at startup (SQLite only)
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("./data/plugwatch.db"),
            retention_days: 400,
        }
    }
}
