//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ApiConfig: Where to fetch from and the bearer token.
//!     - DeviceConfig: Which device to show (id wins over name).
//!     - PollingConfig: Normal interval and the short retry delay.
//!     - DisplayConfig: Widget size, row toggles, titles, units.
//!     - LoggingConfig: Log level and sensor echo.
//!     - ServerConfig: Where the widget is served, companion toggle.
//!
//! every section falls back to the defaults below, so a file holding only
//! `[api] token = "..."` is a valid config.
//!
//! ==============================================================================

use crate::error::ConfigError;
use crate::format::{HourFormat, TemperatureUnit};
use crate::selector::DeviceCriterion;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base: String,
    pub endpoint: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub update_interval_ms: u64,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub title: String,
    pub width: String,
    pub height: String,
    pub show_temperature: bool,
    pub show_humidity: bool,
    pub show_illumination: bool,
    pub show_motion: bool,
    pub temperature_title: String,
    pub humidity_title: String,
    pub illumination_title: String,
    pub motion_title: String,
    pub temperature_unit: TemperatureUnit,
    pub motion_date_offset_seconds: i64,
    pub motion_date_hour_format: HourFormat,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub companion: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base: "https://api.nature.global/".to_string(),
            endpoint: "1/devices".to_string(),
            token: String::new(),
        }
    }
}

impl ApiConfig {
    /// `{base}{endpoint}` - plain concatenation, the base keeps its slash
    pub fn url(&self) -> String {
        format!("{}{}", self.base, self.endpoint)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { update_interval_ms: 10 * 60 * 1000, retry_delay_ms: 5000 }
    }
}

impl PollingConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: "Nature Remo".to_string(),
            width: "500px".to_string(),
            height: "300px".to_string(),
            show_temperature: true,
            show_humidity: true,
            show_illumination: true,
            show_motion: true,
            temperature_title: "Temperature: ".to_string(),
            humidity_title: "Humidity: ".to_string(),
            illumination_title: "Illumination: ".to_string(),
            motion_title: "Motion Detect: ".to_string(),
            temperature_unit: TemperatureUnit::Celsius,
            motion_date_offset_seconds: 0,
            motion_date_hour_format: HourFormat::H24,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: false }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string(), companion: true }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))
    }

    /// Load from the path given as first argument, if any
    ///
    /// an explicit path must load; only the search in `load_or_default`
    /// is allowed to fall back.
    pub fn load_from_args() -> anyhow::Result<Self> {
        match std::env::args_os().nth(1) {
            Some(path) => {
                let path = PathBuf::from(path);
                let config = Self::load(&path)?;
                println!("[CONFIG] Loaded from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::load_or_default()),
        }
    }

    /// Load with default fallback
    ///
    /// runs before logging is set up (the level lives in this file), so
    /// it reports on stdout.
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// a fetch is never attempted without a token
    ///
    /// the interval is checked first: it also drives the redraw timer, so
    /// a zero interval is fatal even when polling is off.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.update_interval_ms == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }
        if self.api.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(())
    }

    pub fn device_criterion(&self) -> DeviceCriterion {
        DeviceCriterion::from_parts(&self.device.id, &self.device.name)
    }

    /// Log configuration summary (token left out)
    pub fn print_summary(&self) {
        tracing::info!("api url: {}", self.api.url());
        tracing::info!("device: {:?}", self.device_criterion());
        tracing::info!(
            "polling: every {}ms, retry after {}ms",
            self.polling.update_interval_ms,
            self.polling.retry_delay_ms
        );
        tracing::info!(
            "display: {:?}, {:?} clock, motion offset {}s",
            self.display.temperature_unit,
            self.display.motion_date_hour_format,
            self.display.motion_date_offset_seconds
        );
        tracing::info!("widget server: {} (companion: {})", self.server.bind, self.server.companion);
    }
}
