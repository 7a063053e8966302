//! Agent configuration: TOML file plus `CHORUS_*` environment overrides.

use chorus_metrics::{MetricsConfig, ValidationMode, DEFAULT_METRICS_PORT};
use chorus_voice::{LiveKitConfig, PipelineConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Metrics exposition and sampling settings.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// LiveKit transport credentials.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// Speech pipeline provider selection.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics subsystem configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    /// Host address the exposition endpoint binds to.
    #[serde(default = "default_metrics_host")]
    pub host: IpAddr,

    /// Exposition port. Keep stable across restarts for scrape
    /// continuity.
    #[serde(default = "default_metrics_port")]
    pub port: u16,

    /// Host resource sampling period in seconds.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// When true, unknown call ids and duplicate starts become errors
    /// instead of silent no-ops.
    #[serde(default)]
    pub strict_validation: bool,
}

impl MetricsSection {
    /// Maps this section onto the metrics runtime's own config type.
    pub fn to_metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            host: self.host,
            port: self.port,
            sample_interval: Duration::from_secs(self.sample_interval_secs),
            validation: if self.strict_validation {
                ValidationMode::Strict
            } else {
                ValidationMode::Lenient
            },
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `chorus_agent=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit log lines as JSON instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_metrics_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_sample_interval_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            host: default_metrics_host(),
            port: default_metrics_port(),
            sample_interval_secs: default_sample_interval_secs(),
            strict_validation: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// The file is not valid TOML for [`Config`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from `path`, then applies environment overrides.
///
/// A missing file is not an error; the agent starts from defaults. A
/// file that exists but cannot be read or parsed is.
///
/// Overrides, each winning over the file value when set:
/// `CHORUS_METRICS_HOST`, `CHORUS_METRICS_PORT`, `CHORUS_LIVEKIT_URL`,
/// `CHORUS_LIVEKIT_API_KEY`, `CHORUS_LIVEKIT_API_SECRET`,
/// `CHORUS_LOG_LEVEL`, and `CHORUS_LOG_JSON` (`true`/`1` enables).
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path.map(|p| (p, std::fs::read_to_string(p))) {
        Some((_, Ok(contents))) => toml::from_str(&contents)?,
        Some((p, Err(e))) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = p, "no config file, starting from defaults");
            Config::default()
        }
        Some((_, Err(e))) => return Err(ConfigError::FileRead(e)),
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    let var = |name: &str| std::env::var(name).ok();

    if let Some(host) = var("CHORUS_METRICS_HOST").and_then(|v| v.parse().ok()) {
        config.metrics.host = host;
    }
    if let Some(port) = var("CHORUS_METRICS_PORT").and_then(|v| v.parse().ok()) {
        config.metrics.port = port;
    }
    if let Some(url) = var("CHORUS_LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Some(key) = var("CHORUS_LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Some(secret) = var("CHORUS_LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }
    if let Some(level) = var("CHORUS_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("CHORUS_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
