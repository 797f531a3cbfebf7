use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How the relay produces replies on a widget channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayMode {
    /// Canned echo after a fixed delay.
    Demo,
    /// Verbatim forwarding to and from an upstream voice provider.
    Upstream,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub agents_path: Option<PathBuf>,
    pub public_dir: PathBuf,
    /// Overrides the `ws://host` prefix derived from each bootstrap request.
    pub public_ws_url: Option<String>,
    pub relay_mode: RelayMode,
    pub upstream_ws_url: Option<String>,
    pub upstream_api_key: Option<String>,
    pub reply_delay: Duration,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3001)),
            agents_path: None,
            public_dir: PathBuf::from("./public"),
            public_ws_url: None,
            relay_mode: RelayMode::Demo,
            upstream_ws_url: None,
            upstream_api_key: None,
            reply_delay: Duration::from_millis(1000),
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(value) => value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            Err(_) => defaults.bind_address,
        };

        let agents_path = std::env::var("AGENTS_PATH").ok().map(PathBuf::from);
        let public_dir = std::env::var("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.public_dir);
        let public_ws_url = std::env::var("PUBLIC_WS_URL").ok();

        let mode_str = std::env::var("RELAY_MODE").unwrap_or_else(|_| "demo".to_string());
        let relay_mode = match mode_str.to_lowercase().as_str() {
            "demo" => RelayMode::Demo,
            "upstream" => RelayMode::Upstream,
            other => {
                return Err(ConfigError::InvalidValue(
                    "RELAY_MODE".to_string(),
                    format!("'{}' is not one of 'demo', 'upstream'", other),
                ));
            }
        };

        let upstream_ws_url = std::env::var("UPSTREAM_WS_URL").ok();
        let upstream_api_key = std::env::var("UPSTREAM_API_KEY").ok();

        let reply_delay = match std::env::var("REPLY_DELAY_MS") {
            Ok(value) => value.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                ConfigError::InvalidValue(
                    "REPLY_DELAY_MS".to_string(),
                    format!("'{}' is not a number of milliseconds", value),
                )
            })?,
            Err(_) => defaults.reply_delay,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        if relay_mode == RelayMode::Upstream && upstream_ws_url.is_none() {
            return Err(ConfigError::MissingVar(
                "UPSTREAM_WS_URL must be set for 'upstream' relay mode".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            agents_path,
            public_dir,
            public_ws_url,
            relay_mode,
            upstream_ws_url,
            upstream_api_key,
            reply_delay,
            log_level,
        })
    }
}
