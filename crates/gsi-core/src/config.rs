//! Configuration loading and typed config structures for the GSI service.
//!
//! Configuration lives in an optional file (`gsi-config.yaml` by default,
//! or the path in `GSI_CONFIG`; YAML or TOML by extension). Every value can
//! be overridden by a `GSI__`-prefixed environment variable whose path
//! segments are separated by `__`, e.g. `GSI__SERVER__PORT=3001`.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default config file path, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "gsi-config.yaml";

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "GSI_CONFIG";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "GSI";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or the merged values did not deserialize.
    #[error("failed to load config: {source}")]
    Load {
        /// The underlying loader error.
        #[from]
        source: config::ConfigError,
    },

    /// The configuration loaded but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GsiConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Acceptance filters applied before decoding.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Listener fan-out settings.
    #[serde(default)]
    pub listeners: ListenerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GsiConfig {
    /// Load configuration from the file named by `GSI_CONFIG` (or the
    /// default path), layered under environment overrides.
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH));
        Self::from_path(Path::new(&path))
    }

    /// Load configuration from `path`, layered under environment overrides.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse configuration from a YAML string, without environment overrides.
    pub fn parse_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?;
        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_connections == 0 {
            return Err(ConfigError::Invalid(String::from(
                "server.max_connections must be at least 1",
            )));
        }
        if self.server.read_timeout_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "server.read_timeout_secs must be at least 1",
            )));
        }
        if let Some(path) = self.filters.path.as_ref().filter(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "filters.path must start with '/', got {path:?}"
            )));
        }
        self.server.bind_address().map(|_| ())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to. `0` picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum connections served concurrently.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Socket read timeout per connection.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Serve the diagnostic page on GET.
    #[serde(default = "default_true")]
    pub diagnostics: bool,
}

impl ServerConfig {
    /// The socket address to bind.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            ConfigError::Invalid(format!("server.host {:?} is not an IP address: {e}", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Read timeout as a [`Duration`].
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            read_timeout_secs: default_read_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            diagnostics: true,
        }
    }
}

/// Acceptance filters. Each configured item becomes one predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FilterConfig {
    /// Only accept updates posted to exactly this path.
    #[serde(default)]
    pub path: Option<String>,

    /// Only accept updates from loopback addresses.
    #[serde(default)]
    pub loopback_only: bool,

    /// Only accept updates from these addresses. Empty disables the check.
    #[serde(default)]
    pub allowed_addresses: Vec<IpAddr>,

    /// Auth tokens every update must carry, by key.
    #[serde(default)]
    pub auth_tokens: BTreeMap<String, String>,
}

/// Listener fan-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    /// Hold the HTTP response until every listener has finished.
    #[serde(default = "default_true")]
    pub await_completion: bool,

    /// Deliveries slower than this log a warning.
    #[serde(default = "default_slow_listener_warn_ms")]
    pub slow_listener_warn_ms: u64,
}

impl ListenerConfig {
    /// Slow-delivery threshold as a [`Duration`].
    pub const fn slow_listener_warn(&self) -> Duration {
        Duration::from_millis(self.slow_listener_warn_ms)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            await_completion: true,
            slow_listener_warn_ms: default_slow_listener_warn_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> usize {
    16
}

const fn default_read_timeout_secs() -> u64 {
    10
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

const fn default_true() -> bool {
    true
}

const fn default_slow_listener_warn_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    String::from("info")
}
