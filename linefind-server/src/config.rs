//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via LINEFIND_CONFIG)
//! 3. Environment variables
//!
//! An environment variable that is set but cannot be parsed is an error,
//! not a silent fallback.
//!
//! [`Config::validate`] must pass before the server is started.

use crate::lines::LoadMode;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Source file configuration.
    pub search: SearchConfig,
    /// TLS configuration.
    pub tls: TlsConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("LINEFIND_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(&process_env)?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(&process_env)?;
        Ok(config)
    }

    /// Applies `LINEFIND_*` overrides looked up through `env`.
    pub fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        self.network.apply_env_overrides(env)?;
        self.search.apply_env_overrides(env)?;
        self.tls.apply_env_overrides(env)?;
        self.metrics.apply_env_overrides(env)?;
        self.logging.apply_env_overrides(env);
        Ok(())
    }

    /// Checks every section. A failure here is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.search.validate()?;
        self.tls.validate()?;
        Ok(())
    }
}

/// Resolves an environment variable name to its value, if set.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_value<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("invalid {}={:?}: {}", name, value, e)))
}

fn env_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::ValidationError(format!(
            "invalid {}={:?}: expected true/false, yes/no or 1/0",
            name, value
        ))),
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Listen backlog: how many not-yet-accepted connections the OS queues.
    pub max_connections: u32,
    /// Per-connection read/write deadline in seconds (0 = only data
    /// already received is accepted).
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], linefind_protocol::DEFAULT_PORT)),
            max_connections: 128,
            timeout_secs: 5,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(addr) = env("LINEFIND_BIND") {
            self.bind_addr = env_value("LINEFIND_BIND", &addr)?;
        }
        if let Some(max) = env("LINEFIND_MAX_CONNECTIONS") {
            self.max_connections = env_value("LINEFIND_MAX_CONNECTIONS", &max)?;
        }
        if let Some(timeout) = env("LINEFIND_TIMEOUT") {
            self.timeout_secs = env_value("LINEFIND_TIMEOUT", &timeout)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the per-step connection deadline.
    ///
    /// Zero is a real deadline: a step that cannot complete on its first
    /// poll fails at once.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Source file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// File whose lines are matched against queries.
    #[serde(alias = "linuxpath")]
    pub path: PathBuf,
    /// Reread the file on every query instead of caching it once.
    pub reread_on_query: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/lines.txt"),
            reread_on_query: true,
        }
    }
}

impl SearchConfig {
    fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(path) = env("LINEFIND_PATH") {
            self.path = PathBuf::from(path);
        }
        if let Some(reread) = env("LINEFIND_REREAD_ON_QUERY") {
            self.reread_on_query = env_flag("LINEFIND_REREAD_ON_QUERY", &reread)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "search.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the lookup strategy selected by `reread_on_query`.
    pub fn load_mode(&self) -> LoadMode {
        if self.reread_on_query {
            LoadMode::Reread
        } else {
            LoadMode::Cached
        }
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Enable TLS.
    pub enabled: bool,
    /// Path to PEM-encoded server certificate chain.
    pub cert_path: Option<PathBuf>,
    /// Path to PEM-encoded private key.
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(enabled) = env("LINEFIND_TLS_ENABLED") {
            self.enabled = env_flag("LINEFIND_TLS_ENABLED", &enabled)?;
        }
        if let Some(path) = env("LINEFIND_TLS_CERT") {
            self.cert_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env("LINEFIND_TLS_KEY") {
            self.key_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Validates TLS configuration.
    ///
    /// When TLS is enabled both files must be set and readable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }

        let cert_path = self.cert_path.as_ref().ok_or_else(|| {
            ConfigError::ValidationError("TLS enabled but cert_path not set".to_string())
        })?;
        let key_path = self.key_path.as_ref().ok_or_else(|| {
            ConfigError::ValidationError("TLS enabled but key_path not set".to_string())
        })?;

        for path in [cert_path, key_path] {
            File::open(path).map_err(|e| ConfigError::IoError(path.clone(), e))?;
        }

        Ok(())
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics HTTP server.
    pub enabled: bool,
    /// Address to bind the metrics server to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

impl MetricsConfig {
    fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(enabled) = env("LINEFIND_METRICS_ENABLED") {
            self.enabled = env_flag("LINEFIND_METRICS_ENABLED", &enabled)?;
        }
        if let Some(addr) = env("LINEFIND_METRICS_BIND") {
            self.bind_addr = env_value("LINEFIND_METRICS_BIND", &addr)?;
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, used when RUST_LOG is unset.
    pub level: String,
    /// Append log records to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn apply_env_overrides(&mut self, env: EnvLookup<'_>) {
        if let Some(level) = env("LINEFIND_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(path) = env("LINEFIND_LOG_FILE") {
            self.file = Some(PathBuf::from(path));
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde helpers so addresses read as plain strings in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(addr)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
