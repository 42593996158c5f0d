use homekeep_core::CoordinatorSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTHORITY_URL: &str = "http://localhost:8080";
pub const DEFAULT_SESSION_PROBE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_RECONCILE_TIMEOUT_MS: u64 = 10000;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Base URL of the identity service
    pub authority_url: ConfigValue<String>,
    /// Directory holding the identity cache and session token
    pub data_dir: ConfigValue<PathBuf>,
    /// Ceiling for a single session probe, in milliseconds
    pub session_probe_timeout_ms: ConfigValue<u64>,
    /// Ceiling for a whole reconciliation, in milliseconds
    pub reconcile_timeout_ms: ConfigValue<u64>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    authority_url: Option<String>,
    data_dir: Option<PathBuf>,
    session_probe_timeout_ms: Option<u64>,
    reconcile_timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], reading environment variables through `env`.
    pub fn load_with_env<F>(config_path: Option<PathBuf>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut authority_url =
            ConfigValue::new(DEFAULT_AUTHORITY_URL.to_string(), ConfigSource::Default);
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut session_probe_timeout_ms =
            ConfigValue::new(DEFAULT_SESSION_PROBE_TIMEOUT_MS, ConfigSource::Default);
        let mut reconcile_timeout_ms =
            ConfigValue::new(DEFAULT_RECONCILE_TIMEOUT_MS, ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(url) = file_config.authority_url {
                authority_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(ms) = file_config.session_probe_timeout_ms {
                session_probe_timeout_ms = ConfigValue::new(ms, ConfigSource::File);
            }
            if let Some(ms) = file_config.reconcile_timeout_ms {
                reconcile_timeout_ms = ConfigValue::new(ms, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Some(url) = env("HOMEKEEP_AUTHORITY_URL") {
            authority_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Some(dir) = env("HOMEKEEP_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Some(ms) = env("HOMEKEEP_SESSION_PROBE_TIMEOUT_MS") {
            session_probe_timeout_ms = ConfigValue::new(
                parse_millis("HOMEKEEP_SESSION_PROBE_TIMEOUT_MS", &ms)?,
                ConfigSource::Environment,
            );
        }
        if let Some(ms) = env("HOMEKEEP_RECONCILE_TIMEOUT_MS") {
            reconcile_timeout_ms = ConfigValue::new(
                parse_millis("HOMEKEEP_RECONCILE_TIMEOUT_MS", &ms)?,
                ConfigSource::Environment,
            );
        }

        Ok(Self {
            authority_url,
            data_dir,
            session_probe_timeout_ms,
            reconcile_timeout_ms,
            config_file,
        })
    }

    /// Timeouts handed to the session coordinator.
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::new(
            Duration::from_millis(self.session_probe_timeout_ms.value),
            Duration::from_millis(self.reconcile_timeout_ms.value),
        )
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/homekeep/
    /// - macOS: ~/Library/Application Support/homekeep/
    /// - Windows: %APPDATA%/homekeep/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("homekeep")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/homekeep/
    /// - macOS: ~/Library/Application Support/homekeep/
    /// - Windows: %APPDATA%/homekeep/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("homekeep")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(key, value) => {
                write!(f, "Invalid value for {}: '{}' (expected milliseconds)", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load_with_env(Some(config_path), no_env).unwrap();
        assert_eq!(config.authority_url.value, DEFAULT_AUTHORITY_URL);
        assert_eq!(config.authority_url.source, ConfigSource::Default);
        assert!(config.data_dir.value.ends_with("homekeep"));
        assert_eq!(config.session_probe_timeout_ms.value, 2000);
        assert_eq!(config.reconcile_timeout_ms.value, 10000);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "authority_url: https://id.example.com").unwrap();
        writeln!(file, "data_dir: /custom/homekeep").unwrap();
        writeln!(file, "session_probe_timeout_ms: 500").unwrap();

        let config = Config::load_with_env(Some(config_path.clone()), no_env).unwrap();
        assert_eq!(config.authority_url.value, "https://id.example.com");
        assert_eq!(config.authority_url.source, ConfigSource::File);
        assert_eq!(config.data_dir.value, PathBuf::from("/custom/homekeep"));
        assert_eq!(config.session_probe_timeout_ms.value, 500);
        assert_eq!(config.session_probe_timeout_ms.source, ConfigSource::File);
        assert_eq!(config.reconcile_timeout_ms.source, ConfigSource::Default);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_data_dir_resolves_against_config_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "data_dir: state\n").unwrap();

        let config = Config::load_with_env(Some(config_path), no_env).unwrap();
        assert_eq!(config.data_dir.value, temp_dir.path().join("state"));
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "authority_url: https://from.file\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("HOMEKEEP_AUTHORITY_URL", "https://from.env"),
            ("HOMEKEEP_RECONCILE_TIMEOUT_MS", "2500"),
        ]);
        let config = Config::load_with_env(Some(config_path), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.authority_url.value, "https://from.env");
        assert_eq!(config.authority_url.source, ConfigSource::Environment);
        assert_eq!(config.reconcile_timeout_ms.value, 2500);
        assert_eq!(config.reconcile_timeout_ms.source, ConfigSource::Environment);
    }

    #[test]
    fn test_invalid_timeout_env_var() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let result = Config::load_with_env(Some(config_path), |key| {
            (key == "HOMEKEEP_SESSION_PROBE_TIMEOUT_MS").then(|| "soon".to_string())
        });

        let err = result.unwrap_err();
        assert!(err.to_string().contains("HOMEKEEP_SESSION_PROBE_TIMEOUT_MS"));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load_with_env(Some(config_path), no_env);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_coordinator_settings() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "session_probe_timeout_ms: 750\nreconcile_timeout_ms: 3000\n",
        )
        .unwrap();

        let settings = Config::load_with_env(Some(config_path), no_env)
            .unwrap()
            .coordinator_settings();
        assert_eq!(settings.session_probe_timeout, Duration::from_millis(750));
        assert_eq!(settings.reconcile_timeout, Duration::from_secs(3));
    }
}
