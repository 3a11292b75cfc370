// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::PathBuf;
use config::{Config, ConfigError, Environment, File};

/// Configuration for the offline asset cache
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory where cache generations are stored
    pub directory: PathBuf,
    /// Version tag embedded in the generation names; bumping it
    /// supersedes every existing generation on activation
    pub version: String,
    /// Origin all same-origin asset paths resolve against
    pub origin: String,
    /// Shell page served when a navigation fails offline
    pub shell: String,
    /// Ordered list of relative paths precached on install
    pub manifest: Vec<String>,
}

/// Configuration for the classification model
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Relative path of the model binary, resolved against the origin
    pub path: String,
}

/// Configuration for the class label registry
#[derive(Debug, Deserialize, Clone)]
pub struct LabelConfig {
    /// Relative path of the label file, resolved against the origin
    pub path: String,
}

/// Configuration for the realtime classification loop
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    /// Fixed cadence of the loop in milliseconds
    pub interval_ms: u64,
    /// Side length of the square model input in pixels
    pub input_size: usize,
    /// Number of ranked classes published per cycle
    pub top_k: usize,
}

/// Configuration for the inference runtime environment
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Whether the host grants shared-memory threading to the runtime;
    /// without it execution is forced onto a single thread
    pub shared_memory: bool,
}

/// Configuration for speech output
#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// Whether the top label is announced when it changes
    pub enabled: bool,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Optional log file path
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Asset-cache settings
    pub cache: CacheConfig,
    /// Model settings
    pub model: ModelConfig,
    /// Label-registry settings
    pub labels: LabelConfig,
    /// Realtime-loop settings
    pub realtime: RealtimeConfig,
    /// Runtime-environment settings
    pub runtime: RuntimeConfig,
    /// Speech settings
    pub speech: SpeechConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Implementation for loading and parsing configuration
impl Settings {
    /// Creates a new Settings instance by loading config from multiple sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with IRIS_
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn new() -> Result<Self, ConfigError> {
        // Check if current directory exists
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(
                format!("Failed to get current directory: {}", e)
            ))?
            .join("config");

        // Check if config directory exists
        if !config_dir.exists() {
            return Err(ConfigError::Message(
                format!("Config directory not found at: {}", config_dir.display())
            ));
        }

        // Check if default.toml exists
        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(
                format!("Default configuration file not found at: {}", default_config.display())
            ));
        }

        // Create the local config path
        let local_config = config_dir.join("local.toml");

        // Convert paths to strings and keep them alive
        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        // Load and validate configuration
        let settings = Config::builder()
            .add_source(File::with_name(&default_config_path))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(Environment::with_prefix("IRIS").separator("_"))
            .build()?
            .try_deserialize::<Settings>()?;

        // Validate settings after loading
        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        // Create the cache directory if it doesn't exist
        if !self.cache.directory.exists() {
            std::fs::create_dir_all(&self.cache.directory).map_err(|e| {
                ConfigError::Message(format!(
                    "Failed to create cache directory at {}: {}",
                    self.cache.directory.display(), e
                ))
            })?;
        }

        // The version tag names the active cache generations
        if self.cache.version.trim().is_empty() {
            return Err(ConfigError::Message(
                "cache.version must not be empty".to_string()
            ));
        }

        // The origin must be a valid absolute URL
        if let Err(e) = reqwest::Url::parse(&self.cache.origin) {
            return Err(ConfigError::Message(
                format!("cache.origin is not a valid URL: {}", e)
            ));
        }

        // The shell page is the offline navigation fallback
        if self.cache.shell.trim().is_empty() {
            return Err(ConfigError::Message(
                "cache.shell must not be empty".to_string()
            ));
        }

        // Validate loop cadence
        if self.realtime.interval_ms == 0 {
            return Err(ConfigError::Message(
                "realtime.interval_ms must be greater than 0".to_string()
            ));
        }

        // Validate model input size
        if self.realtime.input_size == 0 || self.realtime.input_size > 4096 {
            return Err(ConfigError::Message(
                format!("realtime.input_size must be between 1 and 4096, got: {}",
                    self.realtime.input_size)
            ));
        }

        // Validate ranking depth
        if self.realtime.top_k == 0 {
            return Err(ConfigError::Message(
                "realtime.top_k must be greater than 0".to_string()
            ));
        }

        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        // Create log file directory if configured and doesn't exist
        if let Some(log_file) = &self.logging.file {
            if let Some(parent) = log_file.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ConfigError::Message(format!(
                            "Failed to create log directory at {}: {}",
                            parent.display(), e
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }
}
