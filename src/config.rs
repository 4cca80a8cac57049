//! Configuration management for chatwire.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::Args;

/// Default credential folder, relative to the working directory.
pub const DEFAULT_AUTH_FOLDER: &str = "auth_info";

/// Default domain suffix for individual addresses.
pub const DEFAULT_ADDRESS_SUFFIX: &str = "s.whatsapp.net";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential storage configuration.
    pub auth: AuthSection,
    /// Protocol addressing configuration.
    pub protocol: ProtocolSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Credential storage section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Folder the credential store reads and rewrites.
    pub folder: PathBuf,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_AUTH_FOLDER),
        }
    }
}

/// Protocol addressing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolSection {
    /// Suffix appended to outbound addresses, stripped from inbound ones.
    pub address_suffix: String,
}

impl Default for ProtocolSection {
    fn default() -> Self {
        Self {
            address_suffix: DEFAULT_ADDRESS_SUFFIX.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("CHATWIRE_AUTH_DIR") {
            if !dir.is_empty() {
                self.auth.folder = PathBuf::from(dir);
            }
        }

        if let Ok(suffix) = std::env::var("CHATWIRE_ADDRESS_SUFFIX") {
            if !suffix.is_empty() {
                self.protocol.address_suffix = suffix;
            }
        }

        if let Ok(level) = std::env::var("CHATWIRE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.auth_dir {
            self.auth.folder = dir.clone();
        }

        if let Some(ref suffix) = args.address_suffix {
            self.protocol.address_suffix = suffix.clone();
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let suffix = self.address_suffix();
        if suffix.is_empty() || suffix.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidSuffix(
                self.protocol.address_suffix.clone(),
            ));
        }
        Ok(())
    }

    /// Address suffix without any leading `@`.
    pub fn address_suffix(&self) -> &str {
        self.protocol.address_suffix.trim().trim_start_matches('@')
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Address suffix is empty or malformed.
    InvalidSuffix(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidSuffix(suffix) => write!(f, "invalid address suffix: '{}'", suffix),
        }
    }
}

impl std::error::Error for ConfigError {}
