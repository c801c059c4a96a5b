//! Tether Configuration System
//!
//! Provides configuration for embedding hosts of the tether bridge:
//! - Runtime limits (call depth)
//! - State pool sizing
//! - Conversion limits
//! - Logging filter and output format
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Global config (~/.tether/config.toml)
//! 2. Project config (./tether.toml)
//! 3. Environment variables (TETHER_*)
//!
//! # Example
//!
//! ```no_run
//! use tether_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("call depth limit: {}", config.bridge.runtime().call_depth_limit());
//! ```

pub mod bridge;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the project-level configuration file
pub const CONFIG_FILE_NAME: &str = "tether.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use bridge::{
    BridgeConfig, ConversionConfig, LogFormat, LoggingConfig, PoolConfig, RuntimeConfig,
};
pub use loader::{ConfigLoader, LoadedConfig};
