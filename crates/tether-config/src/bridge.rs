//! Bridge Configuration (tether.toml)
//!
//! One file format serves both the project file and the user-level file in
//! `~/.tether/config.toml`. Every field is optional; accessors fall back to
//! the defaults documented on each section.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default maximum number of nested calls on one runtime state
pub const DEFAULT_CALL_DEPTH_LIMIT: usize = 200;

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level configuration from tether.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Runtime state settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeConfig>,

    /// State pool settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolConfig>,

    /// Value conversion settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionConfig>,

    /// Logging settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Runtime state settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum nested call depth (default: 200)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_depth_limit: Option<usize>,
}

/// State pool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum number of idle states kept for reuse (default: unbounded)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle: Option<usize>,
}

/// Value conversion settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConversionConfig {
    /// Maximum nesting depth for table conversion (default: unbounded)
    ///
    /// Setting this changes behaviour on self-referential tables from
    /// non-termination to a conversion error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directives, e.g. "tether_runtime=debug" (default: "info")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Output format (default: pretty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// Structured JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("must be 'pretty', 'compact', or 'json', got '{}'", other),
            }),
        }
    }
}

impl RuntimeConfig {
    /// Effective call depth limit
    pub fn call_depth_limit(&self) -> usize {
        self.call_depth_limit.unwrap_or(DEFAULT_CALL_DEPTH_LIMIT)
    }
}

impl PoolConfig {
    /// Effective idle limit (`None` keeps every released state)
    pub fn max_idle(&self) -> Option<usize> {
        self.max_idle
    }
}

impl ConversionConfig {
    /// Effective nesting limit (`None` is unbounded)
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

impl LoggingConfig {
    /// Effective filter directives
    pub fn filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Effective output format
    pub fn format(&self) -> LogFormat {
        self.format.unwrap_or_default()
    }
}

impl BridgeConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content, path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(runtime) = &self.runtime {
            if runtime.call_depth_limit == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "runtime.call_depth_limit".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if let Some(conversion) = &self.conversion {
            if conversion.max_depth == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: "conversion.max_depth".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if let Some(logging) = &self.logging {
            if let Some(filter) = &logging.filter {
                if filter.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "logging.filter".to_string(),
                        reason: "must not be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get the global config file path (~/.tether/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".tether").join("config.toml"))
    }

    /// Runtime section, or defaults
    pub fn runtime(&self) -> RuntimeConfig {
        self.runtime.clone().unwrap_or_default()
    }

    /// Pool section, or defaults
    pub fn pool(&self) -> PoolConfig {
        self.pool.clone().unwrap_or_default()
    }

    /// Conversion section, or defaults
    pub fn conversion(&self) -> ConversionConfig {
        self.conversion.clone().unwrap_or_default()
    }

    /// Logging section, or defaults
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Merge another config into this one
    /// Other config takes precedence for each field it sets
    pub fn merge(&mut self, other: &BridgeConfig) {
        if let Some(runtime) = &other.runtime {
            let target = self.runtime.get_or_insert_with(Default::default);
            if runtime.call_depth_limit.is_some() {
                target.call_depth_limit = runtime.call_depth_limit;
            }
        }
        if let Some(pool) = &other.pool {
            let target = self.pool.get_or_insert_with(Default::default);
            if pool.max_idle.is_some() {
                target.max_idle = pool.max_idle;
            }
        }
        if let Some(conversion) = &other.conversion {
            let target = self.conversion.get_or_insert_with(Default::default);
            if conversion.max_depth.is_some() {
                target.max_depth = conversion.max_depth;
            }
        }
        if let Some(logging) = &other.logging {
            let target = self.logging.get_or_insert_with(Default::default);
            if logging.filter.is_some() {
                target.filter = logging.filter.clone();
            }
            if logging.format.is_some() {
                target.format = logging.format;
            }
        }
    }
}
