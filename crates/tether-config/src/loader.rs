//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::bridge::{BridgeConfig, LogFormat};
use crate::{ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::env;
use std::path::{Path, PathBuf};

/// Tracing filter override
pub const ENV_LOG: &str = "TETHER_LOG";
/// Log format override
pub const ENV_LOG_FORMAT: &str = "TETHER_LOG_FORMAT";
/// Pool idle limit override
pub const ENV_POOL_MAX_IDLE: &str = "TETHER_POOL_MAX_IDLE";
/// Call depth limit override
pub const ENV_CALL_DEPTH: &str = "TETHER_CALL_DEPTH";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.tether/config.toml) - lowest priority
/// 2. Project config (./tether.toml) - overrides global
/// 3. Environment variables (TETHER_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Effective bridge configuration
    pub bridge: BridgeConfig,

    /// Directory where tether.toml was found
    pub config_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.tether/config.toml
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find tether.toml, merges it over the
    /// global config if one exists, then applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<LoadedConfig> {
        let (config_root, project) = self.find_project_config(start_dir)?;

        let mut bridge = self.load_global_config()?;
        bridge.merge(&project);

        let bridge = self.apply_env_overrides(bridge)?;
        bridge.validate()?;

        Ok(LoadedConfig {
            bridge,
            config_root,
        })
    }

    /// Load configuration from a specific config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<LoadedConfig> {
        let project = BridgeConfig::load_from_file(config_path)?;

        let mut bridge = self.load_global_config()?;
        bridge.merge(&project);

        let bridge = self.apply_env_overrides(bridge)?;
        bridge.validate()?;

        Ok(LoadedConfig {
            bridge,
            config_root: config_path.parent().map(|p| p.to_path_buf()),
        })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, BridgeConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let config = BridgeConfig::load_from_file(&config_path)?;
                return Ok((Some(current), config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, BridgeConfig::default())),
            }
        }
    }

    /// Load global configuration, defaulting when absent
    fn load_global_config(&mut self) -> ConfigResult<BridgeConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match BridgeConfig::global_config_path() {
                Ok(path) => {
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory means no global config
                Err(ConfigError::HomeNotFound) => return Ok(BridgeConfig::default()),
                Err(e) => return Err(e),
            },
        };

        if !path.exists() {
            return Ok(BridgeConfig::default());
        }

        BridgeConfig::load_from_file(&path)
    }

    /// Apply TETHER_* environment variable overrides
    fn apply_env_overrides(&self, mut config: BridgeConfig) -> ConfigResult<BridgeConfig> {
        if let Ok(filter) = env::var(ENV_LOG) {
            config.logging.get_or_insert_with(Default::default).filter = Some(filter);
        }

        if let Ok(format) = env::var(ENV_LOG_FORMAT) {
            let format: LogFormat = format.parse()?;
            config.logging.get_or_insert_with(Default::default).format = Some(format);
        }

        if let Ok(max_idle) = env::var(ENV_POOL_MAX_IDLE) {
            let max_idle = parse_usize(ENV_POOL_MAX_IDLE, &max_idle)?;
            config.pool.get_or_insert_with(Default::default).max_idle = Some(max_idle);
        }

        if let Ok(depth) = env::var(ENV_CALL_DEPTH) {
            let depth = parse_usize(ENV_CALL_DEPTH, &depth)?;
            config
                .runtime
                .get_or_insert_with(Default::default)
                .call_depth_limit = Some(depth);
        }

        Ok(config)
    }
}

fn parse_usize(field: &str, raw: &str) -> ConfigResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a non-negative integer, got '{}'", raw),
        })
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadedConfig {
    /// Get the directory holding tether.toml
    pub fn config_root(&self) -> Option<&Path> {
        self.config_root.as_deref()
    }

    /// Check whether a tether.toml was found
    pub fn has_project_file(&self) -> bool {
        self.config_root.is_some()
    }
}
