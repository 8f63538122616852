use crate::domain::{config::AppConfig, error::{TermError, TermResult}};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the per-user configuration file
    pub fn new() -> TermResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    /// Manager for an explicit configuration file
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Load the configuration, falling back to defaults when the file is missing
    pub fn load_config(&self) -> TermResult<AppConfig> {
        if !self.config_path.exists() {
            debug!("No config file at {}, using defaults", self.config_path.display());
            return Ok(AppConfig::default());
        }
        self.load_config_from_path(&self.config_path)
    }

    /// Save the configuration, creating parent directories as needed
    pub fn save_config(&self, config: &AppConfig) -> TermResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TermError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }
        self.save_config_to_path(&self.config_path, config)
    }

    /// Write a default configuration file unless one already exists
    pub fn init_config(&self) -> TermResult<()> {
        if self.config_path.exists() {
            return Err(TermError::Config {
                message: format!("Configuration already exists at {}", self.config_path.display()),
            });
        }
        self.save_config(&AppConfig::default())
    }

    fn default_config_path() -> TermResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| TermError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("rs232term").join("config.toml"))
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> TermResult<AppConfig> {
        let content = fs::read_to_string(path).map_err(|e| TermError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| TermError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &AppConfig) -> TermResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| TermError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| TermError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
