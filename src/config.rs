// ⚙️ Configuration
// bitjita-sync.toml → Config, every field defaulted

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "bitjita-sync.toml";
pub const API_BASE_ENV: &str = "BITJITA_API_BASE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub leveling: LevelingConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub referer: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: "https://bitjita.com/api".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referer: "https://bitjita.com".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelingConfig {
    pub max_level: u32,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        LevelingConfig {
            max_level: crate::leveling::DEFAULT_MAX_LEVEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    /// Optional skill list overriding the built-in one
    pub skills_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            database: PathBuf::from("bitjita.db"),
            skills_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid config file")
    }

    /// Load `path`, or `bitjita-sync.toml` when `path` is `None`.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                Self::from_toml_str(&content)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                let content = fs::read_to_string(DEFAULT_CONFIG_FILE)
                    .with_context(|| format!("Failed to read config: {}", DEFAULT_CONFIG_FILE))?;
                Self::from_toml_str(&content)?
            }
            None => Config::default(),
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.api.base_url = base.trim().to_string();
            }
        }
    }
}
