//! Configuration loading for assist-bridge.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const CONFIG_FILE: &str = "assist.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistConfig {
    /// Search depths, analysed in order for every new position.
    #[serde(default = "default_depths")]
    pub depths: Vec<u32>,
    /// Quiet period after the last board change before analysis starts.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Program and arguments, split on whitespace.
    #[serde(default = "default_engine_command")]
    pub command: String,
}

fn default_depths() -> Vec<u32> {
    vec![8, 12, 15, 20]
}

fn default_debounce_ms() -> u64 {
    600
}

fn default_engine_command() -> String {
    "stockfish".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
        }
    }
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            depths: default_depths(),
            debounce_ms: default_debounce_ms(),
            engine: EngineConfig::default(),
        }
    }
}

impl AssistConfig {
    /// Loads `explicit` if given, otherwise the first `assist.toml` found in
    /// the current directory or its parents, otherwise the defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path).await;
        }

        let paths = ["assist.toml", "../assist.toml", "../../assist.toml"];
        for path in paths {
            let path = Path::new(path);
            if path.exists() {
                return Self::load_from(path).await;
            }
        }

        info!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config: AssistConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depths.is_empty() {
            return Err(ConfigError::Invalid("depths must not be empty".to_string()));
        }
        if self.depths.contains(&0) {
            return Err(ConfigError::Invalid("depths must be positive".to_string()));
        }
        if self.engine.command.trim().is_empty() {
            return Err(ConfigError::Invalid("engine command is empty".to_string()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
