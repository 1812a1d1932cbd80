//! Run configuration loaded from TOML or YAML
//!
//! Every field has a default, so an empty file (or no file at all) selects
//! the `storm-posts` preset with default engine settings. CLI flags are
//! applied on top of whatever was loaded.

mod engine;
mod query;

pub use engine::EngineConfig;
pub use query::{CompiledQuery, Preset, QueryConfig, DEFAULT_PRESET, PRESETS};

use crate::error::{EngineError, ErrorCode, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Post dump to read; `-` reads standard input
    pub input: Option<PathBuf>,
    pub query: QueryConfig,
    pub engine: EngineConfig,
}

impl AnalyticsConfig {
    /// Load a config file, picking the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            let code = match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::CONFIG_NOT_FOUND,
                _ => ErrorCode::CONFIG_GENERIC,
            };
            EngineError::config_with_code(
                code,
                format!("cannot read config file {}", path.display()),
                None,
            )
            .with_source(e)
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            _ => {
                return Err(EngineError::config_with_code(
                    ErrorCode::CONFIG_UNSUPPORTED_FORMAT,
                    format!(
                        "unsupported config format for {} (expected .toml, .yaml or .yml)",
                        path.display()
                    ),
                    None,
                ))
            }
        };

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            EngineError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, e.to_string(), None)
                .with_source(e)
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            EngineError::config_with_code(ErrorCode::CONFIG_INVALID_YAML, e.to_string(), None)
                .with_source(e)
        })
    }

    /// Check engine settings and that the query compiles
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.query.compile()?;
        Ok(())
    }
}
