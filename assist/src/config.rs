use std::fs;
use std::path::Path;

use blockdoc::{MergeMode, MergeOptions};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "assist.toml";

/// Settings read from `assist.toml`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub default_mode: MergeMode,
    /// Search for the original text when a replace target was lost.
    pub search_fallback: bool,
    pub log_level: String,
}

impl Default for AssistConfig {
    fn default() -> Self {
        AssistConfig {
            default_mode: MergeMode::Replace,
            search_fallback: true,
            log_level: "warn".to_string(),
        }
    }
}

impl AssistConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// `assist.toml` in the working directory, or the defaults.
    pub fn discover() -> Result<Self, ConfigError> {
        Self::discover_in(Path::new("."))
    }

    pub fn discover_in(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(AssistConfig::default())
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            search_fallback: self.search_fallback,
        }
    }
}
