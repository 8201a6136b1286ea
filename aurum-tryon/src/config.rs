//! Application configuration
//!
//! Loaded from a JSON file. Every field has a default, so a partial file
//! (or none at all) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::autotry::AutoTryConfig;
use crate::catalog::{Catalog, Category};
use crate::compositor::OverlayConfig;
use crate::gesture::GestureConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_catalog() -> Vec<Category> {
    Catalog::default().categories().to_vec()
}

fn default_background_loading() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding `<category>/<n>.png`
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    #[serde(default = "default_catalog")]
    pub catalog: Vec<Category>,

    #[serde(default)]
    pub gesture: GestureConfig,

    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub auto_try: AutoTryConfig,

    /// Decode catalog images on a worker thread
    #[serde(default = "default_background_loading")]
    pub background_asset_loading: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            catalog: default_catalog(),
            gesture: GestureConfig::default(),
            overlay: OverlayConfig::default(),
            auto_try: AutoTryConfig::default(),
            background_asset_loading: default_background_loading(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.catalog.clone())
    }
}
