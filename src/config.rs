//! Engine configuration

use crate::error::{CognitionError, Result};
use crate::two_phase::RecallOptions;
use crate::weight::WeightConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the network file and the engram database
    pub data_dir: PathBuf,
    pub network_file: String,
    pub database_file: String,
    /// Persist the network after every remember and recall
    pub autosave: bool,
    pub weight: WeightConfig,
    /// Defaults for recall calls that pass no options
    pub recall: RecallOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./engram_data"),
            network_file: "network.json".to_string(),
            database_file: "engrams.db".to_string(),
            autosave: true,
            weight: WeightConfig::default(),
            recall: RecallOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Read a JSON config file; absent fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            CognitionError::Configuration(format!("Invalid config {}: {e}", path.display()))
        })
    }

    pub fn network_path(&self) -> PathBuf {
        self.data_dir.join(&self.network_file)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

/// Builder for engine config
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            config: EngineConfig::new(data_dir),
        }
    }

    pub fn autosave(mut self, enable: bool) -> Self {
        self.config.autosave = enable;
        self
    }

    pub fn weight(mut self, weight: WeightConfig) -> Self {
        self.config.weight = weight;
        self
    }

    pub fn recall(mut self, recall: RecallOptions) -> Self {
        self.config.recall = recall;
        self
    }

    pub fn network_file(mut self, name: impl Into<String>) -> Self {
        self.config.network_file = name.into();
        self
    }

    pub fn database_file(mut self, name: impl Into<String>) -> Self {
        self.config.database_file = name.into();
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
