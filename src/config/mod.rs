//! Application Configuration
//!
//! Pipeline settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::SearchConfig;
use crate::vision::{ClassifierConfig, GridSpec, PipelineConfig, UNKNOWN_PLACEHOLDER};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Text grid of the console
    pub grid: GridSpec,
    /// Cell classifier settings
    pub classifier: ClassifierConfig,
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// Training data settings
    pub training: TrainingSettings,
    /// Default search options
    pub search: SearchConfig,
}

/// Recognition-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Character written for unrecognized cells
    pub placeholder: char,
    /// Abort a recognition pass after this many milliseconds (0 = never)
    pub timeout_ms: u64,
    /// Classify cells on several threads
    pub parallel: bool,
    /// Worker threads (0 = one per core)
    pub workers: usize,
    /// Largest mask difference accepted by the nearest-match fallback (0.0 - 1.0)
    pub nearest_max_distance: f32,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            placeholder: UNKNOWN_PLACEHOLDER,
            timeout_ms: 0,
            parallel: false,
            workers: 0,
            nearest_max_distance: 0.1,
        }
    }
}

/// Training data settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Training corpus file; `None` uses the data directory
    pub data_file: Option<PathBuf>,
}

impl AppConfig {
    /// Pipeline configuration derived from these settings
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            classifier: self.classifier,
            placeholder: self.recognition.placeholder,
            parallel: self.recognition.parallel,
            workers: self.recognition.workers,
            timeout_ms: self.recognition.timeout_ms,
            nearest_max_distance: self.recognition.nearest_max_distance,
        }
    }

    /// Training corpus path, falling back to the data directory
    pub fn training_path(&self) -> Result<PathBuf> {
        match &self.training.data_file {
            Some(path) => Ok(path.clone()),
            None => crate::storage::default_training_path(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
