//! Storage Layer
//!
//! Handles persistence of training data and locating the default data directory.

pub mod training;

use anyhow::Result;
use std::path::PathBuf;

/// File name of the default training corpus
pub const TRAINING_FILE_NAME: &str = "training.json";

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "consoleocr", "ConsoleOcr")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the application data directory
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&data_dir)?;

    Ok(data_dir)
}

/// Default location of the training corpus
pub fn default_training_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(TRAINING_FILE_NAME))
}
