//! Error taxonomy for the recognition pipeline
//!
//! Every failure the pipeline can report maps onto one variant here, and
//! every variant maps onto one of the process exit codes that calling
//! tooling depends on.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code: at least one match was found
pub const EXIT_MATCH: i32 = 0;
/// Exit code: the search ran but found nothing
pub const EXIT_NO_MATCH: i32 = 1;
/// Exit code: decoding, recognition or training data failed
pub const EXIT_PROCESSING_ERROR: i32 = 2;
/// Exit code: the search pattern did not compile
pub const EXIT_INVALID_PATTERN: i32 = 3;

/// Errors produced by the recognition pipeline
#[derive(Error, Debug)]
pub enum OcrError {
    /// Image bytes could not be decoded by any supported decoder
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// Requested grid is finer than the image
    #[error("Invalid grid {columns}x{rows} for {width}x{height} image: cell size would be {cell_width}x{cell_height}")]
    InvalidGrid {
        columns: u32,
        rows: u32,
        width: u32,
        height: u32,
        cell_width: u32,
        cell_height: u32,
    },

    /// Crop rectangle is out of bounds, inverted or empty
    #[error("Invalid crop range: {0}")]
    CropRange(String),

    /// Training data file could not be read, written or parsed
    #[error("Training data I/O error on {path:?}: {message}")]
    TrainingDataIo { path: PathBuf, message: String },

    /// Recognizer was handed an empty corpus
    #[error("No training data available")]
    NoTrainingData,

    /// Training extraction did not map a single character
    #[error("Training extraction mapped zero characters")]
    ZeroCharactersMapped,

    /// Search pattern failed to compile
    #[error("Invalid regex pattern {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },

    /// Recognition did not finish before its deadline
    #[error("Recognition timed out after {0} ms")]
    Timeout(u64),

    /// Recognition was cancelled by its caller
    #[error("Recognition cancelled")]
    Cancelled,

    /// Background worker could not be started or died
    #[error("Worker thread failed: {0}")]
    Worker(String),
}

impl OcrError {
    pub(crate) fn training_io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::TrainingDataIo {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            OcrError::InvalidRegex { .. } => EXIT_INVALID_PATTERN,
            _ => EXIT_PROCESSING_ERROR,
        }
    }

    /// Whether the pipeline can continue with a degraded result
    ///
    /// Only a missing corpus is soft: recognition still fills every cell
    /// with the placeholder so search can run.
    pub fn is_soft(&self) -> bool {
        matches!(self, OcrError::NoTrainingData)
    }
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, OcrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let regex_err = OcrError::InvalidRegex {
            pattern: "(".to_string(),
            message: "unclosed group".to_string(),
        };
        assert_eq!(regex_err.exit_code(), EXIT_INVALID_PATTERN);
        assert_eq!(OcrError::NoTrainingData.exit_code(), EXIT_PROCESSING_ERROR);
        assert_eq!(OcrError::ImageDecode("bad".into()).exit_code(), EXIT_PROCESSING_ERROR);
        assert_eq!(OcrError::Timeout(10).exit_code(), EXIT_PROCESSING_ERROR);
    }

    #[test]
    fn test_soft_errors() {
        assert!(OcrError::NoTrainingData.is_soft());
        assert!(!OcrError::ZeroCharactersMapped.is_soft());
        assert!(!OcrError::CropRange("x".into()).is_soft());
    }

    #[test]
    fn test_error_messages() {
        let err = OcrError::InvalidGrid {
            columns: 100,
            rows: 10,
            width: 50,
            height: 50,
            cell_width: 0,
            cell_height: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("100x10"));
        assert!(msg.contains("50x50"));
    }
}
