//! console-ocr - Text recognition for VM console screenshots
//!
//! Splits a screenshot into a character grid, reduces each cell to a
//! foreground mask, and looks the mask's fingerprint up in a trained corpus.
//! The resulting text can then be searched for automation triggers, newest
//! (bottom) lines first.
//!
//! Recognition is exact: a cell either matches a trained fingerprint or is
//! reported as [`UNKNOWN_PLACEHOLDER`]. Training and recognition must use the
//! same grid resolution, since fingerprints depend on cell size.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod error;
pub mod shared;
pub mod storage;
pub mod vision;

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub use analysis::{SearchConfig, SearchMatch, SearchMode, SearchResults};
pub use capture::ScreenFrame;
pub use config::AppConfig;
pub use error::{OcrError, Result};
pub use shared::SharedCorpus;
pub use storage::training::TrainingCorpus;
pub use vision::{
    CharacterBitmap, CropRect, GridSpec, OcrPipeline, OcrResult, PipelineConfig,
    UNKNOWN_PLACEHOLDER,
};

/// Install a global `tracing` subscriber for embedders without their own
///
/// `RUST_LOG` takes precedence over `level`. Returns false if a global
/// subscriber was already set.
pub fn init_logging(level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
