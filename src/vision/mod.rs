//! Vision Layer
//!
//! Turns a decoded screenshot into a text grid:
//! - `grid` partitions the image into character cells
//! - `bitmap` classifies each cell's pixels against its background color
//! - `fingerprint` encodes each cell mask as a lookup key
//! - `recognizer` maps keys to characters through the training corpus
//!
//! Every stage is a pure function of its inputs. Cell classification may run
//! on several threads and is cancellable at cell granularity.

pub mod bitmap;
pub mod cancel;
pub mod fingerprint;
pub mod grid;
pub mod recognizer;

use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::capture::frame::ScreenFrame;
use crate::error::{OcrError, Result};
use crate::shared::SharedCorpus;
use crate::storage::training::TrainingCorpus;

pub use bitmap::{CharacterBitmap, ClassifierConfig, TieBreak};
pub use cancel::{run_with_timeout, CancelToken};
pub use fingerprint::fingerprint;
pub use grid::{CellLayout, CropRect, GridSpec};
pub use recognizer::{OcrResult, RecognitionStats, Recognizer, UNKNOWN_PLACEHOLDER};

/// Configuration for the recognition pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-cell foreground classification
    pub classifier: ClassifierConfig,
    /// Character written for unmatched cells
    pub placeholder: char,
    /// Classify cells on several threads
    pub parallel: bool,
    /// Worker threads when parallel (0 = available parallelism)
    pub workers: usize,
    /// Abort a pass after this long (0 = no limit)
    pub timeout_ms: u64,
    /// Largest mask difference accepted by the nearest-match fallback (0.0 - 1.0)
    pub nearest_max_distance: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            placeholder: UNKNOWN_PLACEHOLDER,
            parallel: false,
            workers: 0,
            timeout_ms: 0,
            nearest_max_distance: 0.1,
        }
    }
}

/// Screenshot to text pipeline
#[derive(Debug, Clone, Default)]
pub struct OcrPipeline {
    config: PipelineConfig,
}

impl OcrPipeline {
    /// Create a new pipeline with default configuration
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a new pipeline with custom configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn recognizer(&self) -> Recognizer {
        Recognizer::with_placeholder(self.config.placeholder)
    }

    fn worker_count(&self) -> usize {
        if self.config.workers > 0 {
            return self.config.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Partition the frame and classify every cell; text stays empty
    ///
    /// Grid and crop are validated before any pixel is read.
    pub fn extract(
        &self,
        frame: &ScreenFrame,
        grid: GridSpec,
        crop: Option<CropRect>,
        token: &CancelToken,
    ) -> Result<OcrResult> {
        let start = Instant::now();
        let layout = CellLayout::new(frame.width, frame.height, grid, crop)?;
        debug!(
            "Grid {}x{} over {}x{} image: {}x{} px cells, {} cells selected",
            grid.columns,
            grid.rows,
            frame.width,
            frame.height,
            layout.cell_width,
            layout.cell_height,
            layout.cell_count()
        );

        let cells = self.classify_cells(&frame.image, &layout, token)?;

        debug!("Classified {} cells in {:?}", cells.len(), start.elapsed());
        Ok(OcrResult::new(layout.columns, layout.rows, cells))
    }

    /// `extract` on a worker thread, bounded by the configured timeout
    ///
    /// A timed-out extraction is cancelled and joined before returning.
    pub fn extract_with_timeout(
        &self,
        frame: Arc<ScreenFrame>,
        grid: GridSpec,
        crop: Option<CropRect>,
    ) -> Result<OcrResult> {
        let pipeline = self.clone();
        self.bounded(move |token| pipeline.extract(&frame, grid, crop, &token))
    }

    /// Run `job` under the configured timeout, or inline when there is none
    fn bounded<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(CancelToken) -> Result<T> + Send + 'static,
    {
        if self.config.timeout_ms == 0 {
            return job(CancelToken::new());
        }
        run_with_timeout(Duration::from_millis(self.config.timeout_ms), job)
    }

    /// Fill in text by exact lookup; see `Recognizer::recognize`
    pub fn recognize(
        &self,
        result: &mut OcrResult,
        corpus: &TrainingCorpus,
    ) -> Result<RecognitionStats> {
        self.recognizer().recognize(result, corpus)
    }

    /// Opt-in nearest-mask fallback for cells still unknown
    ///
    /// Accepts candidates within the configured `nearest_max_distance`.
    pub fn recognize_nearest(&self, result: &mut OcrResult, corpus: &TrainingCorpus) -> usize {
        self.recognizer()
            .recognize_nearest(result, corpus, self.config.nearest_max_distance)
    }

    /// Full pass: extract, then recognize against the shared corpus
    ///
    /// Extraction and recognition run together under the configured timeout.
    /// A missing corpus is logged and tolerated: the result comes back with
    /// every cell set to the placeholder.
    pub fn process(
        &self,
        frame: Arc<ScreenFrame>,
        grid: GridSpec,
        crop: Option<CropRect>,
        corpus: &SharedCorpus,
    ) -> Result<OcrResult> {
        let pipeline = self.clone();
        let corpus = corpus.clone();
        self.bounded(move |token| pipeline.process_pass(&frame, grid, crop, &corpus, &token))
    }

    fn process_pass(
        &self,
        frame: &ScreenFrame,
        grid: GridSpec,
        crop: Option<CropRect>,
        corpus: &SharedCorpus,
        token: &CancelToken,
    ) -> Result<OcrResult> {
        let mut result = self.extract(frame, grid, crop, token)?;

        let recognized = self
            .recognizer()
            .recognize_cancellable(&mut result, &corpus.read(), token);
        match recognized {
            Ok(stats) => {
                info!(
                    "Recognized {}x{} grid: {} known, {} unknown",
                    result.width, result.height, stats.recognized, stats.unknown
                );
            }
            Err(e) if e.is_soft() => {
                warn!("{}; returning placeholder text", e);
            }
            Err(e) => return Err(e),
        }

        Ok(result)
    }

    /// Learn fingerprints from a screen whose text is known
    ///
    /// Holds the corpus write lock for the whole extraction.
    pub fn train(
        &self,
        frame: &ScreenFrame,
        grid: GridSpec,
        crop: Option<CropRect>,
        known_chars: &str,
        corpus: &SharedCorpus,
    ) -> Result<usize> {
        let result = self.extract(frame, grid, crop, &CancelToken::new())?;
        corpus.extract_from_known_sequence(&result.cells, known_chars)
    }

    fn classify_cells(
        &self,
        image: &RgbImage,
        layout: &CellLayout,
        token: &CancelToken,
    ) -> Result<Vec<CharacterBitmap>> {
        let count = layout.cell_count();
        let workers = self.worker_count().min(count);

        if !self.config.parallel || workers <= 1 {
            return self.classify_range(image, layout, token, 0, count);
        }

        let chunk = count.div_ceil(workers);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..count)
                .step_by(chunk)
                .map(|first| {
                    let last = (first + chunk).min(count);
                    s.spawn(move || self.classify_range(image, layout, token, first, last))
                })
                .collect();

            // Joined in spawn order, so cells stay row-major
            let mut cells = Vec::with_capacity(count);
            for handle in handles {
                let part = handle
                    .join()
                    .map_err(|_| OcrError::Worker("classifier thread panicked".to_string()))??;
                cells.extend(part);
            }
            Ok(cells)
        })
    }

    fn classify_range(
        &self,
        image: &RgbImage,
        layout: &CellLayout,
        token: &CancelToken,
        first: usize,
        last: usize,
    ) -> Result<Vec<CharacterBitmap>> {
        (first..last)
            .map(|index| {
                token.check()?;
                let pos = layout.position(index);
                Ok(bitmap::classify_cell(
                    image,
                    pos.x,
                    pos.y,
                    layout.cell_width,
                    layout.cell_height,
                    &self.config.classifier,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    /// 16x8 image, two 8x8 cells: a 4x6 black block in the left cell, right cell blank
    fn two_cell_frame() -> ScreenFrame {
        ScreenFrame::from_rgb(RgbImage::from_fn(16, 8, |x, y| {
            if (2..6).contains(&x) && (1..7).contains(&y) {
                BLACK
            } else {
                WHITE
            }
        }))
    }

    /// Alternating glyphs so every cell has a distinct, non-empty mask
    fn striped_frame(columns: u32, rows: u32) -> ScreenFrame {
        ScreenFrame::from_rgb(RgbImage::from_fn(columns * 4, rows * 4, |x, y| {
            let (cx, cy) = (x / 4, y / 4);
            let (px, py) = (x % 4, y % 4);
            if px == (cx + cy) % 4 && py > 0 {
                BLACK
            } else {
                WHITE
            }
        }))
    }

    #[test]
    fn test_train_then_recognize_two_cells() {
        let pipeline = OcrPipeline::new();
        let frame = two_cell_frame();
        let grid = GridSpec::new(2, 1);
        let corpus = SharedCorpus::default();

        let extracted = pipeline.extract(&frame, grid, None, &CancelToken::new()).unwrap();
        assert_eq!(fingerprint(&extracted.cells[0]), "0x003C3C3C3C3C3C00");
        assert_eq!(fingerprint(&extracted.cells[1]), "0x0000000000000000");

        let mapped = pipeline.train(&frame, grid, None, "A ", &corpus).unwrap();
        assert_eq!(mapped, 1);
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.read().get("0x003C3C3C3C3C3C00"), Some('A'));

        let result = pipeline.process(Arc::new(frame), grid, None, &corpus).unwrap();
        assert_eq!(result.text, vec![format!("A{}", UNKNOWN_PLACEHOLDER)]);
    }

    #[test]
    fn test_solid_cell_has_no_ink() {
        // Background is detected per cell, so a solid cell is all background
        let frame = ScreenFrame::from_rgb(RgbImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                BLACK
            } else {
                WHITE
            }
        }));
        let result = OcrPipeline::new()
            .extract(&frame, GridSpec::new(2, 1), None, &CancelToken::new())
            .unwrap();
        assert_eq!(fingerprint(&result.cells[0]), "0x0000000000000000");
        assert!(result.cells[0].is_empty());
    }

    #[test]
    fn test_process_without_corpus_returns_placeholders() {
        let frame = Arc::new(two_cell_frame());
        let result = OcrPipeline::new()
            .process(frame, GridSpec::new(2, 1), None, &SharedCorpus::default())
            .unwrap();
        let expected: String = std::iter::repeat(UNKNOWN_PLACEHOLDER).take(2).collect();
        assert_eq!(result.text, vec![expected]);
    }

    #[test]
    fn test_crop_result_dimensions() {
        let frame = striped_frame(10, 6);
        let crop = CropRect::new(2, 4, 3, 8);
        let result = OcrPipeline::new()
            .extract(&frame, GridSpec::new(10, 6), Some(crop), &CancelToken::new())
            .unwrap();
        assert_eq!(result.width, 6);
        assert_eq!(result.height, 3);
        assert_eq!(result.cells.len(), 18);
    }

    #[test]
    fn test_crop_matches_full_grid_cells() {
        let frame = striped_frame(6, 4);
        let pipeline = OcrPipeline::new();
        let token = CancelToken::new();
        let full = pipeline.extract(&frame, GridSpec::new(6, 4), None, &token).unwrap();
        let cropped = pipeline
            .extract(&frame, GridSpec::new(6, 4), Some(CropRect::new(1, 2, 2, 3)), &token)
            .unwrap();
        assert_eq!(cropped.cell(0, 0), full.cell(2, 1));
        assert_eq!(cropped.cell(1, 1), full.cell(3, 2));
    }

    #[test]
    fn test_invalid_grid_and_crop() {
        let frame = two_cell_frame();
        let pipeline = OcrPipeline::new();
        let token = CancelToken::new();

        let result = pipeline.extract(&frame, GridSpec::new(32, 1), None, &token);
        assert!(matches!(result, Err(OcrError::InvalidGrid { .. })));

        let result = pipeline.extract(&frame, GridSpec::new(2, 1), Some(CropRect::new(0, 0, 1, 0)), &token);
        assert!(matches!(result, Err(OcrError::CropRange(_))));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let frame = striped_frame(9, 7);
        let grid = GridSpec::new(9, 7);
        let token = CancelToken::new();

        let sequential = OcrPipeline::new().extract(&frame, grid, None, &token).unwrap();
        let parallel = OcrPipeline::with_config(PipelineConfig {
            parallel: true,
            workers: 4,
            ..Default::default()
        })
        .extract(&frame, grid, None, &token)
        .unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_cancelled_extraction() {
        let token = CancelToken::new();
        token.cancel();
        let result = OcrPipeline::new().extract(&striped_frame(4, 4), GridSpec::new(4, 4), None, &token);
        assert!(matches!(result, Err(OcrError::Cancelled)));

        let parallel = OcrPipeline::with_config(PipelineConfig {
            parallel: true,
            workers: 2,
            ..Default::default()
        });
        let result = parallel.extract(&striped_frame(4, 4), GridSpec::new(4, 4), None, &token);
        assert!(matches!(result, Err(OcrError::Cancelled)));
    }

    #[test]
    fn test_extract_with_timeout_completes() {
        let pipeline = OcrPipeline::with_config(PipelineConfig {
            timeout_ms: 10_000,
            ..Default::default()
        });
        let result = pipeline
            .extract_with_timeout(Arc::new(two_cell_frame()), GridSpec::new(2, 1), None)
            .unwrap();
        assert_eq!(result.cells.len(), 2);
    }

    #[test]
    fn test_process_recognizes_within_timeout() {
        let frame = striped_frame(4, 1);
        let grid = GridSpec::new(4, 1);
        let corpus = SharedCorpus::default();
        let pipeline = OcrPipeline::with_config(PipelineConfig {
            timeout_ms: 10_000,
            ..Default::default()
        });

        pipeline.train(&frame, grid, None, "wxyz", &corpus).unwrap();
        let result = pipeline.process(Arc::new(frame), grid, None, &corpus).unwrap();
        assert_eq!(result.text, vec!["wxyz".to_string()]);
        assert_eq!(result.cells[3].label, Some('z'));
    }

    #[test]
    fn test_nearest_uses_configured_distance() {
        let mask = |rows: &[&str]| {
            CharacterBitmap::from_mask(
                rows.iter()
                    .map(|r| r.chars().map(|c| c == '#').collect())
                    .collect(),
            )
        };
        // One of 16 pixels differs: distance 0.0625
        let seen = mask(&["#...", "#...", "#...", "##.."]);
        let mut corpus = TrainingCorpus::new();
        corpus.insert(fingerprint(&mask(&["#...", "#...", "#...", "#..."])), 'l');

        let strict = OcrPipeline::with_config(PipelineConfig {
            nearest_max_distance: 0.05,
            ..Default::default()
        });
        let mut result = OcrResult::new(1, 1, vec![seen.clone()]);
        strict.recognize(&mut result, &corpus).unwrap();
        assert_eq!(strict.recognize_nearest(&mut result, &corpus), 0);

        let loose = OcrPipeline::new();
        let mut result = OcrResult::new(1, 1, vec![seen]);
        loose.recognize(&mut result, &corpus).unwrap();
        assert_eq!(loose.recognize_nearest(&mut result, &corpus), 1);
        assert_eq!(result.text[0], "l");
    }

    #[test]
    fn test_training_on_cropped_region() {
        let frame = striped_frame(4, 2);
        let pipeline = OcrPipeline::new();
        let corpus = SharedCorpus::default();
        let grid = GridSpec::new(4, 2);

        pipeline
            .train(&frame, grid, Some(CropRect::new(0, 0, 0, 3)), "abcd", &corpus)
            .unwrap();
        let result = pipeline.process(Arc::new(frame), grid, None, &corpus).unwrap();

        assert_eq!(result.text[0], "abcd");
        // Row 1 shifts the stripe by one column: cell (c, 1) looks like cell (c + 1, 0)
        assert_eq!(result.text[1], "bcda");
    }
}
