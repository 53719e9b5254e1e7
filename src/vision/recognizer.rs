//! Text recognition from cell bitmaps
//!
//! The shipped strategy is exact fingerprint lookup: a cell either matches a
//! trained fingerprint or becomes the placeholder. A nearest-mask fallback
//! exists but only runs when called explicitly.

use image::{imageops, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use super::bitmap::CharacterBitmap;
use super::cancel::CancelToken;
use super::fingerprint::{decode, fingerprint};
use crate::error::{OcrError, Result};
use crate::storage::training::TrainingCorpus;

/// Character written for cells with no corpus match
///
/// Distinct from `?`, which is legitimate console text.
pub const UNKNOWN_PLACEHOLDER: char = '\u{FFFD}';

/// Output of one recognition pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Grid width in cells
    pub width: u32,
    /// Grid height in cells
    pub height: u32,
    /// One line per row; empty until recognition has run
    pub text: Vec<String>,
    /// Row-major cell bitmaps, `width * height` of them
    pub cells: Vec<CharacterBitmap>,
}

impl OcrResult {
    /// Wrap extracted cells; text stays empty until recognition
    pub fn new(width: u32, height: u32, cells: Vec<CharacterBitmap>) -> Self {
        debug_assert_eq!(cells.len(), width as usize * height as usize);
        Self {
            width,
            height,
            text: Vec::new(),
            cells,
        }
    }

    /// Whether recognition has filled in the text
    pub fn is_recognized(&self) -> bool {
        self.text.len() == self.height as usize
    }

    /// Cell at a grid position
    pub fn cell(&self, column: u32, row: u32) -> Option<&CharacterBitmap> {
        if column >= self.width || row >= self.height {
            return None;
        }
        self.cells.get((row * self.width + column) as usize)
    }

    /// Distinct unlabelled bitmaps, first occurrence in row-major order
    ///
    /// Each entry is paired with its fingerprint so a labeller can hand
    /// results straight back to the corpus.
    pub fn unknown_cells(&self) -> Vec<(String, &CharacterBitmap)> {
        let mut seen = HashSet::new();
        self.cells
            .iter()
            .filter(|cell| cell.label.is_none())
            .filter_map(|cell| {
                let fp = fingerprint(cell);
                seen.insert(fp.clone()).then_some((fp, cell))
            })
            .collect()
    }

    fn set_char(&mut self, index: usize, ch: char) {
        let row = index / self.width as usize;
        let column = index % self.width as usize;
        if let Some(line) = self.text.get_mut(row) {
            *line = line
                .chars()
                .enumerate()
                .map(|(i, c)| if i == column { ch } else { c })
                .collect();
        }
    }
}

/// Counts from a recognition pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecognitionStats {
    /// Cells that matched the corpus
    pub recognized: usize,
    /// Cells left as the placeholder
    pub unknown: usize,
}

/// Fingerprint-lookup recognizer
#[derive(Debug, Clone, Copy)]
pub struct Recognizer {
    placeholder: char,
}

impl Default for Recognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer {
    pub fn new() -> Self {
        Self::with_placeholder(UNKNOWN_PLACEHOLDER)
    }

    pub fn with_placeholder(placeholder: char) -> Self {
        Self { placeholder }
    }

    pub fn placeholder(&self) -> char {
        self.placeholder
    }

    /// Fill `result.text` and cell labels by exact fingerprint lookup
    ///
    /// Misses never fail. An empty corpus fails with `NoTrainingData`, but
    /// only after every cell has been set to the placeholder, so the caller
    /// may still search the result.
    pub fn recognize(
        &self,
        result: &mut OcrResult,
        corpus: &TrainingCorpus,
    ) -> Result<RecognitionStats> {
        self.recognize_cancellable(result, corpus, &CancelToken::new())
    }

    /// `recognize`, polling `token` once per row
    ///
    /// A cancelled pass leaves `result` untouched.
    pub fn recognize_cancellable(
        &self,
        result: &mut OcrResult,
        corpus: &TrainingCorpus,
        token: &CancelToken,
    ) -> Result<RecognitionStats> {
        let start = Instant::now();
        let mut stats = RecognitionStats::default();
        let width = result.width as usize;

        let mut labels = Vec::with_capacity(result.cells.len());
        let mut text = Vec::with_capacity(result.height as usize);
        for row in result.cells.chunks(width.max(1)) {
            token.check()?;
            let mut line = String::with_capacity(width);
            for cell in row {
                let label = corpus.get(&fingerprint(cell));
                match label {
                    Some(ch) => {
                        line.push(ch);
                        stats.recognized += 1;
                    }
                    None => {
                        line.push(self.placeholder);
                        stats.unknown += 1;
                    }
                }
                labels.push(label);
            }
            text.push(line);
        }
        for (cell, label) in result.cells.iter_mut().zip(labels) {
            cell.label = label;
        }
        // A zero-width grid still has `height` (empty) lines
        text.resize(result.height as usize, String::new());
        result.text = text;

        debug!(
            "Recognized {}x{} grid in {:?}: {} matched, {} unknown",
            result.width,
            result.height,
            start.elapsed(),
            stats.recognized,
            stats.unknown
        );

        if corpus.is_empty() {
            return Err(OcrError::NoTrainingData);
        }
        Ok(stats)
    }

    /// Fill remaining placeholders with the closest trained mask
    ///
    /// Opt-in fallback, never run by `recognize`. Candidate masks are decoded
    /// from fingerprints using the unknown cell's width, scaled to its size,
    /// and scored by the fraction of differing pixels. The best candidate
    /// within `max_distance` wins. Returns the number of cells filled.
    pub fn recognize_nearest(
        &self,
        result: &mut OcrResult,
        corpus: &TrainingCorpus,
        max_distance: f32,
    ) -> usize {
        if !result.is_recognized() {
            return 0;
        }

        // Decoded candidates are cached per cell width
        let mut candidates: Option<(u32, Vec<(GrayImage, char)>)> = None;
        let mut filled = 0;

        for index in 0..result.cells.len() {
            let cell = &result.cells[index];
            if cell.label.is_some() || cell.width == 0 || cell.height == 0 {
                continue;
            }

            if candidates.as_ref().map(|(w, _)| *w) != Some(cell.width) {
                candidates = Some((cell.width, decode_candidates(corpus, cell.width)));
            }
            let Some((_, pool)) = candidates.as_ref() else {
                continue;
            };

            let target = mask_to_gray(&cell.data, cell.width, cell.height);
            let best = pool
                .iter()
                .map(|(mask, ch)| (mask_distance(&target, mask), *ch))
                .min_by(|a, b| a.0.total_cmp(&b.0));

            if let Some((distance, ch)) = best {
                if distance <= max_distance {
                    result.cells[index].label = Some(ch);
                    result.set_char(index, ch);
                    filled += 1;
                }
            }
        }

        debug!("Nearest-match fallback filled {} cells", filled);
        filled
    }
}

fn decode_candidates(corpus: &TrainingCorpus, width: u32) -> Vec<(GrayImage, char)> {
    corpus
        .iter()
        .filter_map(|(fp, ch)| {
            let mask = decode(fp, width)?;
            let height = mask.len() as u32;
            (height > 0).then(|| (mask_to_gray(&mask, width, height), ch))
        })
        .collect()
}

/// Missing rows or columns in a ragged mask read as background
fn mask_to_gray(data: &[Vec<bool>], width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let ink = data
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or(false);
        if ink {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Fraction of differing pixels after scaling `candidate` to `target`'s size
fn mask_distance(target: &GrayImage, candidate: &GrayImage) -> f32 {
    let (w, h) = target.dimensions();
    let resized;
    let candidate = if candidate.dimensions() != (w, h) {
        resized = imageops::resize(candidate, w, h, imageops::FilterType::Nearest);
        &resized
    } else {
        candidate
    };

    let differing = target
        .pixels()
        .zip(candidate.pixels())
        .filter(|(a, b)| (a.0[0] >= 128) != (b.0[0] >= 128))
        .count();

    differing as f32 / (w * h) as f32
}
