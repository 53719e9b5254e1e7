//! Character cell bitmaps and foreground classification
//!
//! Each cell is reduced to a foreground mask by finding its dominant
//! (background) color and marking every pixel that is far enough from it.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default squared RGB distance above which a pixel is foreground (~30 per channel)
pub const DEFAULT_FOREGROUND_THRESHOLD: u32 = 900;

/// How to pick the background when several colors are equally frequent
///
/// Fingerprints are only stable when a cell has a true majority color. On a
/// tie the rule below decides, and changing it changes the masks produced for
/// such cells, which invalidates training data built under the other rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest color in raster scan order wins
    #[default]
    FirstSeen,
    /// Color whose last occurrence is latest in raster scan order wins
    LastSeen,
}

/// Cell classifier settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Squared distance threshold for foreground pixels
    pub foreground_threshold: u32,
    /// Background tie-break rule
    pub tie_break: TieBreak,
    /// Retain original pixel colors for visualization
    pub keep_colors: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            foreground_threshold: DEFAULT_FOREGROUND_THRESHOLD,
            tie_break: TieBreak::FirstSeen,
            keep_colors: true,
        }
    }
}

/// Foreground mask of one grid cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterBitmap {
    /// Cell width in pixels
    pub width: u32,
    /// Cell height in pixels
    pub height: u32,
    /// `height` rows of `width` entries, `true` = ink
    pub data: Vec<Vec<bool>>,
    /// Original pixel colors, same shape as `data`; never used for matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Vec<[u8; 3]>>>,
    /// Character this bitmap represents, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<char>,
}

impl CharacterBitmap {
    /// Build a bitmap from a mask; all rows must have the same length
    pub fn from_mask(data: Vec<Vec<bool>>) -> Self {
        let height = data.len() as u32;
        let width = data.first().map_or(0, |row| row.len() as u32);
        debug_assert!(data.iter().all(|row| row.len() as u32 == width));
        Self {
            width,
            height,
            data,
            colors: None,
            label: None,
        }
    }

    /// Number of foreground pixels
    pub fn foreground_count(&self) -> usize {
        self.data.iter().flatten().filter(|&&px| px).count()
    }

    /// True when the mask carries no signal (all ink or all background)
    pub fn is_empty(&self) -> bool {
        let total = self.width as usize * self.height as usize;
        let ink = self.foreground_count();
        ink == 0 || ink == total
    }

    /// Whether the pixel at (`x`, `y`) is ink; positions outside `data` are background
    pub fn is_ink(&self, x: usize, y: usize) -> bool {
        self.data
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    /// Render the mask as text, `#` for ink and `.` for background
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width as usize + 1) * self.height as usize);
        for row in &self.data {
            out.extend(row.iter().map(|&px| if px { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }

    /// Render the cell as an image
    ///
    /// Uses the retained colors when present, otherwise black ink on white.
    /// Pixels missing from a ragged `colors` or `data` fall back to the mask
    /// and then to background.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let color = self
                .colors
                .as_ref()
                .and_then(|colors| colors.get(y)?.get(x));
            match color {
                Some(&color) => Rgb(color),
                None if self.is_ink(x, y) => Rgb([0, 0, 0]),
                None => Rgb([255, 255, 255]),
            }
        })
    }
}

/// Squared channel-wise distance between two colors
#[inline]
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = p as i32 - q as i32;
            (d * d) as u32
        })
        .sum()
}

/// Most frequent color in a cell, ties resolved by `tie_break`
pub fn background_color(
    image: &RgbImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    tie_break: TieBreak,
) -> [u8; 3] {
    // color -> (count, first index, last index)
    let mut counts: HashMap<[u8; 3], (usize, usize, usize)> = HashMap::new();

    for (i, (px, py)) in (0..height)
        .flat_map(|dy| (0..width).map(move |dx| (dx, dy)))
        .enumerate()
    {
        let color = image.get_pixel(x + px, y + py).0;
        let entry = counts.entry(color).or_insert((0, i, i));
        entry.0 += 1;
        entry.2 = i;
    }

    counts
        .into_iter()
        .max_by(|(_, a), (_, b)| {
            a.0.cmp(&b.0).then_with(|| match tie_break {
                // Smaller first index must compare greater to win max_by
                TieBreak::FirstSeen => b.1.cmp(&a.1),
                TieBreak::LastSeen => a.2.cmp(&b.2),
            })
        })
        .map(|(color, _)| color)
        .unwrap_or([0, 0, 0])
}

/// Classify every pixel of the cell at `(x, y)` as foreground or background
///
/// Pure and cell-local. The caller guarantees the cell lies inside the image.
pub fn classify_cell(
    image: &RgbImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    config: &ClassifierConfig,
) -> CharacterBitmap {
    let background = background_color(image, x, y, width, height, config.tie_break);

    let mut data = Vec::with_capacity(height as usize);
    let mut colors = config.keep_colors.then(|| Vec::with_capacity(height as usize));

    for dy in 0..height {
        let mut mask_row = Vec::with_capacity(width as usize);
        let mut color_row = Vec::with_capacity(if config.keep_colors { width as usize } else { 0 });

        for dx in 0..width {
            let color = image.get_pixel(x + dx, y + dy).0;
            mask_row.push(color_distance(color, background) > config.foreground_threshold);
            if config.keep_colors {
                color_row.push(color);
            }
        }

        data.push(mask_row);
        if let Some(colors) = colors.as_mut() {
            colors.push(color_row);
        }
    }

    CharacterBitmap {
        width,
        height,
        data,
        colors,
        label: None,
    }
}
