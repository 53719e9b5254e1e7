//! Training corpus: fingerprint to character mapping
//!
//! Persisted as a JSON object with a single `fingerprintToChar` field.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{OcrError, Result};
use crate::vision::bitmap::CharacterBitmap;
use crate::vision::fingerprint::fingerprint;

/// On-disk layout of the training file
#[derive(Debug, Deserialize)]
struct TrainingFile {
    #[serde(rename = "fingerprintToChar")]
    fingerprint_to_char: HashMap<String, char>,
}

/// Serialized view with entries ordered by character, then fingerprint
#[derive(Serialize)]
struct TrainingFileOut<'a> {
    #[serde(rename = "fingerprintToChar")]
    fingerprint_to_char: SortedEntries<'a>,
}

struct SortedEntries<'a>(Vec<(&'a str, char)>);

impl Serialize for SortedEntries<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (fp, ch) in &self.0 {
            map.serialize_entry(fp, ch)?;
        }
        map.end()
    }
}

/// Fingerprint to character classifier state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingCorpus {
    fingerprint_to_char: HashMap<String, char>,
}

impl TrainingCorpus {
    /// Create an empty corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a corpus from a JSON training file
    ///
    /// A missing or malformed file is an error; an empty mapping is not.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| OcrError::training_io(path, e))?;
        let corpus = Self::from_json(&content).map_err(|e| match e {
            OcrError::TrainingDataIo { message, .. } => OcrError::training_io(path, message),
            other => other,
        })?;
        info!("Loaded {} training entries from {:?}", corpus.len(), path);
        Ok(corpus)
    }

    /// Parse a corpus from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let file: TrainingFile =
            serde_json::from_str(content).map_err(|e| OcrError::training_io("<memory>", e))?;
        Ok(Self {
            fingerprint_to_char: file.fingerprint_to_char,
        })
    }

    /// Serialize to pretty JSON, entries sorted by character value
    ///
    /// The ordering only keeps diffs stable between saves.
    pub fn to_json(&self) -> Result<String> {
        let mut entries: Vec<(&str, char)> = self
            .fingerprint_to_char
            .iter()
            .map(|(fp, &ch)| (fp.as_str(), ch))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let out = TrainingFileOut {
            fingerprint_to_char: SortedEntries(entries),
        };
        serde_json::to_string_pretty(&out).map_err(|e| OcrError::training_io("<memory>", e))
    }

    /// Write the corpus to a JSON training file
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = self.to_json()?;
        content.push('\n');
        std::fs::write(path, content).map_err(|e| OcrError::training_io(path, e))?;
        info!("Saved {} training entries to {:?}", self.len(), path);
        Ok(())
    }

    /// Number of fingerprints known
    pub fn len(&self) -> usize {
        self.fingerprint_to_char.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprint_to_char.is_empty()
    }

    /// Exact lookup of a fingerprint
    pub fn get(&self, fingerprint: &str) -> Option<char> {
        self.fingerprint_to_char.get(fingerprint).copied()
    }

    /// Iterate (fingerprint, character) pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, char)> {
        self.fingerprint_to_char.iter().map(|(fp, &ch)| (fp.as_str(), ch))
    }

    /// Distinct characters the corpus can produce, sorted
    pub fn characters(&self) -> BTreeSet<char> {
        self.fingerprint_to_char.values().copied().collect()
    }

    /// Map a fingerprint to a character, returning any previous mapping
    pub fn insert(&mut self, fingerprint: impl Into<String>, ch: char) -> Option<char> {
        self.fingerprint_to_char.insert(fingerprint.into(), ch)
    }

    /// Add a bitmap labelled elsewhere (e.g. by an interactive labeller)
    ///
    /// Returns false when the bitmap carries no label.
    pub fn insert_labeled(&mut self, bitmap: &CharacterBitmap) -> bool {
        match bitmap.label {
            Some(ch) => {
                self.insert(fingerprint(bitmap), ch);
                true
            }
            None => false,
        }
    }

    /// Copy every entry of `other` into this corpus; `other` wins on conflict
    pub fn merge(&mut self, other: &TrainingCorpus) -> usize {
        let mut added = 0;
        for (fp, ch) in other.iter() {
            if self.insert(fp, ch).is_none() {
                added += 1;
            }
        }
        debug!("Merged {} entries ({} new)", other.len(), added);
        added
    }

    /// Assign `known_chars`, in order, to the non-empty cells of a screen
    ///
    /// Cells are walked in row-major order; empty bitmaps are skipped and do
    /// not consume a character. Stops when either runs out. Returns the
    /// number of characters mapped.
    pub fn extract_from_known_sequence(
        &mut self,
        cells: &[CharacterBitmap],
        known_chars: &str,
    ) -> Result<usize> {
        let mut chars = known_chars.chars();
        let mut mapped = 0;
        let mut skipped = 0;

        for cell in cells {
            if cell.is_empty() {
                skipped += 1;
                continue;
            }
            let Some(ch) = chars.next() else {
                break;
            };
            self.insert(fingerprint(cell), ch);
            mapped += 1;
        }

        let leftover = chars.count();
        debug!(
            "Training extraction: {} mapped, {} empty cells skipped, {} characters unused",
            mapped, skipped, leftover
        );

        if mapped == 0 {
            return Err(OcrError::ZeroCharactersMapped);
        }

        info!("Mapped {} characters from known sequence", mapped);
        Ok(mapped)
    }
}
