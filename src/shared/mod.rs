//! Shared training corpus
//!
//! One corpus is reused across many screenshots. Recognition only reads it;
//! training extraction and merges hold the write lock for their whole run so
//! readers never observe a half-written batch.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::storage::training::TrainingCorpus;
use crate::vision::bitmap::CharacterBitmap;

/// Thread-safe handle to a training corpus
#[derive(Debug, Clone, Default)]
pub struct SharedCorpus {
    inner: Arc<RwLock<TrainingCorpus>>,
}

impl SharedCorpus {
    pub fn new(corpus: TrainingCorpus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(corpus)),
        }
    }

    /// Load from a training file
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(TrainingCorpus::load(path)?))
    }

    /// Save the current contents
    pub fn save(&self, path: &Path) -> Result<()> {
        self.inner.read().save(path)
    }

    /// Shared read access
    pub fn read(&self) -> RwLockReadGuard<'_, TrainingCorpus> {
        self.inner.read()
    }

    /// Exclusive write access
    pub fn write(&self) -> RwLockWriteGuard<'_, TrainingCorpus> {
        self.inner.write()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> TrainingCorpus {
        self.inner.read().clone()
    }

    /// Training extraction under the write lock
    pub fn extract_from_known_sequence(
        &self,
        cells: &[CharacterBitmap],
        known_chars: &str,
    ) -> Result<usize> {
        self.inner.write().extract_from_known_sequence(cells, known_chars)
    }

    /// Merge labelled entries under the write lock
    pub fn merge(&self, other: &TrainingCorpus) -> usize {
        self.inner.write().merge(other)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
