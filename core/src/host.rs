//! Collaborators of the history controller: persistence and module UI.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::develop::{Develop, ImageId};
use crate::error::HistoryResult;
use crate::history::{self, HistoryEntry};
use crate::module::{ModuleId, ModuleInstance};

/// Persistent storage of the develop history.
///
/// Stored rows are keyed by image and position (`num`). They carry no module
/// references: reading them back matches each row to a live instance by
/// operation and instance priority, see [`Develop::load_history`].
pub trait PipelineHost: Send + 'static {
    /// Replaces the stored history of the image with the live one.
    fn write_history(&mut self, dev: &Develop) -> HistoryResult;

    /// Loads the stored history of the image into the develop state.
    fn reload_history_items(&mut self, dev: &mut Develop) -> HistoryResult;

    /// Compresses the stored history: rows past the cursor are dropped and
    /// only the latest row of each instance is kept, renumbered without gaps.
    ///
    /// Returns the new cursor, one past the highest remaining `num`.
    fn compress_history(&mut self, image: Option<ImageId>) -> HistoryResult<usize>;
}

/// Module UI notifications. Every hook defaults to doing nothing.
///
/// Hooks are called without the history lock held.
pub trait ModuleUi: Send + 'static {
    /// An instance joined the pipeline and needs an expander.
    fn add_expander(&mut self, _id: ModuleId, _module: &ModuleInstance) {}

    /// An instance left the pipeline; its expander should be hidden.
    fn hide_expander(&mut self, _id: ModuleId) {}

    /// The pipeline order changed; `ids` is the new order.
    fn reorder_modules(&mut self, _ids: &[ModuleId]) {}
}

/// UI that ignores every notification, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUi;

impl ModuleUi for NoUi {}

#[derive(Debug, Clone, Default)]
struct StoredHistory {
    rows: Vec<HistoryEntry>,
    history_end: usize,
}

/// In-memory history storage for tests and headless sessions.
///
/// Clones share the same storage, so a test can keep a handle after moving
/// the host into a pipeline context.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    images: Arc<RwLock<HashMap<Option<ImageId>, StoredHistory>>>,
}

impl MemoryHost {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored rows of an image.
    pub fn rows(&self, image: Option<ImageId>) -> Vec<HistoryEntry> {
        self.images
            .read()
            .get(&image)
            .map(|stored| stored.rows.clone())
            .unwrap_or_default()
    }

    /// Stored cursor of an image.
    pub fn history_end(&self, image: Option<ImageId>) -> usize {
        self.images
            .read()
            .get(&image)
            .map_or(0, |stored| stored.history_end)
    }
}

impl PipelineHost for MemoryHost {
    fn write_history(&mut self, dev: &Develop) -> HistoryResult {
        let rows = dev
            .history()
            .iter()
            .map(|entry| HistoryEntry {
                module: None,
                ..entry.clone()
            })
            .collect();
        log::trace!(
            "writing {} history rows for image {:?}",
            dev.history().len(),
            dev.image_id()
        );
        self.images.write().insert(
            dev.image_id(),
            StoredHistory {
                rows,
                history_end: dev.history_end(),
            },
        );
        Ok(())
    }

    fn reload_history_items(&mut self, dev: &mut Develop) -> HistoryResult {
        let stored = self
            .images
            .read()
            .get(&dev.image_id())
            .cloned()
            .unwrap_or_default();
        dev.load_history(stored.rows, stored.history_end);
        Ok(())
    }

    fn compress_history(&mut self, image: Option<ImageId>) -> HistoryResult<usize> {
        let mut images = self.images.write();
        let stored = images.entry(image).or_default();
        stored.rows = history::compress(&stored.rows, stored.history_end);
        stored.history_end = stored.rows.len();
        Ok(stored.history_end)
    }
}
