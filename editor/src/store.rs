//! History store kept in a RON file.
//!
//! The file holds, per image, the history rows and the cursor. Rows carry no
//! module references; reading them back resolves each row by operation and
//! instance priority.

use std::fmt;
use std::path::{Path, PathBuf};

use darkroom_core::history::compress;
use darkroom_core::{
    Develop, HistoryEntry, HistoryError, HistoryResult, ImageId, IopOrder, PipelineHost,
};
use serde::{Deserialize, Serialize};

/// One stored history row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub num: usize,
    pub op: String,
    pub multi_priority: i32,
    #[serde(default)]
    pub multi_name: String,
    pub enabled: bool,
    pub iop_order: f64,
    #[serde(default)]
    pub params: Vec<u8>,
}

impl StoredRow {
    fn from_entry(num: usize, entry: &HistoryEntry) -> Self {
        Self {
            num,
            op: entry.op.clone(),
            multi_priority: entry.multi_priority,
            multi_name: entry.multi_name.clone(),
            enabled: entry.enabled,
            iop_order: entry.iop_order.0,
            params: entry.params.clone(),
        }
    }

    fn to_entry(&self) -> HistoryEntry {
        HistoryEntry {
            module: None,
            op: self.op.clone(),
            multi_priority: self.multi_priority,
            multi_name: self.multi_name.clone(),
            enabled: self.enabled,
            iop_order: IopOrder(self.iop_order),
            params: self.params.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    pub image: Option<u32>,
    pub history_end: usize,
    pub rows: Vec<StoredRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreFile {
    images: Vec<StoredImage>,
}

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: std::io::Error },
    Decode { path: PathBuf, source: ron::error::SpannedError },
    Encode(ron::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "history store {}: {source}", path.display()),
            Self::Decode { path, source } => {
                write!(f, "history store {} is corrupt: {source}", path.display())
            }
            Self::Encode(source) => write!(f, "failed to encode history store: {source}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::Encode(source) => Some(source),
        }
    }
}

impl From<StoreError> for HistoryError {
    fn from(e: StoreError) -> Self {
        HistoryError::Host(e.to_string())
    }
}

/// [`PipelineHost`] writing every change through to a RON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: StoreFile,
}

impl FileStore {
    /// Opens a store. A missing file is an empty store; it is created on the
    /// first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = match std::fs::read_to_string(&path) {
            Ok(text) => ron::from_str(&text).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("history store {} not found, starting empty", path.display());
                StoreFile::default()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        log::debug!(
            "opened history store {} with {} images",
            path.display(),
            file.images.len()
        );
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored history of an image.
    pub fn image(&self, image: Option<ImageId>) -> Option<&StoredImage> {
        let key = image.map(|id| id.0);
        self.file.images.iter().find(|stored| stored.image == key)
    }

    fn image_mut(&mut self, image: Option<ImageId>) -> &mut StoredImage {
        let key = image.map(|id| id.0);
        let pos = match self.file.images.iter().position(|stored| stored.image == key) {
            Some(pos) => pos,
            None => {
                self.file.images.push(StoredImage {
                    image: key,
                    ..StoredImage::default()
                });
                self.file.images.len() - 1
            }
        };
        &mut self.file.images[pos]
    }

    fn save(&self) -> Result<(), StoreError> {
        let text = ron::ser::to_string_pretty(&self.file, ron::ser::PrettyConfig::default())
            .map_err(StoreError::Encode)?;
        std::fs::write(&self.path, text).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl PipelineHost for FileStore {
    fn write_history(&mut self, dev: &Develop) -> HistoryResult {
        let stored = self.image_mut(dev.image_id());
        stored.rows = dev
            .history()
            .iter()
            .enumerate()
            .map(|(num, entry)| StoredRow::from_entry(num, entry))
            .collect();
        stored.history_end = dev.history_end();
        self.save()?;
        Ok(())
    }

    fn reload_history_items(&mut self, dev: &mut Develop) -> HistoryResult {
        let (rows, end) = match self.image(dev.image_id()) {
            Some(stored) => {
                let mut rows = stored.rows.clone();
                rows.sort_by_key(|row| row.num);
                (rows, stored.history_end)
            }
            None => (Vec::new(), 0),
        };
        let entries = rows.iter().map(StoredRow::to_entry).collect();
        if dev.load_history(entries, end) {
            log::debug!("stored history of image {:?} created instances", dev.image_id());
        }
        Ok(())
    }

    fn compress_history(&mut self, image: Option<ImageId>) -> HistoryResult<usize> {
        let stored = self.image_mut(image);
        let entries: Vec<HistoryEntry> = stored.rows.iter().map(StoredRow::to_entry).collect();
        stored.rows = compress(&entries, stored.history_end)
            .iter()
            .enumerate()
            .map(|(num, entry)| StoredRow::from_entry(num, entry))
            .collect();
        stored.history_end = stored.rows.iter().map(|row| row.num + 1).max().unwrap_or(0);
        let end = stored.history_end;
        self.save()?;
        Ok(end)
    }
}
