//! # Darkroom Core
//!
//! Edit history and undo/redo reconciliation for the darkroom develop pipeline.
//!
//! - [`module`]: processing module instances and the live [`ModuleRegistry`]
//! - [`history`]: history entries, point-in-time [`Snapshot`]s and undo records
//! - [`undo`]: the generic, type-keyed [`UndoStack`]
//! - [`reconcile`]: resolves a snapshot against the live registry on undo/redo
//! - [`controller`]: the [`HistoryController`] driving capture and restoration
//! - [`gradient_slider`]: headless value model of the multi-marker slider control

pub mod controller;
pub mod develop;
mod error;
pub mod gradient_slider;
pub mod history;
pub mod host;
pub mod module;
pub mod reconcile;
pub mod undo;

pub use controller::{HistoryController, HistoryListener, PipelineContext, PipelineEvent, PopReport};
pub use develop::{Develop, ImageId, PipeChange, PipeKind, PipeState};
pub use error::{HistoryError, HistoryResult};
pub use history::{HistoryEntry, HistoryItem, HistoryUndo, OrderEntry, OrderList, Snapshot};
pub use host::{MemoryHost, ModuleUi, NoUi, PipelineHost};
pub use module::{IopOrder, ModuleFlags, ModuleId, ModuleInstance, ModuleRegistry};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use undo::{DEFAULT_MAX_UNDO, UndoAction, UndoItem, UndoKind, UndoStack};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
