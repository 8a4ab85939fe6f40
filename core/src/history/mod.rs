//! History entries and point-in-time snapshots of the develop history.
//!
//! - [`HistoryEntry`]: one edit step of one module instance
//! - [`Snapshot`]: deep copy of a history list with its cursor and pipeline order
//! - [`HistoryUndo`]: the before/after snapshot pair stored on the undo stack
//! - [`HistoryItem`]: presentation model of one row of the history list
//!
//! Entries refer to their module through a [`ModuleId`](crate::module::ModuleId). An entry whose id is
//! `None` has lost its instance (it was deleted while the entry sat on the undo
//! stack) and must be resurrected before the entry can be applied again.

mod entry;
mod record;
mod snapshot;
mod view;

pub use entry::{HistoryEntry, compress, invalidate_module, reset_module_instance};
pub use record::HistoryUndo;
pub use snapshot::{OrderEntry, OrderList, Snapshot};
pub use view::{HistoryItem, history_items};
