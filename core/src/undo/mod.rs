//! Type-keyed undo/redo stack.
//!
//! Several parts of the application record undoable changes for the same
//! image (history edits, tags, ratings, ...). They share one [`UndoStack`];
//! every record carries an [`UndoKind`] and undo/redo only touch records whose
//! kind matches the caller's filter.
//!
//! - [`UndoItem`]: a stored record (trait object, downcast via [`AsAny`])
//! - [`UndoKind`]: record type key, also used as a filter
//! - [`UndoStack`]: the undo and redo lists
//!
//! Records are passive data: the owner of a record kind pops it and restores
//! the state it describes. Owners may also walk every stored record of their
//! kind with [`UndoStack::iterate_mut`] to keep the records consistent with
//! the live state.

mod item;
mod stack;

pub use item::{AsAny, UndoAction, UndoItem, UndoKind};
pub use stack::{DEFAULT_MAX_UNDO, UndoStack};
