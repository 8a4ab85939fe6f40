//! Undo records and their type keys.

use std::any::Any;
use std::fmt;

use bitflags::bitflags;

/// Helper trait for downcasting trait objects to concrete types.
///
/// Automatically implemented for all `'static` types. Used by
/// [`UndoStack`](super::UndoStack) to hand a `&mut dyn UndoItem` back to the
/// owner of its record kind as the concrete record type.
pub trait AsAny: 'static {
    /// Returns a reference to `self` as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns a mutable reference to `self` as `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

bitflags! {
    /// Kind of an undo record. Combinations act as filters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UndoKind: u32 {
        /// Develop history snapshots.
        const HISTORY = 1 << 0;
        const TAGS = 1 << 1;
        const RATINGS = 1 << 2;
        const METADATA = 1 << 3;
    }
}

/// Direction of a pop from the undo stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoAction {
    Undo,
    Redo,
}

impl fmt::Display for UndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undo => write!(f, "undo"),
            Self::Redo => write!(f, "redo"),
        }
    }
}

/// A record stored on the [`UndoStack`](super::UndoStack).
///
/// The record owns everything needed to restore both sides of the change.
/// Dropping it frees that data.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct RatingChange {
///     image: ImageId,
///     before: u8,
///     after: u8,
/// }
///
/// impl UndoItem for RatingChange {
///     fn description(&self) -> &str {
///         "Change rating"
///     }
/// }
///
/// stack.record(UndoKind::RATINGS, Box::new(RatingChange { image, before: 1, after: 4 }));
/// ```
pub trait UndoItem: fmt::Debug + AsAny + Send {
    /// A short, human-readable description for display in the edit menu.
    fn description(&self) -> &str;
}
