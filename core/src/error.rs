//! Error type shared by the history engine.

use std::fmt;

use crate::module::ModuleId;

/// Errors reported by history capture, reconciliation and persistence.
///
/// None of these are fatal to the process: a failed resurrection aborts only
/// the entry it was working on and the registry is left structurally valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The undo list holds no history record.
    NothingToUndo,
    /// The redo list holds no history record.
    NothingToRedo,
    /// A history entry needs a new instance but no instance of the operation
    /// is left to clone its configuration from.
    MissingBaseInstance { op: String, multi_priority: i32 },
    /// The module id does not name a live instance.
    UnknownModule(ModuleId),
    /// The last live instance of an operation cannot be deleted.
    LastInstance(String),
    /// The operation does not support more than one instance.
    SingleInstance(String),
    /// A history cursor outside `0..=len`.
    InvalidCursor { cursor: usize, len: usize },
    /// The persistence host failed to write or reload the history.
    Host(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToUndo => write!(f, "nothing to undo"),
            Self::NothingToRedo => write!(f, "nothing to redo"),
            Self::MissingBaseInstance { op, multi_priority } => {
                write!(f, "can't find base module for {op} (instance {multi_priority})")
            }
            Self::UnknownModule(id) => write!(f, "unknown module {id}"),
            Self::LastInstance(op) => write!(f, "can't delete the last instance of {op}"),
            Self::SingleInstance(op) => write!(f, "{op} can't have more than one instance"),
            Self::InvalidCursor { cursor, len } => {
                write!(f, "history cursor {cursor} out of range (history has {len} items)")
            }
            Self::Host(msg) => write!(f, "history host error: {msg}"),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Result type for history operations.
pub type HistoryResult<T = ()> = Result<T, HistoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(HistoryError::NothingToUndo.to_string(), "nothing to undo");
        assert_eq!(
            HistoryError::MissingBaseInstance {
                op: "colorzones".into(),
                multi_priority: 2,
            }
            .to_string(),
            "can't find base module for colorzones (instance 2)"
        );
        assert_eq!(
            HistoryError::InvalidCursor { cursor: 7, len: 3 }.to_string(),
            "history cursor 7 out of range (history has 3 items)"
        );
        assert_eq!(
            HistoryError::Host("disk full".into()).to_string(),
            "history host error: disk full"
        );
    }
}
