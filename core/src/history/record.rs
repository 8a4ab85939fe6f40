use super::{Snapshot, entry};
use crate::module::ModuleId;
use crate::undo::{UndoAction, UndoItem};

/// Undo record of one history change: the state right before it and right
/// after it.
///
/// Both sides are independent deep copies and are dropped together with the
/// record.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryUndo {
    pub before: Snapshot,
    pub after: Snapshot,
}

impl HistoryUndo {
    pub fn new(before: Snapshot, after: Snapshot) -> Self {
        Self { before, after }
    }

    /// The side to restore when popping the record in direction `action`.
    pub fn target(&self, action: UndoAction) -> &Snapshot {
        match action {
            UndoAction::Undo => &self.before,
            UndoAction::Redo => &self.after,
        }
    }

    /// Forgets `id` on both sides. Returns the number of entries touched.
    pub fn invalidate_module(&mut self, id: ModuleId) -> usize {
        entry::invalidate_module(self.before.entries_mut(), id)
            + entry::invalidate_module(self.after.entries_mut(), id)
    }

    /// Resolves unresolved entries of `(op, multi_priority)` to `id` on both
    /// sides. Returns the number of entries touched.
    pub fn reset_module_instance(&mut self, id: ModuleId, op: &str, multi_priority: i32) -> usize {
        entry::reset_module_instance(self.before.entries_mut(), id, op, multi_priority)
            + entry::reset_module_instance(self.after.entries_mut(), id, op, multi_priority)
    }
}

impl UndoItem for HistoryUndo {
    fn description(&self) -> &str {
        "history"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryEntry, OrderList};
    use crate::module::IopOrder;

    fn entry(op: &str, multi_priority: i32, module: Option<ModuleId>) -> HistoryEntry {
        HistoryEntry {
            module,
            op: op.into(),
            multi_priority,
            multi_name: String::new(),
            enabled: true,
            iop_order: IopOrder(1.0),
            params: Vec::new(),
        }
    }

    #[test]
    fn target_follows_direction() {
        let before = Snapshot::default();
        let after = Snapshot::new(vec![entry("exposure", 0, None)], 1, OrderList::default());
        let record = HistoryUndo::new(before.clone(), after.clone());
        assert_eq!(record.target(UndoAction::Undo), &before);
        assert_eq!(record.target(UndoAction::Redo), &after);
    }

    #[test]
    fn invalidate_and_reset_touch_both_sides() {
        let old = ModuleId::from_index(3);
        let new = ModuleId::from_index(8);
        let before = Snapshot::new(vec![entry("colorzones", 1, Some(old))], 1, OrderList::default());
        let after = Snapshot::new(
            vec![entry("colorzones", 1, Some(old)), entry("exposure", 0, None)],
            2,
            OrderList::default(),
        );
        let mut record = HistoryUndo::new(before, after);

        assert_eq!(record.invalidate_module(old), 2);
        assert_eq!(record.before.entries()[0].module, None);
        assert_eq!(record.reset_module_instance(new, "colorzones", 1), 2);
        assert_eq!(record.after.entries()[0].module, Some(new));
        assert_eq!(record.after.entries()[1].module, None);
        assert_eq!(record.description(), "history");
    }
}
