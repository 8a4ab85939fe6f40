use crate::module::{IopOrder, ModuleId, ModuleInstance};

/// One step of the edit history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    /// Instance that produced this step; `None` when it must be resurrected.
    pub module: Option<ModuleId>,
    pub op: String,
    pub multi_priority: i32,
    pub multi_name: String,
    pub enabled: bool,
    /// Pipeline order of the instance when the step was recorded.
    pub iop_order: IopOrder,
    /// Serialized parameters, opaque to the history engine.
    pub params: Vec<u8>,
}

impl HistoryEntry {
    /// Records the current state of a live instance.
    pub fn for_module(id: ModuleId, module: &ModuleInstance) -> Self {
        Self {
            module: Some(id),
            op: module.op.clone(),
            multi_priority: module.multi_priority,
            multi_name: module.multi_name.clone(),
            enabled: module.enabled,
            iop_order: module.iop_order,
            params: module.params.clone(),
        }
    }

    /// Whether this entry belongs to the instance `(op, multi_priority)`.
    pub fn is_instance(&self, op: &str, multi_priority: i32) -> bool {
        self.op == op && self.multi_priority == multi_priority
    }

    /// Equality of the recorded edit, ignoring which instance object holds it.
    pub fn same_edit(&self, other: &Self) -> bool {
        self.op == other.op
            && self.multi_priority == other.multi_priority
            && self.enabled == other.enabled
            && self.params == other.params
    }
}

/// Clears every reference to `id`, leaving the entries in place.
///
/// Returns the number of entries touched.
pub fn invalidate_module(entries: &mut [HistoryEntry], id: ModuleId) -> usize {
    let mut count = 0;
    for entry in entries.iter_mut().filter(|e| e.module == Some(id)) {
        entry.module = None;
        count += 1;
    }
    count
}

/// Points every unresolved entry of instance `(op, multi_priority)` at `id`.
///
/// Returns the number of entries touched.
pub fn reset_module_instance(
    entries: &mut [HistoryEntry],
    id: ModuleId,
    op: &str,
    multi_priority: i32,
) -> usize {
    let mut count = 0;
    for entry in entries
        .iter_mut()
        .filter(|e| e.module.is_none() && e.is_instance(op, multi_priority))
    {
        entry.module = Some(id);
        count += 1;
    }
    count
}

/// Compresses a history to one entry per instance.
///
/// Entries past `end` are dropped. Of the remaining ones only the last entry of
/// each `(op, multi_priority)` instance survives, in the order of those last
/// occurrences.
pub fn compress(entries: &[HistoryEntry], end: usize) -> Vec<HistoryEntry> {
    let active = &entries[..end.min(entries.len())];
    active
        .iter()
        .enumerate()
        .filter(|(i, entry)| {
            !active[i + 1..]
                .iter()
                .any(|later| later.is_instance(&entry.op, entry.multi_priority))
        })
        .map(|(_, entry)| entry.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(op: &str, multi_priority: i32, module: Option<u32>, params: u8) -> HistoryEntry {
        HistoryEntry {
            module: module.map(|m| ModuleId::from_index(m as usize)),
            op: op.into(),
            multi_priority,
            multi_name: String::new(),
            enabled: true,
            iop_order: IopOrder(0.0),
            params: vec![params],
        }
    }

    #[test]
    fn invalidate_nulls_only_matching_entries() {
        let mut entries = vec![
            entry("exposure", 0, Some(0), 1),
            entry("colorzones", 1, Some(1), 2),
            entry("exposure", 0, Some(0), 3),
        ];
        let touched = invalidate_module(&mut entries, ModuleId::from_index(0));
        assert_eq!(touched, 2);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].module, None);
        assert_eq!(entries[1].module, Some(ModuleId::from_index(1)));
        assert_eq!(entries[2].params, vec![3]);
    }

    #[test]
    fn reset_fills_only_unresolved_entries_of_instance() {
        let mut entries = vec![
            entry("colorzones", 5, None, 1),
            entry("colorzones", 4, None, 2),
            entry("colorzones", 5, Some(9), 3),
            entry("colorzones", 5, None, 4),
        ];
        let id = ModuleId::from_index(7);
        assert_eq!(reset_module_instance(&mut entries, id, "colorzones", 5), 2);
        assert_eq!(entries[0].module, Some(id));
        assert_eq!(entries[1].module, None);
        assert_eq!(entries[2].module, Some(ModuleId::from_index(9)));
        assert_eq!(entries[3].module, Some(id));
    }

    #[test]
    fn compress_keeps_last_entry_per_instance() {
        let entries = vec![
            entry("exposure", 0, Some(0), 1),
            entry("colorzones", 0, Some(1), 2),
            entry("exposure", 0, Some(0), 3),
            entry("sharpen", 0, Some(2), 4),
        ];
        let compressed = compress(&entries, 3);
        let params: Vec<u8> = compressed.iter().map(|e| e.params[0]).collect();
        assert_eq!(params, vec![2, 3]);
        assert!(compress(&entries, 0).is_empty());
        assert_eq!(compress(&entries, 99).len(), 3);
    }

    #[test]
    fn same_edit_ignores_module_reference() {
        let a = entry("exposure", 0, Some(0), 1);
        let mut b = entry("exposure", 0, None, 1);
        assert!(a.same_edit(&b));
        b.enabled = false;
        assert!(!a.same_edit(&b));
    }
}
