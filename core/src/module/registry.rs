//! The live set of module instances, kept in pipeline order.

use std::cmp::Ordering;

use super::{IopOrder, ModuleId, ModuleInstance};
use crate::history::HistoryEntry;

/// Arena of every [`ModuleInstance`] created for an image, plus the ordered
/// list of instances currently in the pipeline.
///
/// Removing an instance never frees it: a render pipe may still be processing
/// with it, so it moves to the retired pool and its [`ModuleId`] stays valid.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    arena: Vec<ModuleInstance>,
    live: Vec<ModuleId>,
    retired: Vec<ModuleId>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instance to the pipeline, keeping pipeline order.
    ///
    /// The instance is placed after every instance that does not sort after it.
    pub fn insert(&mut self, instance: ModuleInstance) -> ModuleId {
        let id = ModuleId::from_index(self.arena.len());
        let pos = self.live.partition_point(|&other| {
            self.arena[other.index()].pipeline_cmp(&instance) != Ordering::Greater
        });
        log::debug!("inserting module {instance} as {id} at position {pos}");
        self.arena.push(instance);
        self.live.insert(pos, id);
        id
    }

    /// Takes an instance out of the pipeline and parks it in the retired pool.
    ///
    /// Returns `false` if the instance was not live.
    pub fn remove(&mut self, id: ModuleId) -> bool {
        let Some(pos) = self.live.iter().position(|&live| live == id) else {
            return false;
        };
        self.live.remove(pos);
        self.retired.push(id);
        true
    }

    /// First live instance of `op` in pipeline order.
    pub fn find(&self, op: &str) -> Option<ModuleId> {
        self.live
            .iter()
            .copied()
            .find(|&id| self.arena[id.index()].op == op)
    }

    /// Live instance of `op` with the given instance priority.
    pub fn find_instance(&self, op: &str, multi_priority: i32) -> Option<ModuleId> {
        self.live.iter().copied().find(|&id| {
            let module = &self.arena[id.index()];
            module.op == op && module.multi_priority == multi_priority
        })
    }

    /// First entry of `entries` that refers to `id`.
    pub fn find_in_history(entries: &[HistoryEntry], id: ModuleId) -> Option<&HistoryEntry> {
        entries.iter().find(|entry| entry.module == Some(id))
    }

    /// Looks up an instance, live or retired.
    pub fn get(&self, id: ModuleId) -> Option<&ModuleInstance> {
        self.arena.get(id.index())
    }

    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut ModuleInstance> {
        self.arena.get_mut(id.index())
    }

    /// Whether `id` is currently part of the pipeline.
    pub fn is_live(&self, id: ModuleId) -> bool {
        self.live.contains(&id)
    }

    /// Live instance ids in pipeline order.
    pub fn ids(&self) -> &[ModuleId] {
        &self.live
    }

    /// Instances that left the pipeline, oldest first.
    pub fn retired(&self) -> &[ModuleId] {
        &self.retired
    }

    /// Live instances in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &ModuleInstance)> {
        self.live.iter().map(|&id| (id, &self.arena[id.index()]))
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Changes the instance priority of a module. Returns `false` for an
    /// unknown id.
    pub fn set_multi_priority(&mut self, id: ModuleId, multi_priority: i32) -> bool {
        match self.arena.get_mut(id.index()) {
            Some(module) => {
                module.multi_priority = multi_priority;
                true
            }
            None => false,
        }
    }

    /// Priority for a new clone of `op`: one past the highest live priority.
    pub fn next_multi_priority(&self, op: &str) -> i32 {
        self.iter()
            .filter(|(_, module)| module.op == op)
            .map(|(_, module)| module.multi_priority + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pipeline order of the live instance following `id`.
    pub fn next_order(&self, id: ModuleId) -> Option<IopOrder> {
        let pos = self.live.iter().position(|&live| live == id)?;
        self.live
            .get(pos + 1)
            .map(|next| self.arena[next.index()].iop_order)
    }

    /// Re-sorts the live list by pipeline order (stable).
    pub fn sort(&mut self) {
        let arena = &self.arena;
        self.live
            .sort_by(|a, b| arena[a.index()].pipeline_cmp(&arena[b.index()]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (ModuleRegistry, ModuleId, ModuleId, ModuleId) {
        let mut iop = ModuleRegistry::new();
        let sharpen = iop.insert(ModuleInstance::new("sharpen", "Sharpen", 30.0));
        let exposure = iop.insert(ModuleInstance::new("exposure", "Exposure", 10.0));
        let zones = iop.insert(ModuleInstance::new("colorzones", "Color zones", 20.0));
        (iop, exposure, zones, sharpen)
    }

    #[test]
    fn insert_keeps_pipeline_order() {
        let (iop, exposure, zones, sharpen) = registry();
        assert_eq!(iop.ids(), &[exposure, zones, sharpen]);
    }

    #[test]
    fn insert_places_clone_before_base_at_equal_order() {
        let (mut iop, _, zones, _) = registry();
        let clone = iop.get(zones).unwrap().instantiate(1, "1", IopOrder(20.0));
        let clone = iop.insert(clone);
        let pos_clone = iop.ids().iter().position(|&id| id == clone).unwrap();
        let pos_base = iop.ids().iter().position(|&id| id == zones).unwrap();
        assert!(pos_clone < pos_base);
    }

    #[test]
    fn remove_parks_instance_in_retired_pool() {
        let (mut iop, exposure, _, _) = registry();
        assert!(iop.remove(exposure));
        assert!(!iop.is_live(exposure));
        assert_eq!(iop.retired(), &[exposure]);
        assert_eq!(iop.get(exposure).unwrap().op, "exposure");
        assert!(!iop.remove(exposure));
        assert_eq!(iop.len(), 2);
    }

    #[test]
    fn find_returns_first_live_instance() {
        let (mut iop, _, zones, _) = registry();
        let clone = iop.get(zones).unwrap().instantiate(1, "1", IopOrder(19.0));
        let clone = iop.insert(clone);
        assert_eq!(iop.find("colorzones"), Some(clone));
        assert_eq!(iop.find_instance("colorzones", 0), Some(zones));
        assert_eq!(iop.find("denoise"), None);
        iop.remove(clone);
        assert_eq!(iop.find("colorzones"), Some(zones));
    }

    #[test]
    fn find_in_history_scans_entries() {
        let (iop, exposure, zones, _) = registry();
        let entries = vec![
            HistoryEntry::for_module(exposure, iop.get(exposure).unwrap()),
            HistoryEntry::for_module(exposure, iop.get(exposure).unwrap()),
        ];
        let found = ModuleRegistry::find_in_history(&entries, exposure).unwrap();
        assert!(std::ptr::eq(found, &entries[0]));
        assert!(ModuleRegistry::find_in_history(&entries, zones).is_none());
    }

    #[test]
    fn sort_after_priority_change() {
        let (mut iop, _, zones, _) = registry();
        let clone = iop.get(zones).unwrap().instantiate(1, "1", IopOrder(20.0));
        let clone = iop.insert(clone);
        iop.set_multi_priority(clone, 0);
        iop.set_multi_priority(zones, 1);
        iop.sort();
        let pos_clone = iop.ids().iter().position(|&id| id == clone).unwrap();
        let pos_base = iop.ids().iter().position(|&id| id == zones).unwrap();
        assert!(pos_base < pos_clone);
    }

    #[test]
    fn next_multi_priority_and_order() {
        let (mut iop, exposure, zones, _) = registry();
        assert_eq!(iop.next_multi_priority("colorzones"), 1);
        let clone = iop.get(zones).unwrap().instantiate(4, "4", IopOrder(20.0));
        iop.insert(clone);
        assert_eq!(iop.next_multi_priority("colorzones"), 5);
        assert_eq!(iop.next_multi_priority("denoise"), 0);
        assert!(iop.next_order(exposure).is_some());
    }
}
