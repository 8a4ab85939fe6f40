//! Live develop state of one image.
//!
//! [`Develop`] owns the history list, its cursor, the module registry and the
//! pipeline order, plus the change flags of the render pipes that consume them.
//! It is the value guarded by the history lock of a
//! [`PipelineContext`](crate::controller::PipelineContext).

use std::fmt;

use bitflags::bitflags;

use crate::error::{HistoryError, HistoryResult};
use crate::history::{HistoryEntry, OrderList, Snapshot};
use crate::module::{ModuleFlags, ModuleId, ModuleRegistry};

/// Identifier of the image being developed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u32);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// What a render pipe has to redo on its next run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipeChange: u32 {
        /// Parameters of the topmost history item changed.
        const TOP_CHANGED = 1 << 0;
        /// Modules were added or removed; the node list must be rebuilt.
        const REMOVE = 1 << 1;
        /// The whole history must be re-synchronized.
        const SYNCH = 1 << 2;
        const ZOOMED = 1 << 3;
    }
}

/// The render pipes fed by the develop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeKind {
    /// Full resolution center view.
    Full,
    /// Navigation thumbnail.
    Preview,
    /// Second window preview.
    Preview2,
}

impl PipeKind {
    pub const ALL: [PipeKind; 3] = [PipeKind::Full, PipeKind::Preview, PipeKind::Preview2];

    fn index(self) -> usize {
        match self {
            Self::Full => 0,
            Self::Preview => 1,
            Self::Preview2 => 2,
        }
    }
}

/// Pending work of one render pipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeState {
    pub changed: PipeChange,
    /// Cached buffers may refer to modules that are gone.
    pub cache_obsolete: bool,
}

/// History, cursor, registry and pipeline order of the image being developed.
#[derive(Debug, Clone, Default)]
pub struct Develop {
    image_id: Option<ImageId>,
    history: Vec<HistoryEntry>,
    history_end: usize,
    pub iop: ModuleRegistry,
    pub iop_order_list: OrderList,
    pipes: [PipeState; 3],
    gui_module: Option<ModuleId>,
    invalidations: u64,
}

impl Develop {
    /// Creates an empty develop state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a develop state with an empty history over the given modules.
    pub fn with_modules(iop: ModuleRegistry) -> Self {
        let iop_order_list = OrderList::from_registry(&iop);
        Self {
            iop,
            iop_order_list,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image_id: ImageId) -> Self {
        self.image_id = Some(image_id);
        self
    }

    pub fn image_id(&self) -> Option<ImageId> {
        self.image_id
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Number of active history entries.
    pub fn history_end(&self) -> usize {
        self.history_end
    }

    pub fn pipe(&self, kind: PipeKind) -> &PipeState {
        &self.pipes[kind.index()]
    }

    /// Hands the pending pipe work to the renderer and clears it.
    pub fn take_pipe(&mut self, kind: PipeKind) -> PipeState {
        std::mem::take(&mut self.pipes[kind.index()])
    }

    /// Instance that currently has the editing focus.
    pub fn gui_module(&self) -> Option<ModuleId> {
        self.gui_module
    }

    /// How many times every pipe buffer was invalidated.
    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    /// Deep copy of the history, cursor and pipeline order.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.history, self.history_end, &self.iop_order_list)
    }

    /// Replaces the history, clamping the cursor to its length.
    pub fn set_history(&mut self, history: Vec<HistoryEntry>, history_end: usize) {
        self.history_end = if history_end > history.len() {
            log::warn!(
                "history end {history_end} past a {} item history, clamping",
                history.len()
            );
            history.len()
        } else {
            history_end
        };
        self.history = history;
    }

    /// Makes a snapshot the live history, cursor and pipeline order.
    pub fn commit(&mut self, snapshot: Snapshot) {
        let (history, end, order) = snapshot.into_parts();
        self.set_history(history, end);
        self.iop_order_list = order;
    }

    /// Sets `change` on every pipe.
    pub fn mark_pipes(&mut self, change: PipeChange) {
        for pipe in &mut self.pipes {
            pipe.changed |= change;
        }
    }

    /// Flags every pipe for a node rebuild after modules came or went.
    pub fn mark_topology_changed(&mut self) {
        for pipe in &mut self.pipes {
            pipe.changed |= PipeChange::REMOVE;
            pipe.cache_obsolete = true;
        }
        self.invalidate_all();
    }

    /// Drops every cached pipe buffer.
    pub fn invalidate_all(&mut self) {
        self.invalidations += 1;
        log::debug!("invalidating all pipe buffers ({})", self.invalidations);
    }

    /// Moves every live instance to the position the order list records for
    /// it, then re-sorts the registry.
    pub fn resync_modules_order(&mut self) {
        for id in self.iop.ids().to_vec() {
            let Some(module) = self.iop.get_mut(id) else {
                continue;
            };
            if let Some(order) = self
                .iop_order_list
                .order_of(&module.op, module.multi_priority)
            {
                module.iop_order = order;
            }
        }
        self.iop.sort();
        self.iop_order_list = OrderList::from_registry(&self.iop);
    }

    /// Puts every live instance in the state described by the active part of
    /// the history.
    ///
    /// Instances start from their defaults; each active entry then overwrites
    /// the parameters and enabled state of its instance.
    pub fn apply_history(&mut self) {
        for id in self.iop.ids().to_vec() {
            if let Some(module) = self.iop.get_mut(id) {
                module.reset();
            }
        }
        for entry in &self.history[..self.history_end] {
            let Some(id) = entry.module.filter(|&id| self.iop.is_live(id)) else {
                log::warn!(
                    "history entry {} (instance {}) has no live module, skipping",
                    entry.op,
                    entry.multi_priority
                );
                continue;
            };
            if let Some(module) = self.iop.get_mut(id) {
                module.params.clone_from(&entry.params);
                module.enabled = entry.enabled;
            }
        }
    }

    /// Loads a history read back from storage.
    ///
    /// Each entry is matched to the live instance with its operation and
    /// instance priority. Missing instances are created from the base
    /// instance of the operation. Entries whose operation has no instance at
    /// all stay in the history unresolved, so the cursor is kept; applying
    /// the history skips them. Returns `true` if instances were created.
    pub fn load_history(&mut self, mut history: Vec<HistoryEntry>, history_end: usize) -> bool {
        let mut created = false;
        for entry in &mut history {
            match self.resolve(entry) {
                Some(was_created) => created |= was_created,
                None => {
                    log::error!(
                        "can't find base module for {} {} ({}), keeping history item unresolved",
                        entry.op,
                        entry.multi_name,
                        entry.multi_priority
                    );
                    entry.module = None;
                }
            }
        }

        self.set_history(history, history_end);
        if created {
            self.iop_order_list = OrderList::from_registry(&self.iop);
            self.mark_topology_changed();
        }
        self.apply_history();
        created
    }

    /// Points `entry` at a live instance. Returns whether one had to be
    /// created, or `None` when the operation has no instance to clone.
    fn resolve(&mut self, entry: &mut HistoryEntry) -> Option<bool> {
        if let Some(id) = entry.module
            && self.iop.is_live(id)
            && self
                .iop
                .get(id)
                .is_some_and(|m| m.op == entry.op && m.multi_priority == entry.multi_priority)
        {
            return Some(false);
        }
        if let Some(id) = self.iop.find_instance(&entry.op, entry.multi_priority) {
            entry.module = Some(id);
            return Some(false);
        }
        let base = self.iop.find(&entry.op)?;
        let module = self
            .iop
            .get(base)?
            .instantiate(entry.multi_priority, entry.multi_name.clone(), entry.iop_order);
        log::debug!("creating {module} for stored history");
        entry.module = Some(self.iop.insert(module));
        Some(true)
    }

    /// Records the current state of `id` as a new history step.
    ///
    /// Steps past the cursor are discarded. When the topmost step already
    /// belongs to `id` it is updated in place. Returns the new cursor.
    pub fn add_history_item(&mut self, id: ModuleId) -> HistoryResult<usize> {
        if !self.iop.is_live(id) {
            return Err(HistoryError::UnknownModule(id));
        }
        let module = self.iop.get(id).ok_or(HistoryError::UnknownModule(id))?;
        let entry = HistoryEntry::for_module(id, module);

        self.history.truncate(self.history_end);
        match self.history.last_mut() {
            Some(top) if top.module == Some(id) => *top = entry,
            _ => self.history.push(entry),
        }
        self.history_end = self.history.len();
        self.mark_pipes(PipeChange::TOP_CHANGED);
        Ok(self.history_end)
    }

    /// Sets parameters and enabled state of `id` and records the change.
    pub fn edit_module(
        &mut self,
        id: ModuleId,
        params: Vec<u8>,
        enabled: bool,
    ) -> HistoryResult<usize> {
        if !self.iop.is_live(id) {
            return Err(HistoryError::UnknownModule(id));
        }
        let module = self.iop.get_mut(id).ok_or(HistoryError::UnknownModule(id))?;
        module.params = params;
        module.enabled = enabled;
        self.add_history_item(id)
    }

    /// Creates a new instance of the operation of `id`, placed right after
    /// it in the pipeline, and records it in the history.
    pub fn duplicate_module(&mut self, id: ModuleId) -> HistoryResult<ModuleId> {
        if !self.iop.is_live(id) {
            return Err(HistoryError::UnknownModule(id));
        }
        let source = self.iop.get(id).ok_or(HistoryError::UnknownModule(id))?;
        if source.flags.contains(ModuleFlags::ONE_INSTANCE) {
            return Err(HistoryError::SingleInstance(source.op.clone()));
        }
        let multi_priority = self.iop.next_multi_priority(&source.op);
        let order = source.iop_order.between(self.iop.next_order(id));
        let clone = source.instantiate(multi_priority, multi_priority.to_string(), order);
        log::info!("duplicating {source} as {clone}");

        let new_id = self.iop.insert(clone);
        self.iop_order_list = OrderList::from_registry(&self.iop);
        self.mark_topology_changed();
        self.add_history_item(new_id)?;
        Ok(new_id)
    }

    /// Deletes an instance together with its history steps.
    ///
    /// The instance is parked in the retired pool. Deleting the base instance
    /// promotes the lowest remaining instance of the operation to priority
    /// `0`. The last instance of an operation cannot be deleted.
    pub fn delete_module(&mut self, id: ModuleId) -> HistoryResult {
        if !self.iop.is_live(id) {
            return Err(HistoryError::UnknownModule(id));
        }
        let module = self.iop.get(id).ok_or(HistoryError::UnknownModule(id))?;
        let op = module.op.clone();
        let was_base = module.is_base();
        let siblings: Vec<ModuleId> = self
            .iop
            .iter()
            .filter(|&(other, m)| other != id && m.op == op)
            .map(|(other, _)| other)
            .collect();
        if siblings.is_empty() {
            return Err(HistoryError::LastInstance(op));
        }
        log::info!("deleting module {module}");

        let removed_active = self.history[..self.history_end]
            .iter()
            .filter(|e| e.module == Some(id))
            .count();
        self.history.retain(|e| e.module != Some(id));
        self.history_end -= removed_active;

        self.iop.remove(id);
        if self.gui_module == Some(id) {
            self.gui_module = None;
        }

        if was_base
            && let Some(&next) = siblings
                .iter()
                .min_by_key(|&&other| self.iop.get(other).map_or(i32::MAX, |m| m.multi_priority))
        {
            self.iop.set_multi_priority(next, 0);
            for entry in self.history.iter_mut().filter(|e| e.module == Some(next)) {
                entry.multi_priority = 0;
            }
        }

        self.iop.sort();
        self.iop_order_list = OrderList::from_registry(&self.iop);
        self.mark_topology_changed();
        Ok(())
    }

    /// Moves the history cursor to `num`, leaving the entries in place.
    pub fn pop_history_items(&mut self, num: usize) -> HistoryResult {
        if num > self.history.len() {
            return Err(HistoryError::InvalidCursor {
                cursor: num,
                len: self.history.len(),
            });
        }
        self.history_end = num;
        self.apply_history();
        self.mark_pipes(PipeChange::SYNCH);
        Ok(())
    }

    /// Gives the editing focus to `id` (or to nothing).
    pub fn request_focus(&mut self, id: Option<ModuleId>) -> HistoryResult {
        if let Some(id) = id
            && !self.iop.is_live(id)
        {
            return Err(HistoryError::UnknownModule(id));
        }
        self.gui_module = id;
        Ok(())
    }

    /// Clears the focus if the focused instance left the pipeline.
    pub fn drop_stale_focus(&mut self) {
        if let Some(id) = self.gui_module
            && !self.iop.is_live(id)
        {
            log::debug!("focused module {id} is gone, clearing focus");
            self.gui_module = None;
        }
    }
}
