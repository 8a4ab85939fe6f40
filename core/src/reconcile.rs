//! Reconciliation of a history snapshot with the live module registry.
//!
//! Between the moment a snapshot was captured and the moment it is restored
//! the set of live instances may have changed: instances were duplicated,
//! deleted, or had their instance priority renumbered. Before a snapshot can
//! become the live history again, [`Reconciler::run`] makes the registry match
//! it:
//!
//! 1. instance priorities that drifted are reset to the recorded ones,
//! 2. instances referenced by the snapshot but no longer live are recreated,
//! 3. live instances the snapshot does not know are retired,
//! 4. the registry is re-sorted when any of the above changed it.
//!
//! Instances created in step 2 are also written back into every stored undo
//! record, and instances retired in step 3 are forgotten by every stored
//! record, so later pops keep resolving correctly.

use crate::error::HistoryError;
use crate::history::{HistoryEntry, HistoryUndo};
use crate::module::{ModuleId, ModuleRegistry};
use crate::undo::{UndoKind, UndoStack};

/// What a reconciliation pass changed.
#[derive(Debug, Default, PartialEq)]
pub struct ReconcileOutcome {
    /// Instances were created, retired or reordered.
    pub topology_changed: bool,
    /// Instances recreated for unresolved entries.
    pub created: Vec<ModuleId>,
    /// Instances moved to the retired pool.
    pub retired: Vec<ModuleId>,
    /// Entries that could not be resolved. They stay unresolved.
    pub failures: Vec<HistoryError>,
}

/// Resolves history entries against a module registry.
pub struct Reconciler<'a> {
    iop: &'a mut ModuleRegistry,
    undo: &'a mut UndoStack,
}

impl<'a> Reconciler<'a> {
    pub fn new(iop: &'a mut ModuleRegistry, undo: &'a mut UndoStack) -> Self {
        Self { iop, undo }
    }

    /// Makes the registry match `entries`, resolving every entry it can.
    pub fn run(&mut self, entries: &mut [HistoryEntry]) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        self.detach_retired(entries);

        if self.rebuild_multi_priority(entries) {
            outcome.topology_changed = true;
            self.iop.sort();
        }
        if self.create_deleted_modules(entries, &mut outcome) {
            outcome.topology_changed = true;
        }
        if self.check_deleted_instances(entries, &mut outcome) {
            outcome.topology_changed = true;
        }
        if outcome.topology_changed {
            self.iop.sort();
        }

        log::debug!(
            "reconciled {} entries: {} created, {} retired, {} failed",
            entries.len(),
            outcome.created.len(),
            outcome.retired.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// An entry whose instance left the pipeline is unresolved.
    fn detach_retired(&self, entries: &mut [HistoryEntry]) {
        for entry in entries.iter_mut() {
            if let Some(id) = entry.module
                && !self.iop.is_live(id)
            {
                log::debug!("history entry {} ({}) refers to retired {id}", entry.op, entry.multi_priority);
                entry.module = None;
            }
        }
    }

    /// Step 1: the recorded instance priority wins over the live one.
    fn rebuild_multi_priority(&mut self, entries: &[HistoryEntry]) -> bool {
        let mut changed = false;
        for entry in entries {
            let Some(id) = entry.module else {
                continue;
            };
            let Some(module) = self.iop.get(id) else {
                continue;
            };
            if module.multi_priority != entry.multi_priority {
                log::debug!(
                    "instance priority of {module} changed since the snapshot, restoring {}",
                    entry.multi_priority
                );
                self.iop.set_multi_priority(id, entry.multi_priority);
                changed = true;
            }
        }
        changed
    }

    /// Step 2: recreates the instance of every unresolved entry.
    ///
    /// The first recreated instance is also written into the unresolved
    /// entries of every stored undo record.
    fn create_deleted_modules(
        &mut self,
        entries: &mut [HistoryEntry],
        outcome: &mut ReconcileOutcome,
    ) -> bool {
        let mut changed = false;
        let mut propagated = false;

        for i in 0..entries.len() {
            if entries[i].module.is_some() {
                continue;
            }
            let entry = &entries[i];
            let Some(base) = self.iop.find(&entry.op).and_then(|id| self.iop.get(id)) else {
                log::error!(
                    "can't find base module for {} {} ({})",
                    entry.op,
                    entry.multi_name,
                    entry.multi_priority
                );
                outcome.failures.push(HistoryError::MissingBaseInstance {
                    op: entry.op.clone(),
                    multi_priority: entry.multi_priority,
                });
                continue;
            };
            let module = base.instantiate(entry.multi_priority, entry.multi_name.clone(), entry.iop_order);
            let (op, multi_priority) = (entry.op.clone(), entry.multi_priority);
            log::info!("recreating deleted module {module}");
            let id = self.iop.insert(module);
            outcome.created.push(id);
            changed = true;

            // Later entries of the same instance share it.
            crate::history::reset_module_instance(&mut entries[i..], id, &op, multi_priority);

            if !propagated {
                let touched = self.undo.iterate_mut::<HistoryUndo>(UndoKind::HISTORY, |record| {
                    record.reset_module_instance(id, &op, multi_priority);
                });
                log::debug!("pointed {touched} undo records at recreated {id}");
                propagated = true;
            }
        }
        changed
    }

    /// Step 3: retires every live instance the history does not mention.
    ///
    /// Base instances are usually not in the history and stay, except when
    /// two base instances of one operation sit next to each other: then the
    /// one without history is retired. The scan restarts after every removal.
    fn check_deleted_instances(
        &mut self,
        entries: &[HistoryEntry],
        outcome: &mut ReconcileOutcome,
    ) -> bool {
        let in_history = |id: ModuleId| ModuleRegistry::find_in_history(entries, id).is_some();
        let mut changed = false;

        'scan: loop {
            let ids = self.iop.ids().to_vec();
            for (pos, &id) in ids.iter().enumerate() {
                let Some(module) = self.iop.get(id) else {
                    continue;
                };
                let doomed = if module.is_base() {
                    let Some(&next) = ids.get(pos + 1) else {
                        continue;
                    };
                    let Some(next_module) = self.iop.get(next) else {
                        continue;
                    };
                    if next_module.op != module.op || !next_module.is_base() {
                        continue;
                    }
                    match (in_history(id), in_history(next)) {
                        (true, false) => next,
                        (false, true) => id,
                        (both, _) => {
                            log::warn!(
                                "found duplicate module {module} and {next_module} {} in history",
                                if both { "both" } else { "none" }
                            );
                            continue;
                        }
                    }
                } else if in_history(id) {
                    continue;
                } else {
                    id
                };

                if let Some(module) = self.iop.get(doomed) {
                    log::info!("deleting module {module} not found in history");
                }
                self.iop.remove(doomed);
                let touched = self.undo.iterate_mut::<HistoryUndo>(UndoKind::HISTORY, |record| {
                    record.invalidate_module(doomed);
                });
                log::debug!("removed {doomed} from {touched} undo records");
                outcome.retired.push(doomed);
                changed = true;
                continue 'scan;
            }
            break;
        }
        changed
    }
}
