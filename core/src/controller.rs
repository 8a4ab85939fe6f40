//! Capture of undo records and restoration of popped ones.
//!
//! The [`HistoryController`] sits between the editing code and the
//! [`UndoStack`]. Every history change is announced by a
//! [`PipelineEvent::WillChange`] carrying the state before the change and
//! completed by a [`PipelineEvent::Changed`]; the controller pairs the two into
//! a [`HistoryUndo`] record. Undo and redo pop such a record, reconcile the
//! restored snapshot with the live registry, commit it under the history lock
//! and persist it.
//!
//! ```ignore
//! let context = PipelineContext::new(develop, MemoryHost::new(), NoUi);
//! let mut history = HistoryController::new(context, DEFAULT_MAX_UNDO);
//!
//! history.edit_module(exposure, params, true)?;
//! history.undo()?;
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::develop::Develop;
use crate::error::{HistoryError, HistoryResult};
use crate::history::{HistoryItem, HistoryUndo, Snapshot, history_items};
use crate::host::{MemoryHost, ModuleUi, NoUi, PipelineHost};
use crate::module::{ModuleId, ModuleInstance};
use crate::reconcile::Reconciler;
use crate::undo::{UndoAction, UndoKind, UndoStack};

/// Notifications about the develop history, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// The history is about to change; carries the state before the change.
    WillChange(Snapshot),
    /// The history changed.
    Changed,
    /// An instance was deleted by the user.
    ModuleRemoved(ModuleId),
}

/// Observer of [`PipelineEvent`]s, called after the controller handled the
/// event. `items` is the history list at that point.
pub trait HistoryListener: Send {
    fn on_event(&mut self, event: &PipelineEvent, items: &[HistoryItem]);
}

/// Everything the controller works on: the develop state behind the history
/// lock, its persistent storage and the module UI.
pub struct PipelineContext {
    develop: Arc<Mutex<Develop>>,
    host: Box<dyn PipelineHost>,
    ui: Box<dyn ModuleUi>,
}

impl PipelineContext {
    pub fn new(develop: Develop, host: impl PipelineHost, ui: impl ModuleUi) -> Self {
        Self {
            develop: Arc::new(Mutex::new(develop)),
            host: Box::new(host),
            ui: Box::new(ui),
        }
    }

    /// Context with in-memory storage and no UI.
    pub fn headless(develop: Develop) -> Self {
        Self::new(develop, MemoryHost::new(), NoUi)
    }

    /// Locks the develop state.
    pub fn develop(&self) -> MutexGuard<'_, Develop> {
        self.develop.lock()
    }

    /// The develop state for readers outside the controller, e.g. render
    /// workers. They must hold the lock while reading.
    pub fn shared_develop(&self) -> Arc<Mutex<Develop>> {
        Arc::clone(&self.develop)
    }

    /// Writes the live history and reads it back.
    fn persist(&mut self) -> HistoryResult {
        let mut dev = self.develop.lock();
        self.host.write_history(&dev)?;
        self.host.reload_history_items(&mut dev)?;
        dev.resync_modules_order();
        Ok(())
    }

    fn reorder_ui(&mut self) {
        let ids = self.develop.lock().iop.ids().to_vec();
        self.ui.reorder_modules(&ids);
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("develop", &self.develop)
            .finish_non_exhaustive()
    }
}

/// Result of popping one history record.
#[derive(Debug, Clone, PartialEq)]
pub struct PopReport {
    pub action: UndoAction,
    /// Cursor of the restored history.
    pub history_end: usize,
    pub topology_changed: bool,
    /// Instances recreated to restore the history.
    pub created: Vec<ModuleId>,
    /// Instances retired because the restored history does not use them.
    pub retired: Vec<ModuleId>,
    /// Entries that could not be resolved.
    pub failures: Vec<HistoryError>,
}

/// Records history changes on the undo stack and restores them.
pub struct HistoryController {
    context: PipelineContext,
    undo: UndoStack,
    /// Cleared while a pop is in progress so its own change is not recorded.
    record_undo: bool,
    previous: Option<Snapshot>,
    /// Set by the first `WillChange` of a change, cleared by its `Changed`.
    will_change_latched: bool,
    listeners: Vec<Box<dyn HistoryListener>>,
}

impl HistoryController {
    pub fn new(context: PipelineContext, max_undo: usize) -> Self {
        Self {
            context,
            undo: UndoStack::new(max_undo),
            record_undo: true,
            previous: None,
            will_change_latched: false,
            listeners: Vec::new(),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Locks the develop state.
    pub fn develop(&self) -> MutexGuard<'_, Develop> {
        self.context.develop()
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    pub fn undo_stack_mut(&mut self) -> &mut UndoStack {
        &mut self.undo
    }

    /// Whether the next `Changed` will be recorded.
    pub fn is_recording(&self) -> bool {
        self.record_undo
    }

    /// Appends a listener; listeners are called in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn HistoryListener>) {
        self.listeners.push(listener);
    }

    /// The current history list.
    pub fn history_items(&self) -> Vec<HistoryItem> {
        history_items(&self.context.develop())
    }

    /// Handles an event, then forwards it to the listeners.
    ///
    /// Must not be called with the develop lock held.
    pub fn dispatch(&mut self, event: PipelineEvent) {
        match &event {
            PipelineEvent::WillChange(snapshot) => {
                if self.record_undo && !self.will_change_latched {
                    self.previous = Some(snapshot.clone());
                    self.will_change_latched = true;
                }
            }
            PipelineEvent::Changed => {
                self.will_change_latched = false;
                if self.record_undo {
                    let before = self.previous.take().unwrap_or_default();
                    let after = self.context.develop().snapshot();
                    log::debug!(
                        "recording history change {}/{} -> {}/{}",
                        before.end(),
                        before.len(),
                        after.end(),
                        after.len()
                    );
                    self.undo
                        .record(UndoKind::HISTORY, Box::new(HistoryUndo::new(before, after)));
                } else {
                    self.previous = None;
                    self.record_undo = true;
                }
            }
            PipelineEvent::ModuleRemoved(id) => {
                let id = *id;
                let touched = self
                    .undo
                    .iterate_mut::<HistoryUndo>(UndoKind::HISTORY, |record| {
                        record.invalidate_module(id);
                    });
                log::debug!("module {id} removed, invalidated {touched} undo records");
            }
        }

        if !self.listeners.is_empty() {
            let items = history_items(&self.context.develop());
            for listener in &mut self.listeners {
                listener.on_event(&event, &items);
            }
        }
    }

    fn will_change(&mut self) {
        let snapshot = self.context.develop().snapshot();
        self.dispatch(PipelineEvent::WillChange(snapshot));
    }

    /// Forgets the pending `WillChange` when the change it announced failed.
    fn abandon_on_err<T>(&mut self, result: HistoryResult<T>) -> HistoryResult<T> {
        if let Err(e) = &result {
            log::debug!("history change abandoned: {e}");
            self.previous = None;
            self.will_change_latched = false;
        }
        result
    }

    /// Sets parameters and enabled state of an instance, recording a history
    /// step. Returns the new cursor.
    pub fn edit_module(
        &mut self,
        id: ModuleId,
        params: Vec<u8>,
        enabled: bool,
    ) -> HistoryResult<usize> {
        self.will_change();
        let result = self.context.develop().edit_module(id, params, enabled);
        let end = self.abandon_on_err(result)?;
        self.dispatch(PipelineEvent::Changed);
        Ok(end)
    }

    /// Records the current state of an instance as a history step.
    pub fn add_history_item(&mut self, id: ModuleId) -> HistoryResult<usize> {
        self.will_change();
        let result = self.context.develop().add_history_item(id);
        let end = self.abandon_on_err(result)?;
        self.dispatch(PipelineEvent::Changed);
        Ok(end)
    }

    /// Creates a new instance of the operation of `id`.
    pub fn duplicate_module(&mut self, id: ModuleId) -> HistoryResult<ModuleId> {
        self.will_change();
        let result = self.context.develop().duplicate_module(id);
        let new_id = self.abandon_on_err(result)?;
        let module = self.context.develop().iop.get(new_id).cloned();
        if let Some(module) = module.filter(|m| !m.is_hidden()) {
            self.context.ui.add_expander(new_id, &module);
        }
        self.context.reorder_ui();
        self.dispatch(PipelineEvent::Changed);
        Ok(new_id)
    }

    /// Deletes an instance and its history steps.
    pub fn delete_module(&mut self, id: ModuleId) -> HistoryResult {
        self.will_change();
        let result = self.context.develop().delete_module(id);
        self.abandon_on_err(result)?;
        self.context.ui.hide_expander(id);
        self.context.reorder_ui();
        self.dispatch(PipelineEvent::ModuleRemoved(id));
        self.dispatch(PipelineEvent::Changed);
        Ok(())
    }

    /// Moves the history cursor to `num` (the cursor of a history list row).
    pub fn pop_history_items(&mut self, num: usize) -> HistoryResult {
        self.will_change();
        let result = self.context.develop().pop_history_items(num);
        self.abandon_on_err(result)?;
        self.context.reorder_ui();
        self.dispatch(PipelineEvent::Changed);
        Ok(())
    }

    /// Gives the editing focus to an instance.
    pub fn request_focus(&mut self, id: Option<ModuleId>) -> HistoryResult {
        self.context.develop().request_focus(id)
    }

    /// Compresses the history to one step per instance, discarding the steps
    /// past the cursor. Returns the new cursor.
    pub fn compress_history(&mut self) -> HistoryResult<usize> {
        self.will_change();
        let result = self.compress_stored();
        self.dispatch(PipelineEvent::Changed);
        result
    }

    fn compress_stored(&mut self) -> HistoryResult<usize> {
        let context = &mut self.context;
        let mut dev = context.develop.lock();
        // The store compresses what it holds, so it must hold the live history.
        context.host.write_history(&dev)?;
        let end = context.host.compress_history(dev.image_id())?;
        context.host.reload_history_items(&mut dev)?;
        context.host.write_history(&dev)?;
        context.host.reload_history_items(&mut dev)?;
        if dev.history_end() != end {
            log::warn!(
                "compressed history cursor is {} but storage reports {end}",
                dev.history_end()
            );
        }
        log::info!("compressed history to {} items", dev.history().len());
        Ok(dev.history_end())
    }

    /// Restores the state before the most recent history change.
    pub fn undo(&mut self) -> HistoryResult<PopReport> {
        self.pop(UndoAction::Undo)
    }

    /// Restores the state after the most recently undone history change.
    pub fn redo(&mut self) -> HistoryResult<PopReport> {
        self.pop(UndoAction::Redo)
    }

    /// Pops a history record and makes its snapshot the live history.
    ///
    /// The snapshot is reconciled against a copy of the registry outside the
    /// history lock; the lock is taken only to commit the result.
    pub fn pop(&mut self, action: UndoAction) -> HistoryResult<PopReport> {
        let nothing = match action {
            UndoAction::Undo => HistoryError::NothingToUndo,
            UndoAction::Redo => HistoryError::NothingToRedo,
        };
        let item = match action {
            UndoAction::Undo => self.undo.undo(UndoKind::HISTORY),
            UndoAction::Redo => self.undo.redo(UndoKind::HISTORY),
        };
        let Some(item) = item else {
            return Err(nothing);
        };
        let Some(record) = item.as_any_mut().downcast_mut::<HistoryUndo>() else {
            log::error!("history undo record of unexpected type");
            return Err(nothing);
        };
        let mut target = record.target(action).clone();

        let mut iop = self.context.develop().iop.clone();
        let outcome = Reconciler::new(&mut iop, &mut self.undo).run(target.entries_mut());

        // The changes below are ours, not the user's.
        self.record_undo = false;

        let (created, retired) = {
            let mut dev = self.context.develop();
            dev.iop = iop;
            dev.commit(target);
            if outcome.topology_changed {
                dev.mark_topology_changed();
            }
            dev.resync_modules_order();
            dev.apply_history();
            dev.drop_stale_focus();

            let created: Vec<(ModuleId, ModuleInstance)> = outcome
                .created
                .iter()
                .filter_map(|&id| dev.iop.get(id).map(|m| (id, m.clone())))
                .collect();
            let retired: Vec<ModuleId> = outcome
                .retired
                .iter()
                .copied()
                .filter(|&id| dev.iop.get(id).is_some_and(|m| !m.is_hidden()))
                .collect();
            (created, retired)
        };

        for id in retired {
            self.context.ui.hide_expander(id);
        }
        for (id, module) in created.iter().filter(|(_, m)| !m.is_hidden()) {
            self.context.ui.add_expander(*id, module);
        }
        if outcome.topology_changed {
            self.context.reorder_ui();
        }

        let persisted = self.context.persist();
        let history_end = self.context.develop().history_end();
        log::info!("{action} restored history at {history_end}");
        self.dispatch(PipelineEvent::Changed);
        persisted?;

        Ok(PopReport {
            action,
            history_end,
            topology_changed: outcome.topology_changed,
            created: outcome.created,
            retired: outcome.retired,
            failures: outcome.failures,
        })
    }
}

impl fmt::Debug for HistoryController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryController")
            .field("undo", &self.undo)
            .field("record_undo", &self.record_undo)
            .field("previous", &self.previous.as_ref().map(Snapshot::len))
            .field("will_change_latched", &self.will_change_latched)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
