//! Undo/redo record lists.
//!
//! [`UndoStack`] keeps a linear undo list and a redo list of [`UndoItem`]
//! trait objects, each tagged with an [`UndoKind`]. Recording a new item
//! clears the redo records of the same kind (standard editor behavior).

use std::collections::VecDeque;
use std::fmt;

use super::item::{UndoItem, UndoKind};

/// Default maximum number of undo steps.
pub const DEFAULT_MAX_UNDO: usize = 100;

#[derive(Debug)]
struct UndoRecord {
    kind: UndoKind,
    item: Box<dyn UndoItem>,
}

/// Type-keyed undo/redo stack.
///
/// The undo list is a bounded [`VecDeque`]: when it exceeds `max_undo`, the
/// oldest record is dropped from the front. The redo list is an unbounded
/// [`Vec`] (it can never grow larger than the undo list was).
///
/// Undo and redo never run the records themselves. They move the most recent
/// record matching the filter to the other list and hand it back to the
/// caller, who restores the state the record describes.
///
/// # Example
///
/// ```ignore
/// let mut stack = UndoStack::new(50);
/// stack.record(UndoKind::HISTORY, Box::new(HistoryUndo::new(before, after)));
///
/// if let Some(item) = stack.undo(UndoKind::HISTORY) {
///     let record = item.as_any_mut().downcast_mut::<HistoryUndo>().unwrap();
///     restore(&record.before);
/// }
/// ```
pub struct UndoStack {
    undo_stack: VecDeque<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    max_undo: usize,
}

impl UndoStack {
    /// Creates an empty stack with the given maximum undo depth.
    pub fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo,
        }
    }

    /// Pushes a record onto the undo list.
    ///
    /// Redo records of the same kind become unreachable and are dropped.
    pub fn record(&mut self, kind: UndoKind, item: Box<dyn UndoItem>) {
        log::trace!("recording undo item '{}' ({kind:?})", item.description());
        self.redo_stack.retain(|record| !record.kind.intersects(kind));
        self.undo_stack.push_back(UndoRecord { kind, item });
        self.evict();
    }

    /// Moves the most recent undo record matching `filter` to the redo list.
    ///
    /// Returns the record, or `None` when no record matches.
    pub fn undo(&mut self, filter: UndoKind) -> Option<&mut dyn UndoItem> {
        let pos = self
            .undo_stack
            .iter()
            .rposition(|record| record.kind.intersects(filter))?;
        let record = self.undo_stack.remove(pos)?;
        self.redo_stack.push(record);
        let record = self.redo_stack.last_mut()?;
        Some(record.item.as_mut())
    }

    /// Moves the most recent redo record matching `filter` back to the undo
    /// list.
    ///
    /// Returns the record, or `None` when no record matches.
    pub fn redo(&mut self, filter: UndoKind) -> Option<&mut dyn UndoItem> {
        let pos = self
            .redo_stack
            .iter()
            .rposition(|record| record.kind.intersects(filter))?;
        let record = self.redo_stack.remove(pos);
        self.undo_stack.push_back(record);
        self.evict();
        let record = self.undo_stack.back_mut()?;
        Some(record.item.as_mut())
    }

    /// Calls `visitor` on every stored record matching `filter` whose
    /// concrete type is `T`, undo list first (oldest to newest), then the
    /// redo list.
    ///
    /// Returns the number of records visited.
    pub fn iterate_mut<T: UndoItem>(
        &mut self,
        filter: UndoKind,
        mut visitor: impl FnMut(&mut T),
    ) -> usize {
        let mut visited = 0;
        for record in self
            .undo_stack
            .iter_mut()
            .chain(self.redo_stack.iter_mut())
            .filter(|record| record.kind.intersects(filter))
        {
            if let Some(item) = record.item.as_mut().as_any_mut().downcast_mut::<T>() {
                visitor(item);
                visited += 1;
            }
        }
        visited
    }

    /// Returns `true` if a record matching `filter` can be undone.
    pub fn can_undo(&self, filter: UndoKind) -> bool {
        self.undo_stack
            .iter()
            .any(|record| record.kind.intersects(filter))
    }

    /// Returns `true` if a record matching `filter` can be redone.
    pub fn can_redo(&self, filter: UndoKind) -> bool {
        self.redo_stack
            .iter()
            .any(|record| record.kind.intersects(filter))
    }

    /// Returns an iterator over undo descriptions, most recent first.
    pub fn undo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.undo_stack.iter().rev().map(|r| r.item.description())
    }

    /// Returns an iterator over redo descriptions, most recent first.
    pub fn redo_descriptions(&self) -> impl Iterator<Item = &str> {
        self.redo_stack.iter().rev().map(|r| r.item.description())
    }

    /// Returns the number of records in the undo list.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Returns the number of records in the redo list.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Returns the maximum undo depth.
    pub fn max_undo(&self) -> usize {
        self.max_undo
    }

    /// Drops every record matching `filter` from both lists.
    pub fn clear(&mut self, filter: UndoKind) {
        self.undo_stack.retain(|record| !record.kind.intersects(filter));
        self.redo_stack.retain(|record| !record.kind.intersects(filter));
    }

    fn evict(&mut self) {
        while self.undo_stack.len() > self.max_undo {
            if let Some(record) = self.undo_stack.pop_front() {
                log::debug!("undo depth exceeded, dropping '{}'", record.item.description());
            }
        }
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl fmt::Debug for UndoStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoStack")
            .field("undo_count", &self.undo_stack.len())
            .field("redo_count", &self.redo_stack.len())
            .field("max_undo", &self.max_undo)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Rating {
        before: u8,
        after: u8,
    }

    impl UndoItem for Rating {
        fn description(&self) -> &str {
            "Rating"
        }
    }

    #[derive(Debug)]
    struct Tag {
        name: &'static str,
    }

    impl UndoItem for Tag {
        fn description(&self) -> &str {
            self.name
        }
    }

    fn rating(before: u8, after: u8) -> Box<dyn UndoItem> {
        Box::new(Rating { before, after })
    }

    fn as_rating(item: &dyn UndoItem) -> &Rating {
        item.as_any().downcast_ref::<Rating>().unwrap()
    }

    #[test]
    fn record_pushes_to_undo_list() {
        let mut stack = UndoStack::new(DEFAULT_MAX_UNDO);
        stack.record(UndoKind::RATINGS, rating(0, 3));

        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);
        assert!(stack.can_undo(UndoKind::RATINGS));
        assert!(!stack.can_undo(UndoKind::HISTORY));
    }

    #[test]
    fn undo_moves_record_to_redo_and_returns_it() {
        let mut stack = UndoStack::new(DEFAULT_MAX_UNDO);
        stack.record(UndoKind::RATINGS, rating(0, 3));

        let item = stack.undo(UndoKind::RATINGS).unwrap();
        assert_eq!(as_rating(item).before, 0);
        assert_eq!(stack.undo_count(), 0);
        assert_eq!(stack.redo_count(), 1);

        let item = stack.redo(UndoKind::RATINGS).unwrap();
        assert_eq!(as_rating(item).after, 3);
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);
    }

    #[test]
    fn empty_pops_return_none() {
        let mut stack = UndoStack::default();
        assert!(stack.undo(UndoKind::all()).is_none());
        assert!(stack.redo(UndoKind::all()).is_none());
    }

    #[test]
    fn undo_skips_records_of_other_kinds() {
        let mut stack = UndoStack::new(DEFAULT_MAX_UNDO);
        stack.record(UndoKind::RATINGS, rating(0, 1));
        stack.record(UndoKind::TAGS, Box::new(Tag { name: "landscape" }));

        let item = stack.undo(UndoKind::RATINGS).unwrap();
        assert_eq!(as_rating(item).after, 1);
        assert_eq!(stack.undo_descriptions().collect::<Vec<_>>(), vec!["landscape"]);
        assert!(stack.undo(UndoKind::RATINGS).is_none());
    }

    #[test]
    fn record_clears_redo_of_same_kind_only() {
        let mut stack = UndoStack::new(DEFAULT_MAX_UNDO);
        stack.record(UndoKind::RATINGS, rating(0, 1));
        stack.record(UndoKind::TAGS, Box::new(Tag { name: "sea" }));
        stack.undo(UndoKind::all());
        stack.undo(UndoKind::all());
        assert_eq!(stack.redo_count(), 2);

        stack.record(UndoKind::RATINGS, rating(0, 5));
        assert_eq!(stack.redo_count(), 1);
        assert!(stack.can_redo(UndoKind::TAGS));
        assert!(!stack.can_redo(UndoKind::RATINGS));
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut stack = UndoStack::new(2);
        stack.record(UndoKind::RATINGS, rating(0, 1));
        stack.record(UndoKind::RATINGS, rating(1, 2));
        stack.record(UndoKind::RATINGS, rating(2, 3));

        assert_eq!(stack.undo_count(), 2);
        assert_eq!(as_rating(stack.undo(UndoKind::RATINGS).unwrap()).before, 2);
        assert_eq!(as_rating(stack.undo(UndoKind::RATINGS).unwrap()).before, 1);
        assert!(stack.undo(UndoKind::RATINGS).is_none());
    }

    #[test]
    fn iterate_mut_visits_both_lists() {
        let mut stack = UndoStack::new(DEFAULT_MAX_UNDO);
        stack.record(UndoKind::RATINGS, rating(0, 1));
        stack.record(UndoKind::TAGS, Box::new(Tag { name: "sky" }));
        stack.record(UndoKind::RATINGS, rating(1, 2));
        stack.undo(UndoKind::RATINGS);

        let visited = stack.iterate_mut::<Rating>(UndoKind::RATINGS, |r| r.after += 10);
        assert_eq!(visited, 2);
        assert_eq!(as_rating(stack.redo(UndoKind::RATINGS).unwrap()).after, 12);

        // Filter matches but the concrete type does not.
        assert_eq!(stack.iterate_mut::<Rating>(UndoKind::TAGS, |_| {}), 0);
    }

    #[test]
    fn clear_by_filter() {
        let mut stack = UndoStack::new(DEFAULT_MAX_UNDO);
        stack.record(UndoKind::RATINGS, rating(0, 1));
        stack.record(UndoKind::TAGS, Box::new(Tag { name: "sky" }));
        stack.undo(UndoKind::TAGS);

        stack.clear(UndoKind::TAGS);
        assert_eq!(stack.undo_count(), 1);
        assert_eq!(stack.redo_count(), 0);
        stack.clear(UndoKind::all());
        assert_eq!(stack.undo_count(), 0);
    }

    #[test]
    fn debug_impl() {
        let stack = UndoStack::new(42);
        let debug = format!("{stack:?}");
        assert!(debug.contains("UndoStack"));
        assert!(debug.contains("undo_count"));
        assert_eq!(stack.max_undo(), 42);
    }
}
