use super::HistoryEntry;
use crate::module::{IopOrder, ModuleRegistry};

/// Pipeline position of one instance, as stored in an [`OrderList`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEntry {
    pub op: String,
    pub instance: i32,
    pub order: IopOrder,
}

/// Pipeline topology: the order of every instance at some point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderList(Vec<OrderEntry>);

impl OrderList {
    pub fn new(entries: Vec<OrderEntry>) -> Self {
        let mut list = Self(entries);
        list.0.sort_by(|a, b| a.order.cmp(&b.order));
        list
    }

    /// Captures the order of the live instances of a registry.
    pub fn from_registry(iop: &ModuleRegistry) -> Self {
        Self(
            iop.iter()
                .map(|(_, module)| OrderEntry {
                    op: module.op.clone(),
                    instance: module.multi_priority,
                    order: module.iop_order,
                })
                .collect(),
        )
    }

    /// Order recorded for the instance `(op, instance)`.
    pub fn order_of(&self, op: &str, instance: i32) -> Option<IopOrder> {
        self.0
            .iter()
            .find(|entry| entry.op == op && entry.instance == instance)
            .map(|entry| entry.order)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Deep copy of a history list, its cursor and the pipeline order, taken at
/// one point in time.
///
/// The cursor counts the active entries: entries at `end..` are edits that
/// were stepped back over but not yet discarded. `end <= entries.len()` always
/// holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<HistoryEntry>,
    end: usize,
    order: OrderList,
}

impl Snapshot {
    /// Builds a snapshot, clamping an out-of-range cursor.
    pub fn new(entries: Vec<HistoryEntry>, end: usize, order: OrderList) -> Self {
        let end = if end > entries.len() {
            log::warn!(
                "snapshot cursor {end} past the end of a {} item history, clamping",
                entries.len()
            );
            entries.len()
        } else {
            end
        };
        Self {
            entries,
            end,
            order,
        }
    }

    /// Copies a live history into an independently owned snapshot.
    pub fn capture(history: &[HistoryEntry], end: usize, order: &OrderList) -> Self {
        Self::new(history.to_vec(), end, order.clone())
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [HistoryEntry] {
        &mut self.entries
    }

    /// Number of active entries.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn order(&self) -> &OrderList {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_parts(self) -> (Vec<HistoryEntry>, usize, OrderList) {
        (self.entries, self.end, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleInstance;

    fn registry() -> ModuleRegistry {
        let mut iop = ModuleRegistry::new();
        iop.insert(ModuleInstance::new("exposure", "Exposure", 10.0));
        iop.insert(ModuleInstance::new("sharpen", "Sharpen", 30.0));
        iop
    }

    #[test]
    fn cursor_is_clamped_to_length() {
        let snapshot = Snapshot::new(Vec::new(), 4, OrderList::default());
        assert_eq!(snapshot.end(), 0);
    }

    #[test]
    fn capture_does_not_alias_live_history() {
        let iop = registry();
        let id = iop.find("exposure").unwrap();
        let mut live = vec![HistoryEntry::for_module(id, iop.get(id).unwrap())];
        let order = OrderList::from_registry(&iop);

        let snapshot = Snapshot::capture(&live, 1, &order);
        live[0].params = vec![9];
        live[0].module = None;

        assert_eq!(snapshot.entries()[0].module, Some(id));
        assert!(snapshot.entries()[0].params.is_empty());
        assert_eq!(snapshot.end(), 1);
    }

    #[test]
    fn order_list_lookup() {
        let order = OrderList::from_registry(&registry());
        assert_eq!(order.len(), 2);
        assert_eq!(order.order_of("sharpen", 0), Some(IopOrder(30.0)));
        assert_eq!(order.order_of("sharpen", 1), None);
    }

    #[test]
    fn order_list_new_sorts_by_order() {
        let order = OrderList::new(vec![
            OrderEntry {
                op: "b".into(),
                instance: 0,
                order: IopOrder(2.0),
            },
            OrderEntry {
                op: "a".into(),
                instance: 0,
                order: IopOrder(1.0),
            },
        ]);
        let ops: Vec<&str> = order.iter().map(|e| e.op.as_str()).collect();
        assert_eq!(ops, vec!["a", "b"]);
    }
}
