use super::HistoryEntry;
use crate::develop::Develop;
use crate::module::{ModuleFlags, ModuleInstance};

/// Operation whose entries always show as enabled in the history list.
const MASK_MANAGER_OP: &str = "mask_manager";

/// One row of the history list shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    /// Value of the history cursor when this row is activated. The
    /// "original" row has cursor `0`, the entry `n` has cursor `n + 1`.
    pub cursor: usize,
    pub label: String,
    pub enabled: bool,
    pub default_enabled: bool,
    pub hide_enable_button: bool,
    pub deprecated: bool,
    /// The row matching the current history cursor.
    pub selected: bool,
}

impl HistoryItem {
    fn original(history_end: usize) -> Self {
        Self {
            cursor: 0,
            label: "original".to_string(),
            enabled: true,
            default_enabled: false,
            hide_enable_button: false,
            deprecated: false,
            selected: history_end == 0,
        }
    }

    fn for_entry(num: usize, entry: &HistoryEntry, module: Option<&ModuleInstance>, history_end: usize) -> Self {
        let name = module.map_or(entry.op.as_str(), |m| m.name.as_str());
        let flags = module.map_or(ModuleFlags::empty(), |m| m.flags);
        Self {
            cursor: num + 1,
            label: label(name, &entry.multi_name),
            enabled: entry.enabled || entry.op == MASK_MANAGER_OP,
            default_enabled: flags.contains(ModuleFlags::DEFAULT_ENABLED),
            hide_enable_button: flags.contains(ModuleFlags::HIDE_ENABLE_BUTTON),
            deprecated: flags.contains(ModuleFlags::DEPRECATED),
            selected: num + 1 == history_end,
        }
    }
}

/// Display label of an entry: the module name, followed by the instance name
/// of a multi-instance clone.
fn label(name: &str, multi_name: &str) -> String {
    if multi_name.is_empty() || multi_name == "0" {
        name.to_string()
    } else {
        format!("{name} {multi_name}")
    }
}

/// Builds the history list: the "original" row followed by one row per entry,
/// oldest first.
pub fn history_items(dev: &Develop) -> Vec<HistoryItem> {
    let history_end = dev.history_end();
    std::iter::once(HistoryItem::original(history_end))
        .chain(dev.history().iter().enumerate().map(|(num, entry)| {
            // An unresolved entry takes the static properties of any live
            // instance of its operation.
            let module = entry
                .module
                .or_else(|| dev.iop.find(&entry.op))
                .and_then(|id| dev.iop.get(id));
            HistoryItem::for_entry(num, entry, module, history_end)
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{IopOrder, ModuleRegistry};

    fn develop() -> Develop {
        let mut iop = ModuleRegistry::new();
        iop.insert(
            ModuleInstance::new("exposure", "Exposure", 10.0)
                .with_flags(ModuleFlags::DEFAULT_ENABLED | ModuleFlags::HIDE_ENABLE_BUTTON),
        );
        iop.insert(ModuleInstance::new("colorzones", "Color zones", 20.0).with_flags(ModuleFlags::DEPRECATED));
        iop.insert(ModuleInstance::new(MASK_MANAGER_OP, "Mask manager", 0.5));
        Develop::with_modules(iop)
    }

    #[test]
    fn original_row_comes_first() {
        let dev = develop();
        let items = history_items(&dev);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "original");
        assert!(items[0].selected);
    }

    #[test]
    fn rows_follow_history_and_cursor() {
        let mut dev = develop();
        let exposure = dev.iop.find("exposure").unwrap();
        let zones = dev.iop.find("colorzones").unwrap();
        let masks = dev.iop.find(MASK_MANAGER_OP).unwrap();
        dev.add_history_item(exposure).unwrap();
        dev.add_history_item(zones).unwrap();
        dev.iop.get_mut(masks).unwrap().enabled = false;
        dev.add_history_item(masks).unwrap();
        dev.pop_history_items(2).unwrap();

        let items = history_items(&dev);
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["original", "Exposure", "Color zones", "Mask manager"]);
        let selected: Vec<usize> = items.iter().filter(|i| i.selected).map(|i| i.cursor).collect();
        assert_eq!(selected, vec![2]);

        assert!(items[1].default_enabled && items[1].hide_enable_button);
        assert!(items[2].deprecated);
        assert!(!items[2].enabled);
        assert!(items[3].enabled);
    }

    #[test]
    fn multi_name_suffix() {
        assert_eq!(label("Color zones", ""), "Color zones");
        assert_eq!(label("Color zones", "0"), "Color zones");
        assert_eq!(label("Color zones", "skin"), "Color zones skin");
    }

    #[test]
    fn unresolved_entry_uses_operation_properties() {
        let dev = develop();
        let entry = HistoryEntry {
            module: None,
            op: "exposure".into(),
            multi_priority: 1,
            multi_name: "1".into(),
            enabled: true,
            iop_order: IopOrder(10.0),
            params: Vec::new(),
        };
        let module = dev.iop.find("exposure").and_then(|id| dev.iop.get(id));
        let item = HistoryItem::for_entry(0, &entry, module, 1);
        assert_eq!(item.label, "Exposure 1");
        assert!(item.selected);
        assert!(item.default_enabled);
    }
}
