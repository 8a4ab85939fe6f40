//! Processing module instances.
//!
//! Every operation of the develop pipeline (exposure, color zones, ...) has at
//! least one *base* instance with instance priority `0`. Users can clone an
//! operation into further instances with increasing priorities. The
//! [`ModuleRegistry`] keeps every instance ever created in an arena addressed by
//! [`ModuleId`], so history entries can refer to an instance without owning it.

mod registry;

pub use registry::ModuleRegistry;

use std::cmp::Ordering;
use std::fmt;

use bitflags::bitflags;

/// Stable handle to a [`ModuleInstance`] in a [`ModuleRegistry`].
///
/// Ids are never reused: an instance that leaves the pipeline is parked in the
/// registry's retired pool and its id keeps resolving to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u32);

impl ModuleId {
    /// Id of arena slot `index`. Registries are limited to `u32::MAX`
    /// instances; larger indices saturate.
    pub(crate) fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => Self(index),
            Err(_) => {
                log::error!("module index {index} out of id range");
                Self(u32::MAX)
            }
        }
    }

    /// Position of the instance in the registry arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of an instance in the processing pipeline.
///
/// Lower values are applied to the image first. Orders are totally ordered
/// (via [`f64::total_cmp`]) so the registry can sort on them.
#[derive(Debug, Clone, Copy, Default)]
pub struct IopOrder(pub f64);

impl IopOrder {
    /// An order strictly between `self` and `next`, or one step after `self`
    /// when there is no following instance. When `next` shares the order of
    /// `self` the order is kept and the instance priority decides.
    pub fn between(self, next: Option<IopOrder>) -> IopOrder {
        match next {
            Some(next) if next.0 > self.0 => IopOrder((self.0 + next.0) / 2.0),
            Some(_) => self,
            None => IopOrder(self.0 + 1.0),
        }
    }
}

impl PartialEq for IopOrder {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IopOrder {}

impl PartialOrd for IopOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IopOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

bitflags! {
    /// Static properties of an operation, shared by all of its instances.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModuleFlags: u32 {
        /// Never shown in the UI and always active (e.g. raw input stages).
        const HIDDEN = 1 << 0;
        /// Enabled without the user switching it on.
        const DEFAULT_ENABLED = 1 << 1;
        /// Kept for old edits only; new edits should not use it.
        const DEPRECATED = 1 << 2;
        /// The on/off switch is not offered to the user.
        const HIDE_ENABLE_BUTTON = 1 << 3;
        /// The operation cannot be cloned into further instances.
        const ONE_INSTANCE = 1 << 4;
    }
}

/// One instance of a processing operation in the develop pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInstance {
    /// Operation name, e.g. `"exposure"`.
    pub op: String,
    /// Human readable operation name.
    pub name: String,
    /// Distinguishes clones of the same operation; `0` is the base instance.
    pub multi_priority: i32,
    /// Display suffix of a multi-instance clone (`"1"`, `"skin"`, ...).
    pub multi_name: String,
    pub iop_order: IopOrder,
    pub enabled: bool,
    pub flags: ModuleFlags,
    /// Current serialized parameters.
    pub params: Vec<u8>,
    /// Parameters of a freshly created instance.
    pub default_params: Vec<u8>,
}

impl ModuleInstance {
    /// Creates the base instance (priority `0`) of an operation.
    pub fn new(op: impl Into<String>, name: impl Into<String>, iop_order: f64) -> Self {
        Self {
            op: op.into(),
            name: name.into(),
            multi_priority: 0,
            multi_name: String::new(),
            iop_order: IopOrder(iop_order),
            enabled: false,
            flags: ModuleFlags::empty(),
            params: Vec::new(),
            default_params: Vec::new(),
        }
    }

    /// Sets the operation flags. A default-enabled operation starts enabled.
    pub fn with_flags(mut self, flags: ModuleFlags) -> Self {
        self.flags = flags;
        self.enabled = flags.contains(ModuleFlags::DEFAULT_ENABLED);
        self
    }

    /// Sets the default parameters, which also become the current ones.
    pub fn with_default_params(mut self, params: impl Into<Vec<u8>>) -> Self {
        self.default_params = params.into();
        self.params = self.default_params.clone();
        self
    }

    /// Creates a further instance of the same operation.
    ///
    /// The configuration (operation, flags, defaults) is copied from `self`;
    /// the parameter values are not: the new instance starts from the defaults.
    pub fn instantiate(
        &self,
        multi_priority: i32,
        multi_name: impl Into<String>,
        iop_order: IopOrder,
    ) -> Self {
        Self {
            op: self.op.clone(),
            name: self.name.clone(),
            multi_priority,
            multi_name: multi_name.into(),
            iop_order,
            enabled: self.default_enabled(),
            flags: self.flags,
            params: self.default_params.clone(),
            default_params: self.default_params.clone(),
        }
    }

    /// Restores the parameters and enabled state of a fresh instance.
    pub fn reset(&mut self) {
        self.params.clone_from(&self.default_params);
        self.enabled = self.default_enabled();
    }

    pub fn is_base(&self) -> bool {
        self.multi_priority == 0
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ModuleFlags::HIDDEN)
    }

    pub fn default_enabled(&self) -> bool {
        self.flags.contains(ModuleFlags::DEFAULT_ENABLED)
    }

    pub fn is_deprecated(&self) -> bool {
        self.flags.contains(ModuleFlags::DEPRECATED)
    }

    /// Ordering of instances in the pipeline: by order, then by instance
    /// priority descending.
    pub fn pipeline_cmp(&self, other: &Self) -> Ordering {
        self.iop_order
            .cmp(&other.iop_order)
            .then_with(|| other.multi_priority.cmp(&self.multi_priority))
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.multi_name.is_empty() {
            write!(f, "{} ({})", self.op, self.multi_priority)
        } else {
            write!(f, "{} {} ({})", self.op, self.multi_name, self.multi_priority)
        }
    }
}
