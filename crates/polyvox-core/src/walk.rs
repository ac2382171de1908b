//! Interface walk traits.
//!
//! A compiled unit describes its controls by driving an [`InterfaceWalker`]
//! through nested groups. The [`ParamTable`](crate::ParamTable) is built from
//! that walk exactly once; afterwards every [`ControlSurface`] receives a
//! replay of the same structure, with ids and metadata resolved.
//!
//! ```text
//! unit.declare_interface(&mut walker)   (once, at construction)
//!          │
//!          ▼
//!     ParamTable ──replay──► ControlSurface (MIDI, network, JSON, host, ...)
//! ```

use crate::param::{ControlKind, ParamDescriptor, ParamRange};

/// Layout of a control group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Tabbed group.
    Tab,
    /// Horizontal box.
    Horizontal,
    /// Vertical box.
    Vertical,
}

impl GroupKind {
    /// Short type name used by introspection documents.
    pub const fn type_name(self) -> &'static str {
        match self {
            GroupKind::Tab => "tgroup",
            GroupKind::Horizontal => "hgroup",
            GroupKind::Vertical => "vgroup",
        }
    }
}

/// Unit-facing visitor: receives a unit's declared interface.
///
/// `declare` attaches a key/value annotation to the next group or control
/// opened by the walk.
pub trait InterfaceWalker {
    /// Opens a nested group.
    fn open_group(&mut self, kind: GroupKind, label: &str);

    /// Closes the innermost open group.
    fn close_group(&mut self);

    /// Declares a value control.
    fn add_control(&mut self, label: &str, kind: ControlKind, range: ParamRange);

    /// Declares a sound-file slot.
    fn add_soundfile(&mut self, label: &str, url: &str);

    /// Annotates the next group or control.
    fn declare(&mut self, key: &str, value: &str);
}

/// Surface-facing visitor: receives the replayed walk of a built table.
///
/// Every surface observes the same order: annotations for an item arrive
/// through [`annotate`](Self::annotate) immediately before the item itself.
pub trait ControlSurface {
    /// Opens a nested group.
    fn open_group(&mut self, kind: GroupKind, label: &str);

    /// Closes the innermost open group.
    fn close_group(&mut self);

    /// Adds a value control. The descriptor carries id, path, range and metadata.
    fn add_control(&mut self, label: &str, param: &ParamDescriptor);

    /// Adds a sound-file slot.
    fn add_soundfile(&mut self, _label: &str, _url: &str) {}

    /// Annotation for the next group, control or sound-file slot.
    fn annotate(&mut self, _key: &str, _value: &str) {}
}
