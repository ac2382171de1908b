//! Callback-table surface for a scripting host.
//!
//! A host that cannot implement [`ControlSurface`] directly fills in the
//! callbacks it cares about; missing callbacks are skipped.

use polyvox_core::{ControlKind, ControlSurface, GroupKind, ParamDescriptor, ParamRange};

type GroupFn<'a> = Box<dyn FnMut(GroupKind, &str) + 'a>;
type CloseFn<'a> = Box<dyn FnMut() + 'a>;
type ControlFn<'a> = Box<dyn FnMut(&str, &str, ControlKind, ParamRange) + 'a>;
type SoundfileFn<'a> = Box<dyn FnMut(&str, &str) + 'a>;
type DeclareFn<'a> = Box<dyn FnMut(&str, &str) + 'a>;

/// Optional callbacks, one per walk capability.
///
/// The control callback receives `(label, path, kind, range)`.
#[derive(Default)]
pub struct HostSurface<'a> {
    open_group: Option<GroupFn<'a>>,
    close_group: Option<CloseFn<'a>>,
    add_control: Option<ControlFn<'a>>,
    add_soundfile: Option<SoundfileFn<'a>>,
    declare: Option<DeclareFn<'a>>,
}

impl<'a> HostSurface<'a> {
    /// A surface with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for each group.
    pub fn on_open_group(mut self, f: impl FnMut(GroupKind, &str) + 'a) -> Self {
        self.open_group = Some(Box::new(f));
        self
    }

    /// Called when a group ends.
    pub fn on_close_group(mut self, f: impl FnMut() + 'a) -> Self {
        self.close_group = Some(Box::new(f));
        self
    }

    /// Called for each control.
    pub fn on_add_control(mut self, f: impl FnMut(&str, &str, ControlKind, ParamRange) + 'a) -> Self {
        self.add_control = Some(Box::new(f));
        self
    }

    /// Called for each soundfile control with `(label, url)`.
    pub fn on_add_soundfile(mut self, f: impl FnMut(&str, &str) + 'a) -> Self {
        self.add_soundfile = Some(Box::new(f));
        self
    }

    /// Called for each metadata declaration, before the item it belongs to.
    pub fn on_declare(mut self, f: impl FnMut(&str, &str) + 'a) -> Self {
        self.declare = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for HostSurface<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSurface")
            .field("open_group", &self.open_group.is_some())
            .field("close_group", &self.close_group.is_some())
            .field("add_control", &self.add_control.is_some())
            .field("add_soundfile", &self.add_soundfile.is_some())
            .field("declare", &self.declare.is_some())
            .finish()
    }
}

impl ControlSurface for HostSurface<'_> {
    fn open_group(&mut self, kind: GroupKind, label: &str) {
        if let Some(f) = self.open_group.as_mut() {
            f(kind, label);
        }
    }

    fn close_group(&mut self) {
        if let Some(f) = self.close_group.as_mut() {
            f();
        }
    }

    fn add_control(&mut self, label: &str, param: &ParamDescriptor) {
        if let Some(f) = self.add_control.as_mut() {
            f(label, &param.path, param.kind, param.range);
        }
    }

    fn add_soundfile(&mut self, label: &str, url: &str) {
        if let Some(f) = self.add_soundfile.as_mut() {
            f(label, url);
        }
    }

    fn annotate(&mut self, key: &str, value: &str) {
        if let Some(f) = self.declare.as_mut() {
            f(key, value);
        }
    }
}
