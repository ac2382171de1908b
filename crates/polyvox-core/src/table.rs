//! Parameter table: the flattened, order-stable registry of a unit's controls.
//!
//! [`ParamTable::build`] walks the unit's declared interface exactly once.
//! Controls receive ids `0..N-1` in declaration order and a path made of the
//! enclosing group labels. The group structure is recorded so that
//! [`ParamTable::replay`] can present the identical walk to any number of
//! [`ControlSurface`]s without re-registering anything.
//!
//! # Labels and paths
//!
//! Labels may carry inline annotations, `"cutoff[unit:Hz][scale:log]"`; they
//! are stripped from the label and stored as metadata. Path segments replace
//! the characters `` #*,?[]{}()`` with `_`. Anonymous groups (empty label or
//! `0x00`) contribute no segment.
//!
//! ```text
//! open_group(Vertical, "synth")
//!   open_group(Horizontal, "env")
//!     add_control("attack")      → id 0, /synth/env/attack
//!   close_group()
//!   add_control("freq")          → id 1, /synth/freq
//! close_group()
//! ```

use std::collections::{HashMap, HashSet};

use crate::error::{ConstructionError, LookupError};
use crate::param::{ControlKind, ParamDescriptor, ParamId, ParamRange, ParamRef, ParamScale};
use crate::unit::DspUnit;
use crate::walk::{ControlSurface, GroupKind, InterfaceWalker};

/// Characters replaced by `_` in path segments.
const PATH_RESERVED: &[char] = &[' ', '#', '*', ',', '?', '[', ']', '{', '}', '(', ')'];

/// Prefix of per-voice addresses (`/voice3/synth/cutoff`).
const VOICE_PREFIX: &str = "/voice";

/// A sound-file slot. Not a value parameter, so it carries no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundfileDescriptor {
    /// Label with inline metadata stripped.
    pub label: String,
    /// Declared location list.
    pub url: String,
    /// Normalized hierarchical path.
    pub path: String,
    /// Annotations in declaration order.
    pub meta: Vec<(String, String)>,
}

/// Role of a control driven by note events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteRole {
    /// Frequency in Hz (`freq`).
    Freq,
    /// MIDI pitch number (`key`).
    Key,
    /// 1 while the note is held, 0 once released (`gate`).
    Gate,
    /// Velocity scaled to 0..1 (`gain`).
    Gain,
    /// Raw MIDI velocity (`vel`, `velocity`).
    Velocity,
}

impl NoteRole {
    /// Classifies a control by its last path segment.
    pub fn from_leaf(leaf: &str) -> Option<Self> {
        match leaf.to_ascii_lowercase().as_str() {
            "freq" => Some(NoteRole::Freq),
            "key" => Some(NoteRole::Key),
            "gate" => Some(NoteRole::Gate),
            "gain" => Some(NoteRole::Gain),
            "vel" | "velocity" => Some(NoteRole::Velocity),
            _ => None,
        }
    }
}

/// One recorded step of the declared walk.
#[derive(Debug, Clone, PartialEq)]
enum WalkItem {
    Open {
        kind: GroupKind,
        label: String,
        meta: Vec<(String, String)>,
    },
    Close,
    Control(ParamId),
    Soundfile(usize),
}

/// Registry of every value control a unit declares.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTable {
    params: Vec<ParamDescriptor>,
    by_path: HashMap<String, ParamId>,
    soundfiles: Vec<SoundfileDescriptor>,
    items: Vec<WalkItem>,
}

impl ParamTable {
    /// Builds the table from a unit's declared interface.
    pub fn build(unit: &dyn DspUnit) -> Result<Self, ConstructionError> {
        Self::from_walk(|walker| unit.declare_interface(walker))
    }

    /// Builds the table from an arbitrary walk.
    pub fn from_walk<F>(walk: F) -> Result<Self, ConstructionError>
    where
        F: FnOnce(&mut dyn InterfaceWalker),
    {
        let mut builder = TableBuilder::default();
        walk(&mut builder);
        let table = builder.finish()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            params = table.params.len(),
            soundfiles = table.soundfiles.len(),
            "parameter table built"
        );

        Ok(table)
    }

    /// Number of value parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the unit declares no value controls.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ParamDescriptor> {
        self.params.iter()
    }

    /// Declared sound-file slots.
    pub fn soundfiles(&self) -> &[SoundfileDescriptor] {
        &self.soundfiles
    }

    /// Looks up the id of a path.
    pub fn id_of(&self, path: &str) -> Result<ParamId, LookupError> {
        self.by_path
            .get(path)
            .copied()
            .ok_or_else(|| LookupError::UnknownPath(path.to_string()))
    }

    /// Returns the descriptor of an id.
    pub fn descriptor(&self, id: ParamId) -> Result<&ParamDescriptor, LookupError> {
        self.params
            .get(id.index())
            .ok_or(LookupError::UnknownId(id.0))
    }

    /// Returns the path of an id.
    pub fn path_of(&self, id: ParamId) -> Result<&str, LookupError> {
        self.descriptor(id).map(|d| d.path.as_str())
    }

    /// Resolves an id-or-path reference to an id.
    pub fn resolve(&self, param: ParamRef<'_>) -> Result<ParamId, LookupError> {
        match param {
            ParamRef::Id(id) => self.descriptor(id).map(|d| d.id),
            ParamRef::Path(path) => self.id_of(path),
        }
    }

    /// Resolves an id-or-path reference to its descriptor.
    pub fn get(&self, param: ParamRef<'_>) -> Result<&ParamDescriptor, LookupError> {
        let id = self.resolve(param)?;
        self.descriptor(id)
    }

    /// Note role of a control, derived from its last path segment.
    pub fn note_role(&self, id: ParamId) -> Option<NoteRole> {
        self.params
            .get(id.index())
            .filter(|d| !d.is_output())
            .and_then(|d| NoteRole::from_leaf(d.leaf()))
    }

    /// Per-voice address of a parameter: `/voice<N><path>` with 1-based N.
    pub fn voice_path(&self, id: ParamId, voice_index: usize) -> Result<String, LookupError> {
        let path = self.path_of(id)?;
        Ok(format!("{VOICE_PREFIX}{}{path}", voice_index + 1))
    }

    /// Splits a per-voice address into `(voice_index, path)`.
    ///
    /// Returns `None` for addresses without a canonical `/voice<N>` prefix.
    pub fn split_voice_path(address: &str) -> Option<(usize, &str)> {
        let rest = address.strip_prefix(VOICE_PREFIX)?;
        let digits = rest.find('/').unwrap_or(rest.len());
        let number = &rest[..digits];
        // Only the canonical form `voice_path` produces: no sign, no leading zero.
        if digits == rest.len()
            || number.starts_with('0')
            || !number.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let n: usize = number.parse().ok()?;
        Some((n - 1, &rest[digits..]))
    }

    /// Replays the recorded walk against a surface.
    ///
    /// Every surface sees the same order of groups, annotations and controls.
    pub fn replay(&self, surface: &mut dyn ControlSurface) {
        for item in &self.items {
            match item {
                WalkItem::Open { kind, label, meta } => {
                    for (k, v) in meta {
                        surface.annotate(k, v);
                    }
                    surface.open_group(*kind, label);
                }
                WalkItem::Close => surface.close_group(),
                WalkItem::Control(id) => {
                    let desc = &self.params[id.index()];
                    for (k, v) in &desc.meta {
                        surface.annotate(k, v);
                    }
                    surface.add_control(&desc.label, desc);
                }
                WalkItem::Soundfile(index) => {
                    let sf = &self.soundfiles[*index];
                    for (k, v) in &sf.meta {
                        surface.annotate(k, v);
                    }
                    surface.add_soundfile(&sf.label, &sf.url);
                }
            }
        }
    }
}

/// Records a walk into descriptors and structure. The first error sticks.
#[derive(Default)]
struct TableBuilder {
    params: Vec<ParamDescriptor>,
    soundfiles: Vec<SoundfileDescriptor>,
    items: Vec<WalkItem>,
    by_path: HashMap<String, ParamId>,
    soundfile_paths: HashSet<String>,
    /// Normalized segment per open group; anonymous groups push `None`.
    segments: Vec<Option<String>>,
    pending_meta: Vec<(String, String)>,
    error: Option<ConstructionError>,
}

impl TableBuilder {
    fn finish(self) -> Result<ParamTable, ConstructionError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.segments.is_empty() {
            return Err(ConstructionError::UnclosedGroups(self.segments.len()));
        }
        Ok(ParamTable {
            params: self.params,
            by_path: self.by_path,
            soundfiles: self.soundfiles,
            items: self.items,
        })
    }

    fn group_path(&self) -> String {
        let mut path = String::new();
        for segment in self.segments.iter().flatten() {
            path.push('/');
            path.push_str(segment);
        }
        path
    }

    /// Takes pending annotations plus inline label annotations; returns the
    /// cleaned label.
    fn take_meta(&mut self, label: &str) -> (String, Vec<(String, String)>) {
        let (clean, inline) = split_label(label);
        let mut meta = std::mem::take(&mut self.pending_meta);
        meta.extend(inline);
        (clean, meta)
    }

    /// Full path for a leaf label, or records an error.
    fn leaf_path(&mut self, clean: &str) -> Option<String> {
        let segment = normalize_segment(clean);
        if segment.is_empty() {
            self.error = Some(ConstructionError::EmptyLabel(self.group_path()));
            return None;
        }
        let path = format!("{}/{segment}", self.group_path());
        if self.by_path.contains_key(&path) || self.soundfile_paths.contains(&path) {
            self.error = Some(ConstructionError::DuplicatePath(path));
            return None;
        }
        Some(path)
    }
}

impl InterfaceWalker for TableBuilder {
    fn open_group(&mut self, kind: GroupKind, label: &str) {
        if self.error.is_some() {
            return;
        }
        let (clean, meta) = self.take_meta(label);
        let segment = if clean.is_empty() || clean == "0x00" {
            None
        } else {
            Some(normalize_segment(&clean))
        };
        self.segments.push(segment);
        self.items.push(WalkItem::Open {
            kind,
            label: clean,
            meta,
        });
    }

    fn close_group(&mut self) {
        if self.error.is_some() {
            return;
        }
        if self.segments.pop().is_none() {
            self.error = Some(ConstructionError::UnbalancedClose {
                controls: self.params.len(),
            });
            return;
        }
        self.pending_meta.clear();
        self.items.push(WalkItem::Close);
    }

    fn add_control(&mut self, label: &str, kind: ControlKind, range: ParamRange) {
        if self.error.is_some() {
            return;
        }
        let (clean, meta) = self.take_meta(label);
        let Some(path) = self.leaf_path(&clean) else {
            return;
        };
        let id = ParamId(self.params.len() as u32);
        let scale = meta
            .iter()
            .find(|(k, _)| k == "scale")
            .map(|(_, v)| ParamScale::from_metadata(v))
            .unwrap_or_default();
        self.by_path.insert(path.clone(), id);
        self.params.push(ParamDescriptor {
            id,
            label: clean,
            path,
            kind,
            range,
            meta,
            scale,
        });
        self.items.push(WalkItem::Control(id));
    }

    fn add_soundfile(&mut self, label: &str, url: &str) {
        if self.error.is_some() {
            return;
        }
        let (clean, meta) = self.take_meta(label);
        let Some(path) = self.leaf_path(&clean) else {
            return;
        };
        self.soundfile_paths.insert(path.clone());
        self.soundfiles.push(SoundfileDescriptor {
            label: clean,
            url: url.to_string(),
            path,
            meta,
        });
        self.items.push(WalkItem::Soundfile(self.soundfiles.len() - 1));
    }

    fn declare(&mut self, key: &str, value: &str) {
        if self.error.is_none() {
            self.pending_meta.push((key.to_string(), value.to_string()));
        }
    }
}

/// Splits `"name[k:v][k2:v2]"` into `("name", [(k, v), (k2, v2)])`.
///
/// Bracketed text without a `:` is dropped.
fn split_label(label: &str) -> (String, Vec<(String, String)>) {
    let mut clean = String::with_capacity(label.len());
    let mut meta = Vec::new();
    let mut rest = label;
    while let Some(open) = rest.find('[') {
        clean.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            clean.push_str(&rest[open..]);
            rest = "";
            break;
        };
        if let Some((k, v)) = after[..close].split_once(':') {
            meta.push((k.trim().to_string(), v.trim().to_string()));
        }
        rest = &after[close + 1..];
    }
    clean.push_str(rest);
    (clean.trim().to_string(), meta)
}

fn normalize_segment(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if PATH_RESERVED.contains(&c) { '_' } else { c })
        .collect()
}
