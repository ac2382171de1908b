//! Note bindings: controls a pitched voice drives from its note.

use polyvox_core::{NoteRole, ParamId, ParamTable};

/// Converts a MIDI note number to frequency in Hz (A4 = 69 = 440 Hz).
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

/// Note-bound controls of a table, in id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteBindings {
    bound: Vec<(ParamId, NoteRole)>,
}

impl NoteBindings {
    /// Collects every note-bound input control.
    pub fn from_table(table: &ParamTable) -> Self {
        let bound = table
            .iter()
            .filter_map(|d| table.note_role(d.id).map(|role| (d.id, role)))
            .collect();
        Self { bound }
    }

    /// Role bound to `id`, if any.
    pub fn role_of(&self, id: ParamId) -> Option<NoteRole> {
        self.bound
            .iter()
            .find(|(bound, _)| *bound == id)
            .map(|(_, role)| *role)
    }

    /// Iterates `(id, role)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, NoteRole)> + '_ {
        self.bound.iter().copied()
    }

    /// Returns `true` if the table has no note-bound controls.
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

/// Value a note-bound control takes for a sounding note.
///
/// `held` is `false` once the voice is releasing.
#[inline]
pub fn note_value(role: NoteRole, pitch: u8, velocity: u8, held: bool) -> f32 {
    match role {
        NoteRole::Freq => midi_to_freq(pitch),
        NoteRole::Key => f32::from(pitch),
        NoteRole::Gate => {
            if held {
                1.0
            } else {
                0.0
            }
        }
        NoteRole::Gain => f32::from(velocity) / 127.0,
        NoteRole::Velocity => f32::from(velocity),
    }
}
