//! Performance input: MIDI events to notes and parameter values.
//!
//! Note-on allocates a pitched voice, note-off (or note-on with velocity 0)
//! softly releases it. Controller 123 releases every voice, controller 120
//! silences every voice at once.
//!
//! Controls opt into further mappings with `midi` metadata:
//!
//! | Metadata | Source | Value |
//! |----------|--------|-------|
//! | `ctrl N [chan]` | controller N | 0..127 over the control's range |
//! | `keyon N [chan]` | note-on of key N | velocity over the range |
//! | `keyoff N [chan]` | note-off of key N | velocity over the range |
//! | `key N [chan]` | note-on/off of key N | velocity on, minimum off |
//! | `pitchwheel [chan]` | pitch bend | 0..16383 over the range |
//! | `pgm [chan]` | program change | 0..127 over the range |
//!
//! Channels in metadata are 1-based; `0` or no channel listens on all.

use std::sync::Arc;

use polyvox_core::{ControlSurface, GroupKind, ParamDescriptor, ParamId};
use polyvox_voice::{VoicePool, VoiceScope};

use crate::error::{ControlError, Result};

/// Controller number that silences every voice immediately.
pub const ALL_SOUND_OFF: u8 = 120;

/// Controller number that releases every voice.
pub const ALL_NOTES_OFF: u8 = 123;

/// A channel voice message. Channels are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    /// Key released.
    NoteOff {
        /// Channel 0..=15.
        channel: u8,
        /// Key number.
        pitch: u8,
        /// Release velocity.
        velocity: u8,
    },
    /// Key pressed.
    NoteOn {
        /// Channel 0..=15.
        channel: u8,
        /// Key number.
        pitch: u8,
        /// Velocity; 0 means note-off.
        velocity: u8,
    },
    /// Continuous controller.
    ControlChange {
        /// Channel 0..=15.
        channel: u8,
        /// Controller number.
        controller: u8,
        /// Controller value.
        value: u8,
    },
    /// Program change.
    ProgramChange {
        /// Channel 0..=15.
        channel: u8,
        /// Program number.
        program: u8,
    },
    /// 14-bit pitch bend, centre 8192.
    PitchBend {
        /// Channel 0..=15.
        channel: u8,
        /// Bend value 0..=16383.
        value: u16,
    },
}

impl MidiEvent {
    /// Builds an event from a status type (`0x80`, `0x90`, ...), a channel
    /// and two data bytes. Unsupported types yield `None`.
    pub fn from_parts(status: u8, channel: u8, data1: u8, data2: u8) -> Option<Self> {
        let channel = channel & 0x0F;
        let (d1, d2) = (data1 & 0x7F, data2 & 0x7F);
        match status & 0xF0 {
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                pitch: d1,
                velocity: d2,
            }),
            0x90 => Some(MidiEvent::NoteOn {
                channel,
                pitch: d1,
                velocity: d2,
            }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: d1,
                value: d2,
            }),
            0xC0 => Some(MidiEvent::ProgramChange {
                channel,
                program: d1,
            }),
            0xE0 => Some(MidiEvent::PitchBend {
                channel,
                value: (u16::from(d2) << 7) | u16::from(d1),
            }),
            _ => None,
        }
    }

    /// Parses a raw message (status byte followed by data bytes).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if !(0x80..0xF0).contains(&status) {
            return None;
        }
        let d1 = data.first().copied().unwrap_or(0);
        let d2 = data.get(1).copied().unwrap_or(0);
        Self::from_parts(status, status & 0x0F, d1, d2)
    }

    /// Channel of the event.
    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOff { channel, .. }
            | MidiEvent::NoteOn { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::ProgramChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => channel,
        }
    }
}

/// Event source a control listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMapping {
    /// Controller number.
    Ctrl(u8),
    /// Note-on of one key.
    KeyOn(u8),
    /// Note-off of one key.
    KeyOff(u8),
    /// Note-on and note-off of one key.
    Key(u8),
    /// Pitch bend.
    PitchWheel,
    /// Program change.
    Program,
}

/// One control's `midi` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiBinding {
    /// Target parameter.
    pub id: ParamId,
    /// Event source.
    pub mapping: MidiMapping,
    /// 0-based channel filter; `None` listens on all channels.
    pub channel: Option<u8>,
}

impl MidiBinding {
    /// Parses a `midi` metadata value for `param`.
    pub fn parse(param: &ParamDescriptor, value: &str) -> Result<Self> {
        let invalid = || ControlError::InvalidMidiMapping {
            path: param.path.clone(),
            value: value.to_string(),
        };
        let mut tokens = value.split_whitespace();
        let kind = tokens.next().ok_or_else(invalid)?;

        let mut number = || -> Result<u8> {
            tokens
                .next()
                .and_then(|t| t.parse::<u8>().ok())
                .filter(|&n| n <= 127)
                .ok_or_else(invalid)
        };
        let mapping = match kind {
            "ctrl" => MidiMapping::Ctrl(number()?),
            "keyon" => MidiMapping::KeyOn(number()?),
            "keyoff" => MidiMapping::KeyOff(number()?),
            "key" => MidiMapping::Key(number()?),
            "pitchwheel" => MidiMapping::PitchWheel,
            "pgm" => MidiMapping::Program,
            _ => return Err(invalid()),
        };

        let channel = match tokens.next() {
            None => None,
            Some(t) => match t.parse::<u8>() {
                Ok(0) => None,
                Ok(n @ 1..=16) => Some(n - 1),
                _ => return Err(invalid()),
            },
        };
        if tokens.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            id: param.id,
            mapping,
            channel,
        })
    }

    /// Normalized value this binding takes for `event`, if it responds to it.
    pub fn respond(&self, event: &MidiEvent) -> Option<f32> {
        if self.channel.is_some_and(|c| c != event.channel()) {
            return None;
        }
        let seven_bit = |v: u8| f32::from(v) / 127.0;
        match (self.mapping, *event) {
            (MidiMapping::Ctrl(n), MidiEvent::ControlChange { controller, value, .. })
                if n == controller =>
            {
                Some(seven_bit(value))
            }
            (
                MidiMapping::KeyOn(n) | MidiMapping::Key(n),
                MidiEvent::NoteOn { pitch, velocity, .. },
            ) if n == pitch => Some(seven_bit(velocity)),
            (MidiMapping::KeyOff(n), MidiEvent::NoteOff { pitch, velocity, .. })
                if n == pitch =>
            {
                Some(seven_bit(velocity))
            }
            (MidiMapping::Key(n), MidiEvent::NoteOff { pitch, .. }) if n == pitch => Some(0.0),
            (MidiMapping::PitchWheel, MidiEvent::PitchBend { value, .. }) => {
                Some(f32::from(value) / 16383.0)
            }
            (MidiMapping::Program, MidiEvent::ProgramChange { program, .. }) => {
                Some(seven_bit(program))
            }
            _ => None,
        }
    }
}

/// MIDI control surface over a voice pool.
///
/// Attach it to the engine's parameter walk to collect `midi` mappings,
/// then feed it events with [`handle`](Self::handle).
#[derive(Debug)]
pub struct MidiSurface {
    pool: Arc<VoicePool>,
    bindings: Vec<MidiBinding>,
    rejected: Vec<ControlError>,
    channel: Option<u8>,
}

impl MidiSurface {
    /// Creates a surface listening on all channels.
    pub fn new(pool: Arc<VoicePool>) -> Self {
        Self {
            pool,
            bindings: Vec::new(),
            rejected: Vec::new(),
            channel: None,
        }
    }

    /// Listens on one 0-based channel only; `None` is omni.
    ///
    /// Events on other channels are dropped before any mapping sees them,
    /// including `ctrl`, `pgm` and `pitchwheel` mappings with their own
    /// channel.
    pub fn with_channel(mut self, channel: Option<u8>) -> Self {
        self.channel = channel.map(|c| c & 0x0F);
        self
    }

    /// Mappings collected from metadata.
    pub fn bindings(&self) -> &[MidiBinding] {
        &self.bindings
    }

    /// Metadata values that could not be parsed.
    pub fn rejected(&self) -> &[ControlError] {
        &self.rejected
    }

    /// Applies one event.
    ///
    /// Mapped controls are written globally. Returns the ids that changed.
    /// A note-off with no voice bound to its pitch is reported as an error
    /// after the mapped controls have been updated.
    pub fn handle(&self, event: MidiEvent) -> Result<Vec<ParamId>> {
        if self.channel.is_some_and(|c| c != event.channel()) {
            return Ok(Vec::new());
        }

        let table = self.pool.table();
        let mut changed = Vec::new();
        for binding in &self.bindings {
            let Some(normalized) = binding.respond(&event) else {
                continue;
            };
            let value = table.descriptor(binding.id)?.denormalize(normalized);
            self.pool.set_value(binding.id, value, VoiceScope::Global)?;
            changed.push(binding.id);
        }

        match event {
            MidiEvent::NoteOn {
                pitch, velocity, ..
            } if velocity > 0 => {
                self.pool.allocate_by_pitch(pitch, velocity);
            }
            MidiEvent::NoteOn { pitch, .. } | MidiEvent::NoteOff { pitch, .. } => {
                self.pool.release_pitch(pitch, false)?;
            }
            MidiEvent::ControlChange {
                controller: ALL_NOTES_OFF,
                ..
            } => self.pool.all_notes_off(false),
            MidiEvent::ControlChange {
                controller: ALL_SOUND_OFF,
                ..
            } => self.pool.all_notes_off(true),
            _ => {}
        }
        Ok(changed)
    }
}

impl ControlSurface for MidiSurface {
    fn open_group(&mut self, _kind: GroupKind, _label: &str) {}

    fn close_group(&mut self) {}

    fn add_control(&mut self, _label: &str, param: &ParamDescriptor) {
        if param.is_output() {
            return;
        }
        for (key, value) in &param.meta {
            if key != "midi" {
                continue;
            }
            match MidiBinding::parse(param, value) {
                Ok(binding) => self.bindings.push(binding),
                Err(err) => {
                    tracing::warn!(path = %param.path, %value, "ignoring midi mapping");
                    self.rejected.push(err);
                }
            }
        }
    }
}
