//! Voice handles, scopes and lifecycle states.

use core::fmt;

/// Opaque reference to one allocation of a voice slot.
///
/// A handle stays valid until its slot is freed or recycled; after that every
/// operation through it fails with a stale-voice error instead of touching
/// whichever note now occupies the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    index: u32,
    generation: u64,
}

impl VoiceHandle {
    /// Bits of the packed form holding the slot index.
    const INDEX_BITS: u32 = 16;

    pub(crate) const fn new(index: usize, generation: u64) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    /// Slot index in the pool.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Allocation generation of the slot when this handle was issued.
    #[inline]
    pub const fn generation(self) -> u64 {
        self.generation
    }

    /// Packs the handle into one integer for hosts that only pass numbers.
    ///
    /// Low 16 bits hold the index, the remaining bits the generation.
    pub const fn to_raw(self) -> u64 {
        (self.generation << Self::INDEX_BITS) | (self.index as u64 & 0xFFFF)
    }

    /// Inverse of [`to_raw`](Self::to_raw).
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: (raw & 0xFFFF) as u32,
            generation: raw >> Self::INDEX_BITS,
        }
    }
}

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice {}#{}", self.index, self.generation)
    }
}

/// Target of a parameter read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceScope {
    /// The global value, shared by voices without an override.
    Global,
    /// One voice's overlay.
    Voice(VoiceHandle),
}

impl From<VoiceHandle> for VoiceScope {
    fn from(handle: VoiceHandle) -> Self {
        VoiceScope::Voice(handle)
    }
}

/// Lifecycle of a voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VoiceState {
    /// Silent and available.
    Free = 0,
    /// Playing a held note.
    Active = 1,
    /// Rendering its decay; freed once silent.
    Releasing = 2,
}

impl VoiceState {
    #[inline]
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => VoiceState::Active,
            2 => VoiceState::Releasing,
            _ => VoiceState::Free,
        }
    }

    /// Returns `true` for active and releasing voices.
    #[inline]
    pub const fn is_sounding(self) -> bool {
        !matches!(self, VoiceState::Free)
    }
}
