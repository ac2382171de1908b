//! Lock-free float cells shared between control threads and the audio thread.
//!
//! Values are stored as `f32` bit patterns in `AtomicU32`. An overlay cell
//! reserves one quiet-NaN pattern as its "absent" marker; non-finite writes
//! are rejected upstream, so the marker never collides with a real value.

use std::sync::atomic::{AtomicU32, Ordering};

/// Bit pattern marking an empty overlay entry.
const ABSENT: u32 = 0x7FC0_DEAD;

/// An `f32` readable and writable from any thread.
#[derive(Debug)]
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// One per-voice override: either absent or a finite value.
#[derive(Debug)]
pub(crate) struct OverlayCell(AtomicU32);

impl OverlayCell {
    pub(crate) fn empty() -> Self {
        Self(AtomicU32::new(ABSENT))
    }

    #[inline]
    pub(crate) fn get(&self) -> Option<f32> {
        let bits = self.0.load(Ordering::Acquire);
        (bits != ABSENT).then(|| f32::from_bits(bits))
    }

    #[inline]
    pub(crate) fn set(&self, value: f32) {
        debug_assert!(value.is_finite());
        self.0.store(value.to_bits(), Ordering::Release);
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.0.store(ABSENT, Ordering::Release);
    }
}
