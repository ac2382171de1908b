//! Voice pool: fixed arena of voice slots with a two-level value overlay.
//!
//! The pool is shared between control threads and the audio thread. Control
//! paths (allocation, release, per-voice writes) are serialized by one
//! mutex; the renderer never takes it and only reads atomics, plus one
//! compare-and-swap to retire silent releasing voices.
//!
//! # Slot word
//!
//! Each slot packs its generation and lifecycle state into one `AtomicU64`:
//!
//! ```text
//! word = generation << 2 | state        state: 0 free, 1 active, 2 releasing
//! ```
//!
//! Every transition is a single store or CAS on that word, so the renderer
//! never observes a state belonging to one allocation paired with the
//! generation of another.
//!
//! # Values
//!
//! ```text
//! global[id]                      written by VoiceScope::Global
//! slot.overlay[id]  (sparse)      written by VoiceScope::Voice, cleared on recycle
//! effective = overlay[id] or global[id]
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::Mutex;
use polyvox_core::{
    ConstructionError, LookupError, ParamError, ParamId, ParamRef, ParamTable, ValueError,
};

use crate::atomic::{AtomicF32, OverlayCell};
use crate::binding::NoteBindings;
use crate::handle::{VoiceHandle, VoiceScope, VoiceState};

/// Pitch stored for voices allocated without a note.
pub(crate) const NO_PITCH: u8 = u8::MAX;

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

#[inline]
const fn pack(generation: u64, state: VoiceState) -> u64 {
    (generation << STATE_BITS) | state as u64
}

#[inline]
const fn unpack(word: u64) -> (u64, VoiceState) {
    (word >> STATE_BITS, VoiceState::from_u8((word & STATE_MASK) as u8))
}

/// Shared state of one voice.
#[derive(Debug)]
pub(crate) struct VoiceSlot {
    word: AtomicU64,
    pitch: AtomicU8,
    velocity: AtomicU8,
    overlay: Box<[OverlayCell]>,
    meters: Box<[AtomicF32]>,
}

impl VoiceSlot {
    fn new(table: &ParamTable) -> Self {
        Self {
            word: AtomicU64::new(pack(0, VoiceState::Free)),
            pitch: AtomicU8::new(NO_PITCH),
            velocity: AtomicU8::new(0),
            overlay: table.iter().map(|_| OverlayCell::empty()).collect(),
            meters: table.iter().map(|d| AtomicF32::new(d.range.init)).collect(),
        }
    }

    #[inline]
    pub(crate) fn load(&self) -> (u64, VoiceState) {
        unpack(self.word.load(Ordering::Acquire))
    }

    #[inline]
    fn store(&self, generation: u64, state: VoiceState) {
        self.word.store(pack(generation, state), Ordering::Release);
    }

    /// CAS `(generation, from)` to `(generation, to)`.
    #[inline]
    pub(crate) fn transition(&self, generation: u64, from: VoiceState, to: VoiceState) -> bool {
        self.word
            .compare_exchange(
                pack(generation, from),
                pack(generation, to),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[inline]
    pub(crate) fn pitch(&self) -> u8 {
        self.pitch.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn velocity(&self) -> u8 {
        self.velocity.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn overlay(&self, id: usize) -> Option<f32> {
        self.overlay[id].get()
    }

    #[inline]
    pub(crate) fn set_meter(&self, id: usize, value: f32) {
        self.meters[id].store(value);
    }
}

/// Fixed-capacity voice arena shared by control threads and the renderer.
#[derive(Debug)]
pub struct VoicePool {
    table: Arc<ParamTable>,
    bindings: NoteBindings,
    globals: Box<[AtomicF32]>,
    slots: Box<[VoiceSlot]>,
    /// Next allocation generation; held for every control-path mutation.
    alloc: Mutex<u64>,
}

impl VoicePool {
    /// Creates a pool of `capacity` free voices over `table`.
    ///
    /// Global values start at each control's `init`.
    pub fn new(table: Arc<ParamTable>, capacity: usize) -> Result<Self, ConstructionError> {
        if capacity == 0 || capacity > usize::from(u16::MAX) {
            return Err(ConstructionError::InvalidPolyphony(capacity));
        }
        let globals = table.iter().map(|d| AtomicF32::new(d.range.init)).collect();
        let slots = (0..capacity).map(|_| VoiceSlot::new(&table)).collect();
        Ok(Self {
            bindings: NoteBindings::from_table(&table),
            table,
            globals,
            slots,
            alloc: Mutex::new(0),
        })
    }

    /// The parameter table the pool stores values for.
    pub fn table(&self) -> &Arc<ParamTable> {
        &self.table
    }

    /// Note-bound controls of the table.
    pub fn bindings(&self) -> &NoteBindings {
        &self.bindings
    }

    /// Number of voice slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of active or releasing voices.
    pub fn sounding_count(&self) -> usize {
        self.slots.iter().filter(|s| s.load().1.is_sounding()).count()
    }

    /// Lifecycle state of the slot at `index`.
    pub fn state(&self, index: usize) -> Option<VoiceState> {
        self.slots.get(index).map(|s| s.load().1)
    }

    /// Handle of the voice currently sounding at `index`, if any.
    pub fn live_handle(&self, index: usize) -> Option<VoiceHandle> {
        let (generation, state) = self.slots.get(index)?.load();
        state
            .is_sounding()
            .then(|| VoiceHandle::new(index, generation))
    }

    /// Handles of all sounding voices, in slot order.
    pub fn sounding_handles(&self) -> Vec<VoiceHandle> {
        (0..self.slots.len())
            .filter_map(|i| self.live_handle(i))
            .collect()
    }

    /// Pitch bound to a live voice, `None` for explicit voices.
    pub fn pitch_of(&self, handle: VoiceHandle) -> Result<Option<u8>, LookupError> {
        let _guard = self.alloc.lock();
        let pitch = self.live_slot(handle)?.pitch();
        Ok((pitch != NO_PITCH).then_some(pitch))
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Binds a voice to `pitch`.
    ///
    /// An active voice already holding `pitch` is retriggered in place.
    /// Otherwise the lowest-index free voice is used, or the voice with the
    /// oldest generation is stolen (lowest index on ties).
    pub fn allocate_by_pitch(&self, pitch: u8, velocity: u8) -> VoiceHandle {
        let pitch = pitch.min(127);
        let mut next = self.alloc.lock();
        let index = self
            .find_active_pitch(pitch)
            .unwrap_or_else(|| self.pick_slot());
        self.bind(index, &mut next, pitch, velocity.min(127))
    }

    /// Allocates a voice not tied to any pitch.
    pub fn allocate_explicit(&self) -> VoiceHandle {
        let mut next = self.alloc.lock();
        let index = self.pick_slot();
        self.bind(index, &mut next, NO_PITCH, 0)
    }

    fn find_active_pitch(&self, pitch: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.load().1 == VoiceState::Active && s.pitch() == pitch)
    }

    fn pick_slot(&self) -> usize {
        if let Some(free) = self.slots.iter().position(|s| s.load().1 == VoiceState::Free) {
            return free;
        }
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(i, s)| (s.load().0, *i))
            .map_or(0, |(i, _)| i)
    }

    fn bind(&self, index: usize, next: &mut u64, pitch: u8, velocity: u8) -> VoiceHandle {
        let slot = &self.slots[index];
        let (old_generation, old_state) = slot.load();
        if old_state.is_sounding() {
            tracing::debug!(
                index,
                old_generation,
                new_pitch = pitch,
                "recycling sounding voice"
            );
        }

        // Park the slot while its fields change.
        slot.store(old_generation, VoiceState::Free);
        for cell in slot.overlay.iter() {
            cell.clear();
        }
        for (meter, desc) in slot.meters.iter().zip(self.table.iter()) {
            meter.store(desc.range.init);
        }
        slot.pitch.store(pitch, Ordering::Release);
        slot.velocity.store(velocity, Ordering::Release);

        let generation = *next;
        *next += 1;
        slot.store(generation, VoiceState::Active);
        VoiceHandle::new(index, generation)
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Releases a voice. Soft release lets it decay; hard release frees it now.
    pub fn release(&self, handle: VoiceHandle, hard: bool) -> Result<(), LookupError> {
        let _guard = self.alloc.lock();
        let slot = self.live_slot(handle)?;
        Self::release_slot(slot, handle.generation(), hard);
        Ok(())
    }

    /// Releases the active voice bound to `pitch`.
    pub fn release_pitch(&self, pitch: u8, hard: bool) -> Result<VoiceHandle, LookupError> {
        let _guard = self.alloc.lock();
        let index = self
            .find_active_pitch(pitch)
            .ok_or(LookupError::NoVoiceForPitch(pitch))?;
        let (generation, _) = self.slots[index].load();
        Self::release_slot(&self.slots[index], generation, hard);
        Ok(VoiceHandle::new(index, generation))
    }

    /// Releases every active voice; `hard` frees all sounding voices at once.
    pub fn all_notes_off(&self, hard: bool) {
        let _guard = self.alloc.lock();
        for slot in self.slots.iter() {
            let (generation, state) = slot.load();
            if state.is_sounding() {
                Self::release_slot(slot, generation, hard);
            }
        }
    }

    fn release_slot(slot: &VoiceSlot, generation: u64, hard: bool) {
        if hard {
            slot.store(generation, VoiceState::Free);
        } else {
            slot.transition(generation, VoiceState::Active, VoiceState::Releasing);
        }
    }

    /// The slot a handle refers to, if it is still that allocation.
    fn live_slot(&self, handle: VoiceHandle) -> Result<&VoiceSlot, LookupError> {
        let stale = LookupError::StaleVoice {
            index: handle.index(),
            generation: handle.generation(),
        };
        let slot = self.slots.get(handle.index()).ok_or_else(|| stale.clone())?;
        let (generation, state) = slot.load();
        if generation != handle.generation() || !state.is_sounding() {
            tracing::debug!(%handle, live_generation = generation, "stale voice handle");
            return Err(stale);
        }
        Ok(slot)
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Writes a value globally or into one voice's overlay.
    ///
    /// The value is clamped to the control's range; the stored value is
    /// returned. Output controls and non-finite values are rejected.
    pub fn set_value<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        value: f32,
        scope: VoiceScope,
    ) -> Result<f32, ParamError> {
        let desc = self.table.get(param.into())?;
        if desc.is_output() {
            return Err(ValueError::ReadOnly(desc.path.clone()).into());
        }
        if !value.is_finite() {
            return Err(ValueError::NonFinite {
                path: desc.path.clone(),
                value,
            }
            .into());
        }
        let value = desc.clamp(value);
        let id = desc.id.index();
        match scope {
            VoiceScope::Global => self.globals[id].store(value),
            VoiceScope::Voice(handle) => {
                let _guard = self.alloc.lock();
                self.live_slot(handle)?.overlay[id].set(value);
            }
        }
        Ok(value)
    }

    /// Reads a value.
    ///
    /// A voice read returns its override if present, else the global value.
    /// For output controls a voice read returns that voice's meter and a
    /// global read the maximum across sounding voices.
    pub fn value<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        scope: VoiceScope,
    ) -> Result<f32, LookupError> {
        let desc = self.table.get(param.into())?;
        let id = desc.id.index();
        match scope {
            VoiceScope::Global => Ok(self.globals[id].load()),
            VoiceScope::Voice(handle) => {
                let _guard = self.alloc.lock();
                let slot = self.live_slot(handle)?;
                if desc.is_output() {
                    Ok(slot.meters[id].load())
                } else {
                    Ok(slot.overlay(id).unwrap_or_else(|| self.globals[id].load()))
                }
            }
        }
    }

    /// Removes one voice's override so it follows the global value again.
    pub fn clear_override<'a>(
        &self,
        param: impl Into<ParamRef<'a>>,
        handle: VoiceHandle,
    ) -> Result<(), LookupError> {
        let id = self.table.resolve(param.into())?;
        let _guard = self.alloc.lock();
        self.live_slot(handle)?.overlay[id.index()].clear();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Renderer access
    // -----------------------------------------------------------------------

    #[inline]
    pub(crate) fn slot(&self, index: usize) -> &VoiceSlot {
        &self.slots[index]
    }

    #[inline]
    pub(crate) fn global(&self, id: ParamId) -> f32 {
        self.globals[id.index()].load()
    }

    #[inline]
    pub(crate) fn publish_global(&self, id: ParamId, value: f32) {
        self.globals[id.index()].store(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvox_core::{ControlKind, GroupKind, ParamRange};

    fn table() -> Arc<ParamTable> {
        Arc::new(
            ParamTable::from_walk(|w| {
                w.open_group(GroupKind::Vertical, "v");
                w.add_control("freq", ControlKind::NumEntry, ParamRange::new(440.0, 20.0, 4000.0, 1.0));
                w.add_control("gate", ControlKind::Button, ParamRange::toggle());
                w.add_control("cutoff", ControlKind::HorizontalSlider, ParamRange::new(0.3, 0.0, 1.0, 0.01));
                w.add_control("level", ControlKind::VerticalBargraph, ParamRange::meter(0.0, 1.0));
                w.close_group();
            })
            .unwrap(),
        )
    }

    fn pool(capacity: usize) -> VoicePool {
        VoicePool::new(table(), capacity).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            VoicePool::new(table(), 0).unwrap_err(),
            ConstructionError::InvalidPolyphony(0)
        );
    }

    #[test]
    fn pack_round_trip() {
        assert_eq!(unpack(pack(41, VoiceState::Releasing)), (41, VoiceState::Releasing));
        assert_eq!(unpack(pack(0, VoiceState::Free)), (0, VoiceState::Free));
    }

    #[test]
    fn generations_count_allocations() {
        let pool = pool(4);
        let handles: Vec<_> = (60..64).map(|p| pool.allocate_by_pitch(p, 100)).collect();
        let generations: Vec<_> = handles.iter().map(|h| h.generation()).collect();
        assert_eq!(generations, vec![0, 1, 2, 3]);
        assert_eq!(pool.sounding_count(), 4);
    }

    #[test]
    fn steals_oldest_when_full() {
        let pool = pool(4);
        let a = pool.allocate_by_pitch(60, 100);
        for p in 61..64 {
            pool.allocate_by_pitch(p, 100);
        }
        let e = pool.allocate_by_pitch(70, 100);
        assert_eq!(e.index(), a.index());
        assert_eq!(e.generation(), 4);
        assert_eq!(pool.pitch_of(e), Ok(Some(70)));
        assert!(pool.pitch_of(a).is_err());
    }

    #[test]
    fn same_pitch_retriggers_in_place() {
        let pool = pool(4);
        let first = pool.allocate_by_pitch(60, 100);
        let second = pool.allocate_by_pitch(60, 80);
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert_eq!(pool.sounding_count(), 1);
    }

    #[test]
    fn soft_release_keeps_voice_sounding() {
        let pool = pool(2);
        let h = pool.allocate_by_pitch(60, 100);
        pool.release(h, false).unwrap();
        assert_eq!(pool.state(h.index()), Some(VoiceState::Releasing));
        assert_eq!(pool.sounding_count(), 1);

        // A releasing voice is no longer bound to its pitch.
        assert_eq!(
            pool.release_pitch(60, false),
            Err(LookupError::NoVoiceForPitch(60))
        );
    }

    #[test]
    fn hard_release_frees_and_stales_handle() {
        let pool = pool(2);
        let h = pool.allocate_by_pitch(60, 100);
        pool.release(h, true).unwrap();
        assert_eq!(pool.state(h.index()), Some(VoiceState::Free));
        assert!(matches!(
            pool.release(h, true),
            Err(LookupError::StaleVoice { .. })
        ));
    }

    #[test]
    fn all_notes_off_hard_frees_everything() {
        let pool = pool(3);
        pool.allocate_by_pitch(60, 100);
        let b = pool.allocate_explicit();
        pool.release(b, false).unwrap();
        pool.all_notes_off(true);
        assert_eq!(pool.sounding_count(), 0);
    }

    #[test]
    fn overlay_falls_back_to_global() {
        let pool = pool(4);
        let b = pool.allocate_by_pitch(61, 100);
        let c = pool.allocate_by_pitch(62, 100);

        pool.set_value(ParamId(2), 0.5, VoiceScope::Global).unwrap();
        pool.set_value(ParamId(2), 0.8, VoiceScope::Voice(b)).unwrap();

        assert_eq!(pool.value(ParamId(2), VoiceScope::Voice(b)), Ok(0.8));
        assert_eq!(pool.value(ParamId(2), VoiceScope::Global), Ok(0.5));
        assert_eq!(pool.value(ParamId(2), VoiceScope::Voice(c)), Ok(0.5));

        pool.clear_override("/v/cutoff", b).unwrap();
        assert_eq!(pool.value(ParamId(2), VoiceScope::Voice(b)), Ok(0.5));
    }

    #[test]
    fn values_are_clamped_and_validated() {
        let pool = pool(1);
        assert_eq!(pool.set_value("/v/cutoff", 7.0, VoiceScope::Global), Ok(1.0));
        assert!(matches!(
            pool.set_value("/v/cutoff", f32::NAN, VoiceScope::Global),
            Err(ParamError::Value(ValueError::NonFinite { .. }))
        ));
        assert_eq!(
            pool.set_value("/v/level", 0.5, VoiceScope::Global),
            Err(ParamError::Value(ValueError::ReadOnly("/v/level".to_string())))
        );
        assert!(matches!(
            pool.set_value("/v/missing", 0.5, VoiceScope::Global),
            Err(ParamError::Lookup(LookupError::UnknownPath(_)))
        ));
    }

    #[test]
    fn globals_start_at_init() {
        let pool = pool(1);
        assert_eq!(pool.value("/v/freq", VoiceScope::Global), Ok(440.0));
        assert_eq!(pool.value("/v/cutoff", VoiceScope::Global), Ok(0.3));
    }

    #[test]
    fn recycle_clears_overlay() {
        let pool = pool(1);
        let a = pool.allocate_explicit();
        pool.set_value(ParamId(2), 0.9, VoiceScope::Voice(a)).unwrap();
        pool.release(a, true).unwrap();

        let b = pool.allocate_explicit();
        assert_eq!(b.index(), a.index());
        assert_eq!(pool.value(ParamId(2), VoiceScope::Voice(b)), Ok(0.3));
        assert_ne!(b.generation(), a.generation());
    }

    #[test]
    fn live_handle_tracks_slot() {
        let pool = pool(2);
        assert_eq!(pool.live_handle(0), None);
        let h = pool.allocate_explicit();
        assert_eq!(pool.live_handle(h.index()), Some(h));
        assert_eq!(pool.live_handle(5), None);
        assert_eq!(pool.sounding_handles(), vec![h]);
    }
}
