//! Voice renderer: the audio-thread half of the voice pool.
//!
//! [`VoiceRenderer`] owns one unit instance per pool slot. Each call to
//! [`render`](VoiceRenderer::render):
//!
//! 1. zeroes the output buffers
//! 2. for every active or releasing slot, clears the unit if the slot was
//!    reallocated since the previous block, then pushes the effective
//!    parameter values that changed
//! 3. computes the unit into scratch buffers and sums them into the outputs
//! 4. publishes bargraph meters and retires releasing voices that went silent
//!
//! No allocation, locking or blocking happens here. Buffers longer than the
//! preallocated scratch size are rendered in chunks.
//!
//! # Faults
//!
//! A voice producing NaN or infinite samples is dropped from the mix for that
//! block and freed immediately.

use std::sync::Arc;

use polyvox_core::{ConstructionError, DspUnit, NoteRole, ParamId};

use crate::binding::note_value;
use crate::handle::VoiceState;
use crate::pool::{NO_PITCH, VoicePool};

/// Maximum input or output channels of a unit.
pub const MAX_CHANNELS: usize = 8;

/// When a releasing voice counts as finished.
///
/// A voice is freed after a block whose peak absolute output is below
/// `stop_level`, once it has been releasing for at least `min_release_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReleasePolicy {
    /// Linear peak threshold.
    pub stop_level: f32,
    /// Minimum time spent releasing before silence is checked.
    pub min_release_ms: f32,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            stop_level: 0.0005,
            min_release_ms: 0.0,
        }
    }
}

struct VoiceUnit {
    unit: Box<dyn DspUnit>,
    /// Last value pushed per parameter; NaN until the first push.
    applied: Vec<f32>,
    /// Allocation this unit last rendered; a different one means recycled.
    generation: Option<u64>,
    release_frames: u64,
}

/// Renders and mixes every sounding voice of a [`VoicePool`].
pub struct VoiceRenderer {
    pool: Arc<VoicePool>,
    voices: Vec<VoiceUnit>,
    num_inputs: usize,
    num_outputs: usize,
    max_frames: usize,
    scratch: Vec<Vec<f32>>,
    silence: Vec<f32>,
    /// Effective values read for the voice being rendered, by parameter id.
    pending: Vec<f32>,
    /// Note role per parameter id, `None` for outputs and unbound controls.
    roles: Vec<Option<NoteRole>>,
    /// Input controls, in id order.
    input_ids: Vec<ParamId>,
    /// Output controls with their initial values.
    meters: Vec<(ParamId, f32)>,
    meter_peaks: Vec<f32>,
    stop_level: f32,
    min_release_frames: u64,
}

impl VoiceRenderer {
    /// Creates a renderer over `pool` with one unit per slot.
    ///
    /// Units are initialized at `sample_rate`. `max_frames` sizes the scratch
    /// buffers; larger periods are split.
    pub fn new(
        pool: Arc<VoicePool>,
        units: Vec<Box<dyn DspUnit>>,
        sample_rate: u32,
        max_frames: usize,
        policy: ReleasePolicy,
    ) -> Result<Self, ConstructionError> {
        if units.len() != pool.capacity() {
            return Err(ConstructionError::Instance(format!(
                "expected {} unit instances, got {}",
                pool.capacity(),
                units.len()
            )));
        }
        let (num_inputs, num_outputs) = units
            .first()
            .map_or((0, 0), |u| (u.num_inputs(), u.num_outputs()));
        if num_inputs > MAX_CHANNELS || num_outputs > MAX_CHANNELS {
            return Err(ConstructionError::Instance(format!(
                "unit has {num_inputs} inputs and {num_outputs} outputs; at most {MAX_CHANNELS} are supported"
            )));
        }

        let table = Arc::clone(pool.table());
        let param_count = table.len();
        let voices = units
            .into_iter()
            .map(|mut unit| {
                unit.init(sample_rate);
                VoiceUnit {
                    unit,
                    applied: vec![f32::NAN; param_count],
                    generation: None,
                    release_frames: 0,
                }
            })
            .collect();

        let max_frames = max_frames.max(1);
        let roles = (0..param_count)
            .map(|i| table.note_role(ParamId(i as u32)))
            .collect();
        let input_ids = table.iter().filter(|d| !d.is_output()).map(|d| d.id).collect();
        let meters: Vec<(ParamId, f32)> = table
            .iter()
            .filter(|d| d.is_output())
            .map(|d| (d.id, d.range.init))
            .collect();
        let min_release_frames =
            (f64::from(policy.min_release_ms.max(0.0)) * f64::from(sample_rate) / 1000.0) as u64;

        Ok(Self {
            meter_peaks: vec![0.0; meters.len()],
            pool,
            voices,
            num_inputs,
            num_outputs,
            max_frames,
            scratch: vec![vec![0.0; max_frames]; num_outputs],
            silence: vec![0.0; max_frames],
            pending: vec![0.0; param_count],
            roles,
            input_ids,
            meters,
            stop_level: policy.stop_level,
            min_release_frames,
        })
    }

    /// The pool this renderer plays.
    pub fn pool(&self) -> &Arc<VoicePool> {
        &self.pool
    }

    /// Input channels of the unit.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Output channels of the unit.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Renders `frames` frames of every sounding voice, summed into `outputs`.
    ///
    /// Outputs are overwritten. Missing or short inputs read as silence. If
    /// there are fewer output buffers than unit outputs, extra channels fold
    /// onto the available ones; if there are more, unit channels repeat
    /// across them. Returns the number of voices that sounded in the last
    /// chunk.
    pub fn render(
        &mut self,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> usize {
        let frames = outputs.iter().map(|o| o.len()).fold(frames, usize::min);
        for out in outputs.iter_mut() {
            out[..frames].fill(0.0);
        }

        let mut sounding = 0;
        let mut offset = 0;
        while offset < frames {
            let n = (frames - offset).min(self.max_frames);
            sounding = self.render_chunk(offset, n, inputs, outputs);
            offset += n;
        }
        sounding
    }

    fn render_chunk(
        &mut self,
        offset: usize,
        n: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> usize {
        let mut ins: [&[f32]; MAX_CHANNELS] = [&[]; MAX_CHANNELS];
        for (c, input) in ins.iter_mut().take(self.num_inputs).enumerate() {
            *input = inputs
                .get(c)
                .and_then(|i| i.get(offset..offset + n))
                .unwrap_or(&self.silence[..n]);
        }
        self.meter_peaks.fill(f32::NEG_INFINITY);

        let pool = &*self.pool;
        let mut sounding = 0;
        for (index, voice) in self.voices.iter_mut().enumerate() {
            let slot = pool.slot(index);
            let (generation, state) = slot.load();
            if !state.is_sounding() {
                continue;
            }

            // Effective values: forced gate-off, then overlay, then note, then global.
            let pitch = slot.pitch();
            let velocity = slot.velocity();
            let held = state == VoiceState::Active;
            for &id in &self.input_ids {
                let i = id.index();
                self.pending[i] = match (self.roles[i], slot.overlay(i)) {
                    (Some(NoteRole::Gate), _) if !held => 0.0,
                    (_, Some(v)) => v,
                    (Some(role), None) if pitch != NO_PITCH => {
                        note_value(role, pitch, velocity, held)
                    }
                    _ => pool.global(id),
                };
            }

            // A slot being rebound parks first, so any field read above that
            // belongs to the next allocation shows up as a changed word here.
            let (recheck, recheck_state) = slot.load();
            if recheck != generation || !recheck_state.is_sounding() {
                continue;
            }

            if voice.generation != Some(generation) {
                voice.unit.instance_clear();
                voice.generation = Some(generation);
                voice.release_frames = 0;
            }
            if state == VoiceState::Active {
                voice.release_frames = 0;
            }

            for &id in &self.input_ids {
                let i = id.index();
                let value = self.pending[i];
                if value.to_bits() != voice.applied[i].to_bits() {
                    voice.unit.set_param(id, value);
                    voice.applied[i] = value;
                }
            }

            {
                let mut outs: [&mut [f32]; MAX_CHANNELS] = Default::default();
                for (dst, buf) in outs.iter_mut().zip(self.scratch.iter_mut()) {
                    buf[..n].fill(0.0);
                    *dst = &mut buf[..n];
                }
                voice
                    .unit
                    .compute(n, &ins[..self.num_inputs], &mut outs[..self.num_outputs]);
            }

            let mut peak = 0.0f32;
            let mut finite = true;
            for buf in &self.scratch {
                for &s in &buf[..n] {
                    if !s.is_finite() {
                        finite = false;
                        break;
                    }
                    peak = peak.max(s.abs());
                }
            }
            if !finite {
                slot.transition(generation, state, VoiceState::Free);
                continue;
            }

            if !outputs.is_empty() && !self.scratch.is_empty() {
                let width = outputs.len();
                let channels = self.scratch.len();
                for c in 0..width.max(channels) {
                    let buf = &self.scratch[c % channels];
                    let out = &mut outputs[c % width][offset..offset + n];
                    for (o, &s) in out.iter_mut().zip(&buf[..n]) {
                        *o += s;
                    }
                }
            }

            for ((id, _), peak_meter) in self.meters.iter().zip(self.meter_peaks.iter_mut()) {
                let level = voice.unit.param(*id);
                slot.set_meter(id.index(), level);
                *peak_meter = peak_meter.max(level);
            }
            sounding += 1;

            if state == VoiceState::Releasing {
                voice.release_frames += n as u64;
                if voice.release_frames >= self.min_release_frames && peak < self.stop_level {
                    slot.transition(generation, VoiceState::Releasing, VoiceState::Free);
                }
            }
        }

        for ((id, init), &peak_meter) in self.meters.iter().zip(&self.meter_peaks) {
            let level = if sounding > 0 { peak_meter } else { *init };
            pool.publish_global(*id, level);
        }
        sounding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::VoiceScope;
    use polyvox_core::{ControlKind, GroupKind, InterfaceWalker, Meta, ParamRange, ParamTable};

    /// Outputs `level * gate` while gated; decays linearly by `step` per
    /// sample after the gate drops. Meter reports the last sample.
    struct Ramp {
        params: [f32; 4],
        current: f32,
    }

    impl Ramp {
        fn new() -> Self {
            Self {
                params: [0.0; 4],
                current: 0.0,
            }
        }
    }

    fn declare(w: &mut dyn InterfaceWalker) {
        w.open_group(GroupKind::Vertical, "ramp");
        w.add_control("gate", ControlKind::Button, ParamRange::toggle());
        w.add_control("level", ControlKind::HorizontalSlider, ParamRange::new(0.5, 0.0, 1.0, 0.01));
        w.add_control("step", ControlKind::HorizontalSlider, ParamRange::new(0.1, 0.0, 1.0, 0.01));
        w.add_control("meter", ControlKind::VerticalBargraph, ParamRange::meter(0.0, 1.0));
        w.close_group();
    }

    impl DspUnit for Ramp {
        fn num_inputs(&self) -> usize {
            0
        }
        fn num_outputs(&self) -> usize {
            1
        }
        fn init(&mut self, _sample_rate: u32) {
            self.current = 0.0;
        }
        fn instance_clear(&mut self) {
            self.current = 0.0;
        }
        fn declare_interface(&self, walker: &mut dyn InterfaceWalker) {
            declare(walker);
        }
        fn declare_metadata(&self, _meta: &mut dyn Meta) {}
        fn set_param(&mut self, id: ParamId, value: f32) {
            self.params[id.index()] = value;
        }
        fn param(&self, id: ParamId) -> f32 {
            self.params[id.index()]
        }
        fn compute(&mut self, frames: usize, _inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
            let [gate, level, step, _] = self.params;
            for s in outputs[0][..frames].iter_mut() {
                self.current = if gate > 0.5 {
                    level
                } else {
                    (self.current - step).max(0.0)
                };
                *s = self.current;
            }
            self.params[3] = self.current;
        }
    }

    fn setup(capacity: usize, max_frames: usize) -> (Arc<VoicePool>, VoiceRenderer) {
        let table = Arc::new(ParamTable::from_walk(declare).unwrap());
        let pool = Arc::new(VoicePool::new(table, capacity).unwrap());
        let units: Vec<Box<dyn DspUnit>> =
            (0..capacity).map(|_| Box::new(Ramp::new()) as Box<dyn DspUnit>).collect();
        let renderer =
            VoiceRenderer::new(Arc::clone(&pool), units, 48000, max_frames, ReleasePolicy::default())
                .unwrap();
        (pool, renderer)
    }

    fn render(renderer: &mut VoiceRenderer, frames: usize) -> Vec<f32> {
        let mut out = vec![1.0; frames];
        renderer.render(frames, &[], &mut [&mut out]);
        out
    }

    #[test]
    fn silent_when_no_voices() {
        let (_pool, mut renderer) = setup(2, 64);
        assert!(render(&mut renderer, 64).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voices_sum_into_output() {
        let (pool, mut renderer) = setup(4, 64);
        pool.allocate_by_pitch(60, 100);
        pool.allocate_by_pitch(64, 100);
        let out = render(&mut renderer, 32);
        assert!(out.iter().all(|&s| (s - 1.0).abs() < 1e-6), "two voices at 0.5");
    }

    #[test]
    fn mono_unit_fills_every_output() {
        let (pool, mut renderer) = setup(1, 64);
        pool.allocate_by_pitch(60, 100);
        let mut left = vec![0.0; 8];
        let mut right = vec![0.0; 8];
        renderer.render(8, &[], &mut [&mut left, &mut right]);
        assert!((left[0] - 0.5).abs() < 1e-6);
        assert_eq!(left, right);
    }

    #[test]
    fn overlay_changes_one_voice_only() {
        let (pool, mut renderer) = setup(2, 64);
        let a = pool.allocate_by_pitch(60, 100);
        pool.allocate_by_pitch(62, 100);
        pool.set_value("/ramp/level", 0.1, VoiceScope::Voice(a)).unwrap();
        let out = render(&mut renderer, 8);
        assert!((out[0] - 0.6).abs() < 1e-6, "got {}", out[0]);
    }

    #[test]
    fn soft_release_decays_then_frees() {
        let (pool, mut renderer) = setup(1, 16);
        let h = pool.allocate_by_pitch(60, 100);
        render(&mut renderer, 16);
        pool.release(h, false).unwrap();

        // 0.5 decays by 0.1 per sample: silent after 5 samples.
        let out = render(&mut renderer, 16);
        assert!((out[0] - 0.4).abs() < 1e-6);
        assert_eq!(pool.state(h.index()), Some(VoiceState::Releasing));

        render(&mut renderer, 16);
        assert_eq!(pool.state(h.index()), Some(VoiceState::Free));
    }

    #[test]
    fn hard_all_notes_off_renders_silence() {
        let (pool, mut renderer) = setup(3, 64);
        for p in [60, 64, 67] {
            pool.allocate_by_pitch(p, 100);
        }
        render(&mut renderer, 64);
        pool.all_notes_off(true);
        assert!(render(&mut renderer, 64).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn long_buffers_render_in_chunks() {
        let (pool, mut renderer) = setup(1, 16);
        pool.allocate_by_pitch(60, 100);
        let out = render(&mut renderer, 100);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn meters_publish_per_voice_and_max() {
        let (pool, mut renderer) = setup(2, 64);
        let a = pool.allocate_by_pitch(60, 100);
        let b = pool.allocate_by_pitch(62, 100);
        pool.set_value("/ramp/level", 0.9, VoiceScope::Voice(b)).unwrap();
        render(&mut renderer, 8);

        assert_eq!(pool.value("/ramp/meter", VoiceScope::Voice(a)), Ok(0.5));
        assert_eq!(pool.value("/ramp/meter", VoiceScope::Voice(b)), Ok(0.9));
        assert_eq!(pool.value("/ramp/meter", VoiceScope::Global), Ok(0.9));

        pool.all_notes_off(true);
        render(&mut renderer, 8);
        assert_eq!(pool.value("/ramp/meter", VoiceScope::Global), Ok(0.0));
    }

    struct Broken;

    impl DspUnit for Broken {
        fn num_inputs(&self) -> usize {
            0
        }
        fn num_outputs(&self) -> usize {
            1
        }
        fn init(&mut self, _sample_rate: u32) {}
        fn instance_clear(&mut self) {}
        fn declare_interface(&self, walker: &mut dyn InterfaceWalker) {
            declare(walker);
        }
        fn declare_metadata(&self, _meta: &mut dyn Meta) {}
        fn set_param(&mut self, _id: ParamId, _value: f32) {}
        fn param(&self, _id: ParamId) -> f32 {
            0.0
        }
        fn compute(&mut self, frames: usize, _inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
            outputs[0][..frames].fill(f32::NAN);
        }
    }

    #[test]
    fn non_finite_voice_is_silenced_and_freed() {
        let table = Arc::new(ParamTable::from_walk(declare).unwrap());
        let pool = Arc::new(VoicePool::new(table, 1).unwrap());
        let mut renderer = VoiceRenderer::new(
            Arc::clone(&pool),
            vec![Box::new(Broken) as Box<dyn DspUnit>],
            48000,
            32,
            ReleasePolicy::default(),
        )
        .unwrap();

        let h = pool.allocate_explicit();
        let out = render(&mut renderer, 32);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(pool.state(h.index()), Some(VoiceState::Free));
    }

    #[test]
    fn unit_count_must_match_capacity() {
        let table = Arc::new(ParamTable::from_walk(declare).unwrap());
        let pool = Arc::new(VoicePool::new(table, 2).unwrap());
        let units: Vec<Box<dyn DspUnit>> = vec![Box::new(Ramp::new())];
        let result = VoiceRenderer::new(pool, units, 48000, 32, ReleasePolicy::default());
        assert!(matches!(result, Err(ConstructionError::Instance(_))));
    }
}
