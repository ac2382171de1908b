//! Karplus–Strong plucked string.
//!
//! A noise burst excites a delay line of one period; a lowpass in the
//! feedback loop makes the string decay. Dropping the gate damps the string
//! quickly so released voices fall silent.

use polyvox_core::{ControlKind, DspUnit, GroupKind, InterfaceWalker, Meta, ParamId, ParamRange};

const FREQ: usize = 0;
const GAIN: usize = 1;
const GATE: usize = 2;
const DAMPING: usize = 3;
const DECAY: usize = 4;
const PARAMS: usize = 5;

/// Lowest playable frequency; sizes the delay line.
const MIN_FREQ: f32 = 20.0;

/// Feedback multiplier applied while the gate is low.
const MUTE_FEEDBACK: f32 = 0.9;

/// Plucked-string voice.
#[derive(Debug, Clone)]
pub struct PluckUnit {
    params: [f32; PARAMS],
    sample_rate: f32,
    line: Vec<f32>,
    period: usize,
    pos: usize,
    gate: bool,
    noise: u32,
}

impl PluckUnit {
    /// Creates the unit with default control values.
    pub fn new() -> Self {
        Self {
            params: [220.0, 0.8, 0.0, 0.5, 0.996],
            sample_rate: 44100.0,
            line: Vec::new(),
            period: 2,
            pos: 0,
            gate: false,
            noise: 0x1234_5678,
        }
    }

    /// xorshift32 in [-1, 1].
    fn next_noise(&mut self) -> f32 {
        let mut x = self.noise;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    fn excite(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let period = (self.sample_rate / self.params[FREQ].max(MIN_FREQ)) as usize;
        self.period = period.clamp(2, self.line.len());
        self.pos = 0;
        let gain = self.params[GAIN];
        for i in 0..self.period {
            self.line[i] = self.next_noise() * gain;
        }
    }
}

impl DspUnit for PluckUnit {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn init(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        self.line = vec![0.0; (self.sample_rate / MIN_FREQ) as usize + 2];
        self.instance_clear();
    }

    fn instance_clear(&mut self) {
        self.line.fill(0.0);
        self.pos = 0;
        self.gate = false;
    }

    fn declare_interface(&self, w: &mut dyn InterfaceWalker) {
        w.open_group(GroupKind::Vertical, "pluck");
        w.add_control(
            "freq[unit:Hz]",
            ControlKind::NumEntry,
            ParamRange::new(220.0, MIN_FREQ, 4000.0, 0.01),
        );
        w.add_control(
            "gain",
            ControlKind::NumEntry,
            ParamRange::new(0.8, 0.0, 1.0, 0.01),
        );
        w.add_control("gate", ControlKind::Button, ParamRange::toggle());
        w.declare("midi", "ctrl 74");
        w.add_control(
            "damping",
            ControlKind::HorizontalSlider,
            ParamRange::new(0.5, 0.0, 1.0, 0.01),
        );
        w.add_control(
            "decay",
            ControlKind::HorizontalSlider,
            ParamRange::new(0.996, 0.9, 0.9999, 0.0001),
        );
        w.close_group();
    }

    fn declare_metadata(&self, meta: &mut dyn Meta) {
        meta.declare("name", "pluck");
        meta.declare("description", "Karplus-Strong plucked string");
        meta.declare("nvoices", "6");
        meta.declare("compile_options", "-lang rust -double");
    }

    fn set_param(&mut self, id: ParamId, value: f32) {
        if let Some(slot) = self.params.get_mut(id.index()) {
            *slot = value;
        }
    }

    fn param(&self, id: ParamId) -> f32 {
        self.params.get(id.index()).copied().unwrap_or(0.0)
    }

    fn compute(&mut self, frames: usize, _inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let gate = self.params[GATE] > 0.5;
        if gate && !self.gate {
            self.excite();
        }
        self.gate = gate;

        let Some(out) = outputs.first_mut() else {
            return;
        };
        if self.line.is_empty() {
            out[..frames].fill(0.0);
            return;
        }

        let damping = self.params[DAMPING];
        let feedback = self.params[DECAY] * if gate { 1.0 } else { MUTE_FEEDBACK };
        let period = self.period;
        for sample in out[..frames].iter_mut() {
            let a = self.line[self.pos];
            let b = self.line[(self.pos + 1) % period];
            let filtered = (1.0 - damping) * a + damping * 0.5 * (a + b);
            let next = filtered * feedback;
            self.line[self.pos] = if next.abs() < 1e-20 { 0.0 } else { next };
            self.pos = (self.pos + 1) % period;
            *sample = a;
        }
    }
}
