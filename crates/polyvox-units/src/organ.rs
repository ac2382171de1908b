//! Three-drawbar additive organ with ADSR and stereo pan.
//!
//! ## Parameters
//! - `freq`: note frequency in Hz, note-bound (20 to 8000, default 440)
//! - `gain`: note velocity gain, note-bound (0 to 1, default 0.5)
//! - `gate`: note gate, note-bound
//! - `volume`: master volume, MIDI CC 7 (0 to 1, default 0.5)
//! - `brightness`: level of the 2nd and 3rd harmonics (0 to 1, default 0.3)
//! - `pan`: constant-power pan (0 left to 1 right, default 0.5)
//! - `envelope/attack|decay|sustain|release`: ADSR, times in ms
//! - `level`: block peak meter (output)

use core::f32::consts::{FRAC_PI_2, TAU};

use polyvox_core::{ControlKind, DspUnit, GroupKind, InterfaceWalker, Meta, ParamId, ParamRange};

use crate::envelope::Adsr;

const FREQ: usize = 0;
const GAIN: usize = 1;
const GATE: usize = 2;
const VOLUME: usize = 3;
const BRIGHTNESS: usize = 4;
const PAN: usize = 5;
const ATTACK: usize = 6;
const DECAY: usize = 7;
const SUSTAIN: usize = 8;
const RELEASE: usize = 9;
const LEVEL: usize = 10;
const PARAMS: usize = 11;

const DEFAULTS: [f32; PARAMS] = [440.0, 0.5, 0.0, 0.5, 0.3, 0.5, 10.0, 100.0, 0.7, 200.0, 0.0];

/// Additive organ voice.
#[derive(Debug, Clone)]
pub struct OrganUnit {
    params: [f32; PARAMS],
    sample_rate: f32,
    phase: f32,
    env: Adsr,
    /// Envelope settings last pushed to `env`.
    env_times: [f32; 4],
}

impl OrganUnit {
    /// Creates the unit with default control values.
    pub fn new() -> Self {
        Self {
            params: DEFAULTS,
            sample_rate: 44100.0,
            phase: 0.0,
            env: Adsr::new(44100.0),
            env_times: [f32::NAN; 4],
        }
    }

    fn sync_envelope(&mut self) {
        let times = [
            self.params[ATTACK],
            self.params[DECAY],
            self.params[SUSTAIN],
            self.params[RELEASE],
        ];
        if times != self.env_times {
            self.env.set_times(times[0], times[1], times[2], times[3]);
            self.env_times = times;
        }
    }
}

impl DspUnit for OrganUnit {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn init(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        self.env.set_sample_rate(self.sample_rate);
        self.env_times = [f32::NAN; 4];
        self.instance_clear();
    }

    fn instance_clear(&mut self) {
        self.phase = 0.0;
        self.env.reset();
        self.params[LEVEL] = 0.0;
    }

    fn declare_interface(&self, w: &mut dyn InterfaceWalker) {
        w.open_group(GroupKind::Vertical, "organ");
        w.add_control(
            "freq[unit:Hz]",
            ControlKind::NumEntry,
            ParamRange::new(440.0, 20.0, 8000.0, 0.01),
        );
        w.add_control(
            "gain",
            ControlKind::NumEntry,
            ParamRange::new(0.5, 0.0, 1.0, 0.01),
        );
        w.add_control("gate", ControlKind::Button, ParamRange::toggle());
        w.declare("midi", "ctrl 7");
        w.declare("acc", "0 0 -10 0 10");
        w.add_control(
            "volume",
            ControlKind::HorizontalSlider,
            ParamRange::new(0.5, 0.0, 1.0, 0.01),
        );
        w.add_control(
            "brightness[osc:/bright 0 1]",
            ControlKind::HorizontalSlider,
            ParamRange::new(0.3, 0.0, 1.0, 0.01),
        );
        w.add_control(
            "pan",
            ControlKind::HorizontalSlider,
            ParamRange::new(0.5, 0.0, 1.0, 0.01),
        );

        w.open_group(GroupKind::Horizontal, "envelope");
        w.add_control(
            "attack[unit:ms][scale:log]",
            ControlKind::VerticalSlider,
            ParamRange::new(10.0, 1.0, 2000.0, 1.0),
        );
        w.add_control(
            "decay[unit:ms][scale:log]",
            ControlKind::VerticalSlider,
            ParamRange::new(100.0, 1.0, 2000.0, 1.0),
        );
        w.add_control(
            "sustain",
            ControlKind::VerticalSlider,
            ParamRange::new(0.7, 0.0, 1.0, 0.01),
        );
        w.add_control(
            "release[unit:ms][scale:log]",
            ControlKind::VerticalSlider,
            ParamRange::new(200.0, 1.0, 5000.0, 1.0),
        );
        w.close_group();

        w.add_control(
            "level",
            ControlKind::VerticalBargraph,
            ParamRange::meter(0.0, 1.0),
        );
        w.close_group();
    }

    fn declare_metadata(&self, meta: &mut dyn Meta) {
        meta.declare("name", "organ");
        meta.declare("description", "three-drawbar additive organ");
        meta.declare("nvoices", "8");
        meta.declare("compile_options", "-lang rust -single -ftz 0");
    }

    fn set_param(&mut self, id: ParamId, value: f32) {
        // The meter is written by compute only.
        if id.index() == LEVEL {
            return;
        }
        if let Some(slot) = self.params.get_mut(id.index()) {
            *slot = value;
        }
    }

    fn param(&self, id: ParamId) -> f32 {
        self.params.get(id.index()).copied().unwrap_or(0.0)
    }

    fn compute(&mut self, frames: usize, _inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        self.sync_envelope();
        self.env.set_gate(self.params[GATE] > 0.5);

        let increment = self.params[FREQ] / self.sample_rate;
        let bright = self.params[BRIGHTNESS];
        let norm = 1.0 / (1.0 + 0.75 * bright);
        let amp = self.params[GAIN] * self.params[VOLUME] * norm;
        let pan = self.params[PAN].clamp(0.0, 1.0) * FRAC_PI_2;
        let (left_gain, right_gain) = (libm::cosf(pan), libm::sinf(pan));

        let mut peak = 0.0f32;
        for i in 0..frames {
            let p = self.phase * TAU;
            let tone = libm::sinf(p)
                + bright * (0.5 * libm::sinf(2.0 * p) + 0.25 * libm::sinf(3.0 * p));
            let sample = tone * amp * self.env.advance();
            peak = peak.max(sample.abs());

            self.phase += increment;
            self.phase -= libm::floorf(self.phase);

            if let Some(left) = outputs.first_mut() {
                left[i] = sample * left_gain;
            }
            if let Some(right) = outputs.get_mut(1) {
                right[i] = sample * right_gain;
            }
        }
        self.params[LEVEL] = peak;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Stage;
    use polyvox_core::ParamTable;

    fn id(index: usize) -> ParamId {
        ParamId(index as u32)
    }

    fn run(unit: &mut OrganUnit, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        unit.compute(frames, &[], &mut [&mut left, &mut right]);
        (left, right)
    }

    #[test]
    fn ids_match_declaration() {
        let table = ParamTable::build(&OrganUnit::new()).unwrap();
        assert_eq!(table.len(), PARAMS);
        assert_eq!(table.id_of("/organ/freq"), Ok(id(FREQ)));
        assert_eq!(table.id_of("/organ/envelope/release"), Ok(id(RELEASE)));
        assert_eq!(table.id_of("/organ/level"), Ok(id(LEVEL)));
        assert_eq!(
            table.descriptor(id(VOLUME)).unwrap().metadata("midi"),
            Some("ctrl 7")
        );
        assert_eq!(
            table.descriptor(id(BRIGHTNESS)).unwrap().metadata("osc"),
            Some("/bright 0 1")
        );
        for (i, desc) in table.iter().enumerate() {
            assert_eq!(desc.range.init, DEFAULTS[i], "{}", desc.path);
        }
    }

    #[test]
    fn silent_without_gate() {
        let mut unit = OrganUnit::new();
        unit.init(48000);
        let (left, right) = run(&mut unit, 256);
        assert!(left.iter().chain(&right).all(|&s| s == 0.0));
        assert_eq!(unit.param(id(LEVEL)), 0.0);
    }

    #[test]
    fn gated_voice_sounds_and_meters() {
        let mut unit = OrganUnit::new();
        unit.init(48000);
        unit.set_param(id(GATE), 1.0);
        let (left, right) = run(&mut unit, 2048);
        assert!(left.iter().any(|&s| s.abs() > 0.01));
        assert!(left.iter().chain(&right).all(|s| s.is_finite()));
        let level = unit.param(id(LEVEL));
        assert!(level > 0.0 && level <= 1.0, "level {level}");
    }

    #[test]
    fn hard_pan_silences_one_side() {
        let mut unit = OrganUnit::new();
        unit.init(48000);
        unit.set_param(id(GATE), 1.0);
        unit.set_param(id(PAN), 0.0);
        let (left, right) = run(&mut unit, 1024);
        assert!(left.iter().any(|&s| s.abs() > 0.01));
        assert!(right.iter().all(|&s| s.abs() < 1e-6));
    }

    #[test]
    fn release_decays_to_idle() {
        let mut unit = OrganUnit::new();
        unit.init(48000);
        unit.set_param(id(RELEASE), 5.0);
        unit.set_param(id(GATE), 1.0);
        run(&mut unit, 4800);
        unit.set_param(id(GATE), 0.0);
        run(&mut unit, 4800);
        assert_eq!(unit.env.stage(), Stage::Idle);
        let (left, _) = run(&mut unit, 64);
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn meter_is_read_only() {
        let mut unit = OrganUnit::new();
        unit.set_param(id(LEVEL), 0.9);
        assert_eq!(unit.param(id(LEVEL)), 0.0);
    }
}
