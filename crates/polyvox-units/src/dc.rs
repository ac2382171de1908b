//! Constant-level unit with a linear release.
//!
//! Outputs `level` while gated and ramps to zero over `release` ms once the
//! gate drops. Useful for calibration: the mix of N gated voices is exactly
//! `N * level`.

use polyvox_core::{ControlKind, DspUnit, GroupKind, InterfaceWalker, Meta, ParamId, ParamRange};

const LEVEL: usize = 0;
const RELEASE: usize = 1;
const GATE: usize = 2;
const PARAMS: usize = 3;

/// Constant-level test unit.
#[derive(Debug, Clone)]
pub struct DcUnit {
    params: [f32; PARAMS],
    sample_rate: f32,
    current: f32,
}

impl DcUnit {
    /// Creates the unit with default control values.
    pub fn new() -> Self {
        Self {
            params: [0.5, 10.0, 0.0],
            sample_rate: 44100.0,
            current: 0.0,
        }
    }
}

impl DspUnit for DcUnit {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn init(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        self.current = 0.0;
    }

    fn instance_clear(&mut self) {
        self.current = 0.0;
    }

    fn declare_interface(&self, walker: &mut dyn InterfaceWalker) {
        walker.open_group(GroupKind::Vertical, "dc");
        walker.add_control(
            "level",
            ControlKind::HorizontalSlider,
            ParamRange::new(0.5, 0.0, 1.0, 0.001),
        );
        walker.declare("unit", "ms");
        walker.add_control(
            "release",
            ControlKind::HorizontalSlider,
            ParamRange::new(10.0, 0.0, 1000.0, 1.0),
        );
        walker.add_control("gate", ControlKind::Button, ParamRange::toggle());
        walker.close_group();
    }

    fn declare_metadata(&self, meta: &mut dyn Meta) {
        meta.declare("name", "dc");
        meta.declare("description", "constant level with linear release");
        meta.declare("compile_options", "-lang rust -single");
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
        let Some(out) = outputs.first_mut() else {
            return;
        };
        let level = self.params[LEVEL];
        let gated = self.params[GATE] > 0.5;
        let release_samples = (self.params[RELEASE] * self.sample_rate / 1000.0).max(1.0);
        let step = level.max(1e-6) / release_samples;

        for sample in out[..frames].iter_mut() {
            self.current = if gated {
                level
            } else {
                (self.current - step).max(0.0)
            };
            *sample = self.current;
        }
    }
}
