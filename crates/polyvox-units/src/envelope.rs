//! Gate-driven ADSR envelope.
//!
//! Attack and decay are linear ramps; release is exponential and snaps to
//! idle below -80 dB so voices reach true silence.

/// Level below which a releasing envelope goes idle.
const IDLE_THRESHOLD: f32 = 0.0001;

/// Envelope stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    /// Output is zero.
    #[default]
    Idle,
    /// Rising toward 1.
    Attack,
    /// Falling toward the sustain level.
    Decay,
    /// Holding the sustain level.
    Sustain,
    /// Falling toward 0 after the gate dropped.
    Release,
}

/// ADSR envelope whose gate is sampled once per block.
#[derive(Debug, Clone)]
pub struct Adsr {
    stage: Stage,
    level: f32,
    sample_rate: f32,
    attack_step: f32,
    decay_step: f32,
    sustain: f32,
    release_coeff: f32,
    gate: bool,
}

impl Adsr {
    /// Creates an idle envelope with 10/100/0.7/200 ms settings.
    pub fn new(sample_rate: f32) -> Self {
        let mut env = Self {
            stage: Stage::Idle,
            level: 0.0,
            sample_rate: sample_rate.max(1.0),
            attack_step: 0.0,
            decay_step: 0.0,
            sustain: 0.7,
            release_coeff: 0.0,
            gate: false,
        };
        env.set_times(10.0, 100.0, 0.7, 200.0);
        env
    }

    /// Updates every segment at once. Times in milliseconds.
    pub fn set_times(&mut self, attack_ms: f32, decay_ms: f32, sustain: f32, release_ms: f32) {
        let samples = |ms: f32| (ms * self.sample_rate / 1000.0).max(1.0);
        self.sustain = sustain.clamp(0.0, 1.0);
        self.attack_step = 1.0 / samples(attack_ms);
        self.decay_step = (1.0 - self.sustain) / samples(decay_ms);
        // -80 dB over the release time
        self.release_coeff = libm::expf(libm::logf(IDLE_THRESHOLD) / samples(release_ms));
    }

    /// Sets the sample rate; call [`set_times`](Self::set_times) afterwards.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Applies the gate. Rising edges retrigger, falling edges release.
    pub fn set_gate(&mut self, on: bool) {
        if on && !self.gate {
            self.stage = Stage::Attack;
        } else if !on && self.gate && self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
        self.gate = on;
    }

    /// Returns to idle at zero.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.gate = false;
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Advances one sample.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= self.decay_step;
                if self.level <= self.sustain {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.level = self.sustain,
            Stage::Release => {
                self.level *= self.release_coeff;
                if self.level < IDLE_THRESHOLD {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn idle_until_gated() {
        let mut env = Adsr::new(SR);
        assert_eq!(env.advance(), 0.0);
        assert_eq!(env.stage(), Stage::Idle);
    }

    #[test]
    fn reaches_sustain() {
        let mut env = Adsr::new(SR);
        env.set_times(1.0, 1.0, 0.5, 10.0);
        env.set_gate(true);
        for _ in 0..200 {
            env.advance();
        }
        assert_eq!(env.stage(), Stage::Sustain);
        assert!((env.advance() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn release_reaches_idle_in_release_time() {
        let mut env = Adsr::new(SR);
        env.set_times(1.0, 1.0, 0.8, 10.0);
        env.set_gate(true);
        for _ in 0..200 {
            env.advance();
        }
        env.set_gate(false);
        assert_eq!(env.stage(), Stage::Release);
        // 10 ms = 480 samples, plus slack for rounding
        for _ in 0..500 {
            env.advance();
        }
        assert_eq!(env.stage(), Stage::Idle);
        assert_eq!(env.advance(), 0.0);
    }

    #[test]
    fn holding_gate_does_not_retrigger() {
        let mut env = Adsr::new(SR);
        env.set_times(1.0, 1.0, 0.5, 10.0);
        env.set_gate(true);
        for _ in 0..200 {
            env.advance();
        }
        env.set_gate(true);
        assert_eq!(env.stage(), Stage::Sustain);
    }

    #[test]
    fn output_stays_in_unit_range() {
        let mut env = Adsr::new(SR);
        env.set_times(0.5, 5.0, 0.3, 5.0);
        for block in 0..40 {
            env.set_gate(block % 7 < 4);
            for _ in 0..64 {
                let v = env.advance();
                assert!((0.0..=1.0).contains(&v), "level {v}");
            }
        }
    }
}
