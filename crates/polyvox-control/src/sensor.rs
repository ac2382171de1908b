//! Accelerometer and gyroscope converters.
//!
//! A control with `acc` or `gyr` metadata (`axis curve amin amid amax`)
//! follows one sensor axis. The sensor value is mapped through a
//! three-point piecewise-linear curve onto the control's `(min, init, max)`:
//!
//! | Curve | amin | amid | amax |
//! |-------|------|------|------|
//! | 0 up | min | init | max |
//! | 1 down | max | init | min |
//! | 2 up-down | min | max | min |
//! | 3 down-up | max | min | max |

use std::sync::Arc;

use polyvox_core::{ControlSurface, GroupKind, ParamDescriptor, ParamId};
use polyvox_voice::{VoicePool, VoiceScope};

use crate::error::{ControlError, Result};

/// Sensor family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Accelerometer (`acc` metadata).
    Accelerometer,
    /// Gyroscope (`gyr` metadata).
    Gyroscope,
}

impl SensorKind {
    /// Metadata key for this family.
    pub const fn key(self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "acc",
            SensorKind::Gyroscope => "gyr",
        }
    }
}

/// Shape of the sensor-to-value mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// Rising.
    Up = 0,
    /// Falling.
    Down = 1,
    /// Peak at the midpoint.
    UpDown = 2,
    /// Trough at the midpoint.
    DownUp = 3,
}

impl Curve {
    /// Curve for a numeric code; negative codes mean "no curve".
    pub fn from_code(code: i32) -> Result<Option<Self>> {
        match code {
            c if c < 0 => Ok(None),
            0 => Ok(Some(Curve::Up)),
            1 => Ok(Some(Curve::Down)),
            2 => Ok(Some(Curve::UpDown)),
            3 => Ok(Some(Curve::DownUp)),
            c => Err(ControlError::InvalidCurve(c)),
        }
    }
}

/// Piecewise-linear map through `(lo, mid, hi)` sensor points.
///
/// Input is clamped to `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolator3 {
    from: [f32; 3],
    to: [f32; 3],
}

impl Interpolator3 {
    /// Maps `from` points onto `to` points.
    pub fn new(from: [f32; 3], to: [f32; 3]) -> Self {
        Self { from, to }
    }

    /// Interpolated value at `x`.
    pub fn map(&self, x: f32) -> f32 {
        let [lo, mid, hi] = self.from;
        let x = x.max(lo).min(hi);
        if x < mid {
            segment(x, lo, mid, self.to[0], self.to[1])
        } else {
            segment(x, mid, hi, self.to[1], self.to[2])
        }
    }
}

fn segment(x: f32, x0: f32, x1: f32, y0: f32, y1: f32) -> f32 {
    if x1 == x0 {
        return y1;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// One control's converter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorBinding {
    /// Target parameter.
    pub id: ParamId,
    /// Sensor axis 0..=2.
    pub axis: usize,
    /// Mapping curve.
    pub curve: Curve,
    /// Sensor calibration points.
    pub points: [f32; 3],
    map: Interpolator3,
}

impl SensorBinding {
    /// Builds a converter for `param`.
    pub fn new(param: &ParamDescriptor, axis: i32, curve: Curve, points: [f32; 3]) -> Result<Self> {
        let axis = usize::try_from(axis)
            .ok()
            .filter(|&a| a < 3)
            .ok_or(ControlError::InvalidAxis(axis))?;
        let (min, init, max) = (param.range.min, param.range.init, param.range.max);
        let to = match curve {
            Curve::Up => [min, init, max],
            Curve::Down => [max, init, min],
            Curve::UpDown => [min, max, min],
            Curve::DownUp => [max, min, max],
        };
        Ok(Self {
            id: param.id,
            axis,
            curve,
            points,
            map: Interpolator3::new(points, to),
        })
    }

    /// Parses `axis curve amin amid amax` metadata.
    ///
    /// Returns `Ok(None)` for a negative curve.
    pub fn parse(param: &ParamDescriptor, kind: SensorKind, value: &str) -> Result<Option<Self>> {
        let invalid = || ControlError::InvalidSensorMapping {
            path: param.path.clone(),
            value: format!("{}: {value}", kind.key()),
        };
        let tokens: Vec<&str> = value.split_whitespace().collect();
        let [axis, curve, lo, mid, hi] = tokens.as_slice() else {
            return Err(invalid());
        };
        let axis: i32 = axis.parse().map_err(|_| invalid())?;
        let curve: i32 = curve.parse().map_err(|_| invalid())?;
        let mut points = [0.0f32; 3];
        for (p, t) in points.iter_mut().zip([lo, mid, hi]) {
            *p = t.parse().map_err(|_| invalid())?;
        }
        match Curve::from_code(curve)? {
            Some(curve) => Self::new(param, axis, curve, points).map(Some),
            None => Ok(None),
        }
    }

    /// Value for a sensor reading.
    pub fn convert(&self, reading: f32) -> f32 {
        self.map.map(reading)
    }
}

/// Accelerometer and gyroscope mappings over a voice pool.
#[derive(Debug)]
pub struct SensorMap {
    pool: Arc<VoicePool>,
    acc: Vec<SensorBinding>,
    gyr: Vec<SensorBinding>,
    rejected: Vec<ControlError>,
}

impl SensorMap {
    /// Creates an empty map.
    pub fn new(pool: Arc<VoicePool>) -> Self {
        Self {
            pool,
            acc: Vec::new(),
            gyr: Vec::new(),
            rejected: Vec::new(),
        }
    }

    fn bindings(&self, kind: SensorKind) -> &Vec<SensorBinding> {
        match kind {
            SensorKind::Accelerometer => &self.acc,
            SensorKind::Gyroscope => &self.gyr,
        }
    }

    fn bindings_mut(&mut self, kind: SensorKind) -> &mut Vec<SensorBinding> {
        match kind {
            SensorKind::Accelerometer => &mut self.acc,
            SensorKind::Gyroscope => &mut self.gyr,
        }
    }

    /// Metadata values that could not be parsed.
    pub fn rejected(&self) -> &[ControlError] {
        &self.rejected
    }

    /// Sets, replaces or (negative `curve`) removes the converter of `id`.
    pub fn set_converter(
        &mut self,
        kind: SensorKind,
        id: ParamId,
        axis: i32,
        curve: i32,
        amin: f32,
        amid: f32,
        amax: f32,
    ) -> Result<()> {
        let desc = self.pool.table().descriptor(id)?.clone();
        let curve = Curve::from_code(curve)?;
        let binding = curve
            .map(|c| SensorBinding::new(&desc, axis, c, [amin, amid, amax]))
            .transpose()?;
        let list = self.bindings_mut(kind);
        list.retain(|b| b.id != id);
        if let Some(binding) = binding {
            list.push(binding);
        }
        Ok(())
    }

    /// Current converter of `id`: `(axis, curve, amin, amid, amax)`.
    pub fn converter(&self, kind: SensorKind, id: ParamId) -> Option<(usize, Curve, f32, f32, f32)> {
        self.bindings(kind)
            .iter()
            .find(|b| b.id == id)
            .map(|b| (b.axis, b.curve, b.points[0], b.points[1], b.points[2]))
    }

    /// Feeds one axis reading to every mapped control. Returns the ids written.
    pub fn propagate(&self, kind: SensorKind, axis: usize, reading: f32) -> Vec<ParamId> {
        let mut changed = Vec::new();
        if !reading.is_finite() {
            return changed;
        }
        for binding in self.bindings(kind).iter().filter(|b| b.axis == axis) {
            if self
                .pool
                .set_value(binding.id, binding.convert(reading), VoiceScope::Global)
                .is_ok()
            {
                changed.push(binding.id);
            }
        }
        changed
    }
}

impl ControlSurface for SensorMap {
    fn open_group(&mut self, _kind: GroupKind, _label: &str) {}

    fn close_group(&mut self) {}

    fn add_control(&mut self, _label: &str, param: &ParamDescriptor) {
        if param.is_output() {
            return;
        }
        for kind in [SensorKind::Accelerometer, SensorKind::Gyroscope] {
            let Some(value) = param.metadata(kind.key()) else {
                continue;
            };
            match SensorBinding::parse(param, kind, value) {
                Ok(Some(binding)) => self.bindings_mut(kind).push(binding),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %param.path, %value, "ignoring sensor mapping");
                    self.rejected.push(err);
                }
            }
        }
    }
}
