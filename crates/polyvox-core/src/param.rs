//! Parameter descriptors for every control a compiled unit exposes.
//!
//! Each value control declared by a unit becomes one [`ParamDescriptor`],
//! addressed two ways:
//!
//! - [`ParamId`]: 0-based, contiguous, assigned in declaration order
//! - `path`: hierarchical string built from the enclosing group labels
//!   (e.g. `/synth/envelope/attack`)
//!
//! Descriptors are immutable once the owning [`ParamTable`](crate::ParamTable)
//! is built. Live values never live here; they belong to the voice pool.
//!
//! # Normalization
//!
//! The `scale` metadata key selects the curve used by
//! [`normalize`](ParamDescriptor::normalize) and
//! [`denormalize`](ParamDescriptor::denormalize):
//!
//! - **Linear** (default): `normalized = (value - min) / (max - min)`
//! - **Logarithmic** (`scale: log`): `normalized = ln(value/min) / ln(max/min)`
//! - **Exponential** (`scale: exp`): `normalized = ln(1 + t·(e-1))` with
//!   `t = (value - min) / (max - min)`

use core::fmt;

/// Stable parameter identifier.
///
/// Ids are assigned `0..N-1` in the order the unit declares its controls and
/// never change for the lifetime of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub u32);

impl ParamId {
    /// Returns the id as a table index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses a parameter either by id or by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRef<'a> {
    /// Integer id.
    Id(ParamId),
    /// Hierarchical path string.
    Path(&'a str),
}

impl From<ParamId> for ParamRef<'_> {
    fn from(id: ParamId) -> Self {
        ParamRef::Id(id)
    }
}

impl<'a> From<&'a str> for ParamRef<'a> {
    fn from(path: &'a str) -> Self {
        ParamRef::Path(path)
    }
}

impl<'a> From<&'a String> for ParamRef<'a> {
    fn from(path: &'a String) -> Self {
        ParamRef::Path(path.as_str())
    }
}

/// Widget kind a control was declared with.
///
/// Bargraphs are output controls: the unit writes them, clients only read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Momentary button (0 or 1).
    Button,
    /// Toggle (0 or 1).
    CheckButton,
    /// Vertical slider.
    VerticalSlider,
    /// Horizontal slider.
    HorizontalSlider,
    /// Numeric entry.
    NumEntry,
    /// Horizontal meter.
    HorizontalBargraph,
    /// Vertical meter.
    VerticalBargraph,
}

impl ControlKind {
    /// Returns `true` for controls the unit writes (bargraphs).
    #[inline]
    pub const fn is_output(self) -> bool {
        matches!(
            self,
            ControlKind::HorizontalBargraph | ControlKind::VerticalBargraph
        )
    }

    /// Short type name used by introspection documents.
    pub const fn type_name(self) -> &'static str {
        match self {
            ControlKind::Button => "button",
            ControlKind::CheckButton => "checkbox",
            ControlKind::VerticalSlider => "vslider",
            ControlKind::HorizontalSlider => "hslider",
            ControlKind::NumEntry => "nentry",
            ControlKind::HorizontalBargraph => "hbargraph",
            ControlKind::VerticalBargraph => "vbargraph",
        }
    }
}

/// Value range of a control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Initial value.
    pub init: f32,
    /// Minimum value.
    pub min: f32,
    /// Maximum value.
    pub max: f32,
    /// Recommended increment (0 for continuous meters).
    pub step: f32,
}

impl ParamRange {
    /// Creates a range.
    pub const fn new(init: f32, min: f32, max: f32, step: f32) -> Self {
        Self {
            init,
            min,
            max,
            step,
        }
    }

    /// Range of a button or check button: init 0, 0..1, step 1.
    pub const fn toggle() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Range of a meter: init at `min`, no step.
    pub const fn meter(min: f32, max: f32) -> Self {
        Self::new(min, min, max, 0.0)
    }
}

/// Normalization curve, selected by the `scale` metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamScale {
    /// Equal resolution across the range.
    #[default]
    Linear,
    /// More resolution at low values. Requires `min > 0`.
    Logarithmic,
    /// More resolution at high values.
    Exponential,
}

impl ParamScale {
    /// Parses the value of a `scale` metadata entry.
    pub fn from_metadata(value: &str) -> Self {
        match value.trim() {
            "log" => ParamScale::Logarithmic,
            "exp" => ParamScale::Exponential,
            _ => ParamScale::Linear,
        }
    }
}

/// Describes one value control of a compiled unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    /// Stable id (declaration order).
    pub id: ParamId,
    /// Label as declared, with inline `[key:value]` metadata stripped.
    pub label: String,
    /// Normalized hierarchical path, unique within the table.
    pub path: String,
    /// Declared widget kind.
    pub kind: ControlKind,
    /// Value range.
    pub range: ParamRange,
    /// Free-form annotations in declaration order.
    pub meta: Vec<(String, String)>,
    /// Normalization curve derived from the `scale` annotation.
    pub scale: ParamScale,
}

impl ParamDescriptor {
    /// Returns the first annotation value for `key`.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if the control is written by the unit.
    #[inline]
    pub fn is_output(&self) -> bool {
        self.kind.is_output()
    }

    /// Last path segment (the control's own normalized label).
    pub fn leaf(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Clamps a value to the control's range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        let (lo, hi) = self.bounds();
        if value < lo {
            lo
        } else if value > hi {
            hi
        } else {
            value
        }
    }

    /// Converts a plain value to \[0.0, 1.0\] respecting [`ParamScale`].
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        let ParamRange { min, max, .. } = self.range;
        let range = max - min;
        if range == 0.0 {
            return 0.0;
        }
        let linear = ((self.clamp(value) - min) / range).clamp(0.0, 1.0);
        match self.scale {
            ParamScale::Linear => linear,
            ParamScale::Logarithmic => {
                if min <= 0.0 || max <= 0.0 {
                    return linear;
                }
                libm::logf(self.clamp(value) / min) / libm::logf(max / min)
            }
            ParamScale::Exponential => {
                libm::logf(1.0 + linear * (core::f32::consts::E - 1.0))
            }
        }
    }

    /// Converts a normalized value (0.0 to 1.0) back to the control's range.
    #[inline]
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let ParamRange { min, max, .. } = self.range;
        let n = normalized.clamp(0.0, 1.0);
        match self.scale {
            ParamScale::Linear => min + n * (max - min),
            ParamScale::Logarithmic => {
                if min <= 0.0 || max <= 0.0 {
                    return min + n * (max - min);
                }
                min * libm::powf(max / min, n)
            }
            ParamScale::Exponential => {
                let t = (libm::expf(n) - 1.0) / (core::f32::consts::E - 1.0);
                min + t * (max - min)
            }
        }
    }

    /// `(low, high)` bounds, tolerant of reversed ranges.
    #[inline]
    fn bounds(&self) -> (f32, f32) {
        let ParamRange { min, max, .. } = self.range;
        if min <= max { (min, max) } else { (max, min) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(min: f32, max: f32, scale: ParamScale) -> ParamDescriptor {
        ParamDescriptor {
            id: ParamId(0),
            label: "cutoff".to_string(),
            path: "/synth/cutoff".to_string(),
            kind: ControlKind::HorizontalSlider,
            range: ParamRange::new(min, min, max, 0.01),
            meta: vec![("unit".to_string(), "Hz".to_string())],
            scale,
        }
    }

    #[test]
    fn clamp_limits_to_range() {
        let desc = descriptor(0.0, 10.0, ParamScale::Linear);
        assert_eq!(desc.clamp(-1.0), 0.0);
        assert_eq!(desc.clamp(5.0), 5.0);
        assert_eq!(desc.clamp(11.0), 10.0);
    }

    #[test]
    fn normalize_denormalize_linear() {
        let desc = descriptor(0.0, 100.0, ParamScale::Linear);
        assert_eq!(desc.normalize(50.0), 0.5);
        assert_eq!(desc.denormalize(0.25), 25.0);
    }

    #[test]
    fn normalize_denormalize_log() {
        let desc = descriptor(20.0, 20000.0, ParamScale::Logarithmic);
        let mid = desc.denormalize(0.5);
        assert!((mid - 632.45).abs() < 1.0, "got {mid}");
        assert!((desc.normalize(mid) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn normalize_denormalize_exp_endpoints() {
        let desc = descriptor(0.0, 1.0, ParamScale::Exponential);
        assert!(desc.denormalize(0.0).abs() < 1e-6);
        assert!((desc.denormalize(1.0) - 1.0).abs() < 1e-5);
        assert!((desc.normalize(desc.denormalize(0.3)) - 0.3).abs() < 1e-4);
    }

    #[test]
    fn zero_range_normalizes_to_zero() {
        let desc = descriptor(1.0, 1.0, ParamScale::Linear);
        assert_eq!(desc.normalize(1.0), 0.0);
    }

    #[test]
    fn metadata_lookup_and_leaf() {
        let desc = descriptor(0.0, 1.0, ParamScale::Linear);
        assert_eq!(desc.metadata("unit"), Some("Hz"));
        assert_eq!(desc.metadata("midi"), None);
        assert_eq!(desc.leaf(), "cutoff");
    }

    #[test]
    fn bargraphs_are_outputs() {
        assert!(ControlKind::VerticalBargraph.is_output());
        assert!(!ControlKind::NumEntry.is_output());
        assert_eq!(ControlKind::HorizontalSlider.type_name(), "hslider");
    }

    #[test]
    fn scale_from_metadata() {
        assert_eq!(ParamScale::from_metadata("log"), ParamScale::Logarithmic);
        assert_eq!(ParamScale::from_metadata(" exp "), ParamScale::Exponential);
        assert_eq!(ParamScale::from_metadata("anything"), ParamScale::Linear);
    }
}
