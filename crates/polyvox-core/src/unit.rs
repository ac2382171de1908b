//! Compiled-unit boundary.
//!
//! A compiled unit is an opaque mono signal-processing computation. Polyvox
//! never looks inside it: it only walks its declared interface, pushes
//! parameter values by [`ParamId`], and calls [`DspUnit::compute`] once per
//! period. One instance is created per voice.
//!
//! # Real-time contract
//!
//! `compute`, `set_param`, `param` and `instance_clear` are called from the
//! audio thread and must not allocate, lock, or block.

use crate::error::ConstructionError;
use crate::param::ParamId;
use crate::walk::InterfaceWalker;

/// A running instance of a compiled unit.
pub trait DspUnit: Send {
    /// Number of input channels.
    fn num_inputs(&self) -> usize;

    /// Number of output channels.
    fn num_outputs(&self) -> usize;

    /// Prepares the instance for the given sample rate and resets its state.
    fn init(&mut self, sample_rate: u32);

    /// Clears internal state (delay lines, envelopes) without touching
    /// parameter values.
    fn instance_clear(&mut self);

    /// Walks the declared interface. Must produce the same walk every call.
    fn declare_interface(&self, walker: &mut dyn InterfaceWalker);

    /// Declares unit-level metadata (name, author, `compile_options`, ...).
    fn declare_metadata(&self, meta: &mut dyn Meta);

    /// Writes a control value. Ids follow declaration order.
    fn set_param(&mut self, id: ParamId, value: f32);

    /// Reads a control value; for output controls this is the value the unit
    /// wrote during the last `compute`.
    fn param(&self, id: ParamId) -> f32;

    /// Renders `frames` frames. `inputs` holds `num_inputs()` slices and
    /// `outputs` holds `num_outputs()` slices, each at least `frames` long.
    fn compute(&mut self, frames: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]);
}

/// Creates unit instances. Stands in for the external DSP compiler/loader.
pub trait UnitFactory: Send + Sync {
    /// Registry name of the unit.
    fn name(&self) -> &str;

    /// Creates a fresh, uninitialized instance.
    fn create_instance(&self) -> Result<Box<dyn DspUnit>, ConstructionError>;
}

/// Receives unit-level metadata declarations.
pub trait Meta {
    /// One key/value declaration.
    fn declare(&mut self, key: &str, value: &str);
}

/// Numeric precision the unit was compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePrecision {
    /// 32-bit samples.
    #[default]
    Single,
    /// 64-bit samples (`-double` compile option).
    Double,
}

/// Collected unit-level metadata, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitMetadata {
    entries: Vec<(String, String)>,
}

impl UnitMetadata {
    /// Collects the metadata a unit declares.
    pub fn collect(unit: &dyn DspUnit) -> Self {
        let mut meta = Self::default();
        unit.declare_metadata(&mut meta);
        meta
    }

    /// First value declared for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Returns `true` if the space-separated `compile_options` contain `option`.
    pub fn has_compile_option(&self, option: &str) -> bool {
        self.get("compile_options")
            .is_some_and(|opts| opts.split_whitespace().any(|tok| tok == option))
    }

    /// Precision detected from the `-double` compile option.
    pub fn precision(&self) -> SamplePrecision {
        if self.has_compile_option("-double") {
            SamplePrecision::Double
        } else {
            SamplePrecision::Single
        }
    }

    /// Voice count requested through the `nvoices` key, if any.
    pub fn nvoices(&self) -> Option<usize> {
        self.get("nvoices")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    }
}

impl Meta for UnitMetadata {
    fn declare(&mut self, key: &str, value: &str) {
        self.entries.push((key.to_string(), value.to_string()));
    }
}
