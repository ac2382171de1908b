//! Polyvox Units - reference compiled units
//!
//! Small mono/stereo units implementing [`DspUnit`](polyvox_core::DspUnit),
//! used by the CLI, tests and benchmarks in place of externally compiled
//! DSP code.
//!
//! | Id | Unit | Outputs | Notes |
//! |----|------|---------|-------|
//! | `dc` | [`DcUnit`] | 1 | constant level, linear release |
//! | `organ` | [`OrganUnit`] | 2 | additive, ADSR, MIDI CC 7 volume, level meter |
//! | `pluck` | [`PluckUnit`] | 1 | Karplus–Strong, `-double` compile option |
//!
//! # Example
//!
//! ```rust
//! use polyvox_units::UnitRegistry;
//!
//! let registry = UnitRegistry::new();
//! let factory = registry.factory("organ").unwrap();
//! let unit = factory.create_instance().unwrap();
//! assert_eq!(unit.num_outputs(), 2);
//! ```

pub mod dc;
pub mod envelope;
pub mod organ;
pub mod pluck;
pub mod registry;

pub use dc::DcUnit;
pub use envelope::{Adsr, Stage};
pub use organ::OrganUnit;
pub use pluck::PluckUnit;
pub use registry::{RegisteredUnit, UnitConstructor, UnitDescriptor, UnitRegistry};
