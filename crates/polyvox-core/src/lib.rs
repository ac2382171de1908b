//! Polyvox Core - parameter table and compiled-unit boundary
//!
//! This crate defines everything the rest of polyvox agrees on before a
//! single sample is rendered: how a compiled unit describes its controls, how
//! those controls are numbered and addressed, and how failures are classified.
//!
//! # Core Abstractions
//!
//! ## Compiled units
//!
//! - [`DspUnit`] - Object-safe trait for one running unit instance
//! - [`UnitFactory`] - Creates instances (one per voice)
//! - [`UnitMetadata`] - Unit-level key/value declarations, precision detection
//!
//! ## Interface walk
//!
//! - [`InterfaceWalker`] - Receives the unit's declared interface
//! - [`ControlSurface`] - Receives the replayed walk of a built table
//!
//! ## Parameters
//!
//! - [`ParamTable`] - Id and path registry built once per engine
//! - [`ParamDescriptor`] - Range, path, metadata and normalization of a control
//! - [`ParamRef`] - Address a parameter by id or by path
//!
//! ## Errors
//!
//! - [`ConstructionError`], [`LookupError`], [`ValueError`], [`ParamError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use polyvox_core::{ParamTable, ParamRef};
//!
//! let unit = factory.create_instance()?;
//! let table = ParamTable::build(unit.as_ref())?;
//!
//! let id = table.id_of("/organ/volume")?;
//! assert_eq!(table.path_of(id)?, "/organ/volume");
//!
//! // Every surface sees the same walk
//! table.replay(&mut midi_surface);
//! table.replay(&mut json_surface);
//! ```

pub mod error;
pub mod param;
pub mod table;
pub mod unit;
pub mod walk;

// Re-export main types at crate root
pub use error::{ConstructionError, LookupError, ParamError, ValueError};
pub use param::{ControlKind, ParamDescriptor, ParamId, ParamRange, ParamRef, ParamScale};
pub use table::{NoteRole, ParamTable, SoundfileDescriptor};
pub use unit::{DspUnit, Meta, SamplePrecision, UnitFactory, UnitMetadata};
pub use walk::{ControlSurface, GroupKind, InterfaceWalker};
