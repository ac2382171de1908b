//! Polyvox Control - control surfaces over a voice pool
//!
//! Each surface implements [`ControlSurface`](polyvox_core::ControlSurface)
//! and is populated by replaying the engine's parameter walk into it, so all
//! of them see the same hierarchy:
//!
//! - [`MidiSurface`] - notes and `midi` metadata mappings
//! - [`NetworkSurface`] - path and alias addresses, change transmission
//! - [`SensorMap`] - `acc`/`gyr` converters
//! - [`StatusColor`] - `screencolor` indicator
//! - [`JsonSurface`] - interface description for introspection
//! - [`HostSurface`] - callback table for a scripting host
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use polyvox_control::{MidiEvent, MidiSurface};
//! use polyvox_core::ParamTable;
//! use polyvox_units::UnitRegistry;
//! use polyvox_voice::VoicePool;
//!
//! let unit = UnitRegistry::new().create("organ").unwrap();
//! let table = Arc::new(ParamTable::build(unit.as_ref()).unwrap());
//! let pool = Arc::new(VoicePool::new(table, 8).unwrap());
//!
//! let mut midi = MidiSurface::new(Arc::clone(&pool));
//! pool.table().replay(&mut midi);
//!
//! midi.handle(MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap()).unwrap();
//! assert_eq!(pool.sounding_count(), 1);
//! ```

pub mod error;
pub mod host;
pub mod json;
pub mod midi;
pub mod network;
pub mod sensor;
pub mod status;

pub use error::{ControlError, Result};
pub use host::HostSurface;
pub use json::{JsonSurface, json_meta, json_ui};
pub use midi::{ALL_NOTES_OFF, ALL_SOUND_OFF, MidiBinding, MidiEvent, MidiMapping, MidiSurface};
pub use network::{Alias, NetworkConfig, NetworkPacket, NetworkSurface, PACKET_CAPACITY, XmitMode};
pub use sensor::{Curve, Interpolator3, SensorBinding, SensorKind, SensorMap};
pub use status::StatusColor;
