//! Polyvox Engine - the facade a host talks to
//!
//! This crate provides:
//!
//! - **Engine**: [`Engine`] builds a polyphonic instrument from a registered
//!   unit, wires the MIDI, sensor, status and network surfaces to it, and
//!   installs the render callback on an audio driver
//! - **Drivers**: [`OfflineDriver`] for tests and bouncing, [`CpalDriver`]
//!   for the system device
//! - **Configuration**: [`EngineConfig`] loaded from TOML
//! - **Taps**: [`MemoryTap`] and an `rtrb` ring buffer for the mono mix
//! - **Host binding**: [`HostEngine`] with string errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use polyvox_engine::{Engine, EngineConfig, OfflineDriver};
//! use polyvox_units::UnitRegistry;
//!
//! let config = EngineConfig::from_toml_str("unit = \"organ\"")?;
//! let driver = OfflineDriver::new(48000, 256, 0, 2);
//! let handle = driver.handle();
//! let mut engine = Engine::from_registry(&UnitRegistry::new(), &config, Box::new(driver))?;
//!
//! engine.start()?;
//! engine.key_on(60, 100);
//! engine.set_param_value("/organ/volume", 0.8)?;
//! let audio = handle.render(100);
//! ```

pub mod config;
pub mod cpal_driver;
pub mod driver;
pub mod engine;
pub mod error;
pub mod host;
pub mod taps;

pub use config::{ConfigError, DEFAULT_POLYPHONY, EngineConfig, MidiConfig, ReleaseConfig};
pub use cpal_driver::CpalDriver;
pub use driver::{AudioCallback, AudioDriver, ControlCallback, OfflineDriver, OfflineHandle};
pub use engine::{Engine, EngineState};
pub use error::{DriverError, Error, Result};
pub use host::HostEngine;
pub use taps::{CpuLoad, MemoryTap};
