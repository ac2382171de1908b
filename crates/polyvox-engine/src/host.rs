//! Facade for scripting-host bindings.
//!
//! Hosts get plain `String` errors and a callback-table surface instead of
//! the structured error enums and the [`ControlSurface`](polyvox_core::ControlSurface)
//! trait.

use std::path::Path;
use std::sync::Arc;

use polyvox_control::HostSurface;
use polyvox_units::UnitRegistry;
use rtrb::Producer;

use crate::config::EngineConfig;
use crate::cpal_driver::CpalDriver;
use crate::driver::AudioDriver;
use crate::engine::Engine;
use crate::taps::MemoryTap;

/// Engine wrapper with string errors.
#[derive(Debug)]
pub struct HostEngine {
    engine: Engine,
}

impl HostEngine {
    /// Loads a TOML configuration and builds its unit on the system device.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let config = EngineConfig::load(path).map_err(|e| e.to_string())?;
        let driver = CpalDriver::new(&config).map_err(|e| e.to_string())?;
        Self::with_driver(&config, Box::new(driver))
    }

    /// Builds the configured unit on an explicit driver.
    pub fn with_driver(config: &EngineConfig, driver: Box<dyn AudioDriver>) -> Result<Self, String> {
        let engine =
            Engine::from_registry(&UnitRegistry::new(), config, driver).map_err(|e| e.to_string())?;
        Ok(Self { engine })
    }

    /// Starts audio.
    pub fn start(&mut self) -> Result<(), String> {
        self.engine.start().map_err(|e| e.to_string())
    }

    /// Stops audio and releases the engine.
    pub fn stop(mut self) {
        self.engine.stop();
    }

    /// Walks the interface over the host's callbacks.
    pub fn build_interface(&self, surface: &mut HostSurface<'_>) {
        self.engine.attach(surface);
    }

    /// Mono mix of the most recent period.
    pub fn memory(&self) -> Arc<MemoryTap> {
        self.engine.memory()
    }

    /// Streams the mono mix into `producer`.
    pub fn set_ring_buffer(&mut self, producer: Producer<f32>) -> Result<(), String> {
        self.engine.set_ring_buffer(producer).map_err(|e| e.to_string())
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The wrapped engine, mutably.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::OfflineDriver;
    use polyvox_core::GroupKind;

    fn host(unit: &str) -> (HostEngine, crate::driver::OfflineHandle) {
        let config = EngineConfig {
            unit: unit.into(),
            polyphony: Some(2),
            ..EngineConfig::default()
        };
        let driver = OfflineDriver::new(48000, 32, 0, 1);
        let handle = driver.handle();
        (HostEngine::with_driver(&config, Box::new(driver)).unwrap(), handle)
    }

    #[test]
    fn errors_are_strings() {
        let config = EngineConfig {
            unit: "nope".into(),
            ..EngineConfig::default()
        };
        let err = HostEngine::with_driver(&config, Box::new(OfflineDriver::new(48000, 32, 0, 1)))
            .unwrap_err();
        assert_eq!(err, "unknown unit 'nope'");

        let err = HostEngine::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.starts_with("failed to read file"), "{err}");
    }

    #[test]
    fn build_interface_reports_every_control() {
        let (host, _) = host("organ");
        let mut paths = Vec::new();
        let mut groups = Vec::new();
        {
            let mut surface = HostSurface::new()
                .on_add_control(|_, path, _, _| paths.push(path.to_string()))
                .on_open_group(|kind, label| groups.push((kind, label.to_string())));
            host.build_interface(&mut surface);
        }
        assert_eq!(paths.len(), host.engine().params_count());
        assert!(groups.iter().any(|(k, _)| *k == GroupKind::Horizontal));
    }

    #[test]
    fn start_render_stop() {
        let (mut host, handle) = host("dc");
        host.start().unwrap();
        host.engine().new_voice();
        handle.render_period();
        assert_eq!(host.memory().len(), 32);
        host.stop();
        assert!(!handle.is_started());
    }
}
