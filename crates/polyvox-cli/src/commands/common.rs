//! Shared helpers for commands.

use std::path::Path;

use anyhow::Context;
use polyvox_engine::{Engine, EngineConfig, OfflineDriver, OfflineHandle};
use polyvox_units::UnitRegistry;

/// Loads a configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Builds the configured unit on an offline driver.
pub fn offline_engine(config: &EngineConfig) -> anyhow::Result<(Engine, OfflineHandle)> {
    let driver = OfflineDriver::new(
        config.sample_rate,
        config.buffer_size as usize,
        0,
        usize::from(config.channels),
    );
    let handle = driver.handle();
    let engine = Engine::from_registry(&UnitRegistry::new(), config, Box::new(driver))?;
    Ok((engine, handle))
}
