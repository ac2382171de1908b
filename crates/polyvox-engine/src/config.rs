//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! unit = "organ"
//! sample_rate = 48000
//! buffer_size = 256
//! polyphony = 16
//!
//! [release]
//! stop_level = 0.001
//!
//! [network]
//! host = "127.0.0.1"
//! xmit = "alias"
//!
//! [midi]
//! channel = 1
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use polyvox_control::NetworkConfig;
use polyvox_voice::{MAX_CHANNELS, ReleasePolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Polyphony when neither the configuration nor the unit asks for one.
pub const DEFAULT_POLYPHONY: usize = 8;

/// Errors that can occur loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }
}

/// Releasing-voice retirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Peak level below which a releasing voice is freed.
    pub stop_level: f32,
    /// Minimum time a voice spends releasing.
    pub min_release_ms: f32,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        let policy = ReleasePolicy::default();
        Self {
            stop_level: policy.stop_level,
            min_release_ms: policy.min_release_ms,
        }
    }
}

impl From<ReleaseConfig> for ReleasePolicy {
    fn from(config: ReleaseConfig) -> Self {
        ReleasePolicy {
            stop_level: config.stop_level,
            min_release_ms: config.min_release_ms,
        }
    }
}

/// Performance input settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// 1-based channel to listen on; all channels when absent.
    pub channel: Option<u8>,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registry name of the unit to load.
    pub unit: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Period size in frames.
    pub buffer_size: u32,
    /// Output channels of the audio device.
    pub channels: u16,
    /// Voice count; defaults to the unit's `nvoices`, then 8.
    pub polyphony: Option<usize>,
    /// Output device name filter; system default when absent.
    pub device: Option<String>,
    /// Connect to the system device automatically.
    pub auto_connect: bool,
    /// Releasing-voice retirement.
    pub release: ReleaseConfig,
    /// Network control surface.
    pub network: NetworkConfig,
    /// Performance input.
    pub midi: MidiConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unit: "organ".to_string(),
            sample_rate: 44100,
            buffer_size: 512,
            channels: 2,
            polyphony: None,
            device: None,
            auto_connect: true,
            release: ReleaseConfig::default(),
            network: NetworkConfig::default(),
            midi: MidiConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), unit = %config.unit, "configuration loaded");
        Ok(config)
    }

    /// Parses and validates a configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks ranges and consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.unit.trim().is_empty() {
            return invalid("unit name is empty".into());
        }
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".into());
        }
        if self.buffer_size == 0 {
            return invalid("buffer_size must be at least 1".into());
        }
        if self.channels == 0 || usize::from(self.channels) > MAX_CHANNELS {
            return invalid(format!("channels must be 1..={MAX_CHANNELS}"));
        }
        if self.polyphony == Some(0) {
            return invalid("polyphony must be at least 1".into());
        }
        if !self.release.stop_level.is_finite() || self.release.stop_level < 0.0 {
            return invalid("release.stop_level must be a non-negative number".into());
        }
        if !self.release.min_release_ms.is_finite() || self.release.min_release_ms < 0.0 {
            return invalid("release.min_release_ms must be a non-negative number".into());
        }
        let net = &self.network;
        if net.in_port == net.out_port || net.in_port == net.err_port || net.out_port == net.err_port {
            return invalid(format!(
                "network ports must be distinct (in {}, out {}, err {})",
                net.in_port, net.out_port, net.err_port
            ));
        }
        if let Some(channel) = self.midi.channel
            && !(1..=16).contains(&channel)
        {
            return invalid(format!("midi.channel {channel} is outside 1..=16"));
        }
        Ok(())
    }

    /// 0-based MIDI channel filter.
    pub fn midi_channel(&self) -> Option<u8> {
        self.midi.channel.map(|c| c.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvox_control::XmitMode;

    #[test]
    fn empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.network.in_port, 5510);
        assert_eq!(config.release.stop_level, 0.0005);
    }

    #[test]
    fn sections_override_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            unit = "pluck"
            polyphony = 3
            [network]
            xmit = "off"
            bundle = true
            [midi]
            channel = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.unit, "pluck");
        assert_eq!(config.polyphony, Some(3));
        assert_eq!(config.network.xmit, XmitMode::Off);
        assert!(config.network.bundle);
        assert_eq!(config.network.host, "192.168.1.112");
        assert_eq!(config.midi_channel(), Some(9));
    }

    #[test]
    fn validation_rejects_bad_values() {
        for text in [
            "polyphony = 0",
            "buffer_size = 0",
            "sample_rate = 0",
            "channels = 9",
            "unit = ''",
            "[midi]\nchannel = 17",
            "[network]\nout_port = 5510",
            "[release]\nstop_level = -1.0",
        ] {
            assert!(
                matches!(EngineConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = EngineConfig::from_toml_str("sample_rate = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn release_config_converts_to_policy() {
        let policy: ReleasePolicy = ReleaseConfig {
            stop_level: 0.01,
            min_release_ms: 50.0,
        }
        .into();
        assert_eq!(policy.stop_level, 0.01);
        assert_eq!(policy.min_release_ms, 50.0);
    }
}
