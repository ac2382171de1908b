//! Error types for control surfaces.

use polyvox_core::{LookupError, ParamError};
use thiserror::Error;

/// Errors raised while mapping or dispatching control input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    /// A `midi` metadata value could not be parsed.
    #[error("invalid midi mapping '{value}' on '{path}'")]
    InvalidMidiMapping {
        /// Parameter carrying the metadata.
        path: String,
        /// Offending metadata value.
        value: String,
    },

    /// An `acc`/`gyr` metadata value could not be parsed.
    #[error("invalid sensor mapping '{value}' on '{path}'")]
    InvalidSensorMapping {
        /// Parameter carrying the metadata.
        path: String,
        /// Offending metadata value.
        value: String,
    },

    /// An `osc` alias metadata value could not be parsed.
    #[error("invalid network alias '{value}' on '{path}'")]
    InvalidAlias {
        /// Parameter carrying the metadata.
        path: String,
        /// Offending metadata value.
        value: String,
    },

    /// Sensor axis outside 0..=2.
    #[error("invalid sensor axis {0}: expected 0, 1 or 2")]
    InvalidAxis(i32),

    /// Sensor curve above 3.
    #[error("invalid sensor curve {0}: expected 0..=3 or negative to remove")]
    InvalidCurve(i32),

    /// The network surface has no address matching the message.
    #[error("unknown address '{0}'")]
    UnknownAddress(String),

    /// A `/voice<N>` address names a slot with no sounding voice.
    #[error("no sounding voice at index {0}")]
    NoLiveVoice(usize),

    /// Network settings can only change while the engine is stopped.
    #[error("cannot change network configuration while running")]
    ReconfigureWhileRunning,

    /// Lookup failure from the voice pool.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Rejected parameter write.
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Result alias for control operations.
pub type Result<T> = std::result::Result<T, ControlError>;
