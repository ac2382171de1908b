//! Error types for the engine.

use polyvox_control::ControlError;
use polyvox_core::{ConstructionError, LookupError, ParamError, ValueError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors from an audio driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No audio device available.
    #[error("no audio device available")]
    NoDevice,

    /// No output device matched the requested name.
    #[error("no output device matching '{0}'")]
    DeviceNotFound(String),

    /// The render callback was already installed.
    #[error("render callback already installed")]
    AlreadyInstalled,

    /// Start was called before a render callback was installed.
    #[error("no render callback installed")]
    NotInstalled,

    /// Stream construction or control failed.
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Unit or engine construction failed.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// Unknown parameter or stale voice.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Rejected parameter value.
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Control surface failure.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Audio driver failure.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The configured unit is not registered.
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    /// The render command queue is full.
    #[error("render command queue is full")]
    CommandQueueFull,
}

impl From<ParamError> for Error {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::Lookup(e) => Error::Lookup(e),
            ParamError::Value(e) => Error::Value(e),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
