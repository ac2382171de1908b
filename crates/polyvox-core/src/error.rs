//! Error taxonomy shared by every polyvox layer.
//!
//! - [`ConstructionError`]: fatal to construction; no partial engine exists.
//! - [`LookupError`]: unknown parameter or stale voice; never fatal.
//! - [`ValueError`]: a value write that cannot be honoured.
//!
//! Voice-pool exhaustion is not an error: it is resolved by stealing.
//! Faults reachable from rendering are not errors either: they degrade to
//! silence inside the render path.

use thiserror::Error;

/// Errors that abort building a parameter table or an engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    /// A `close_group` call had no matching `open_group`.
    #[error("unbalanced interface: close_group without open group after {controls} control(s)")]
    UnbalancedClose {
        /// Number of controls declared before the offending call.
        controls: usize,
    },

    /// The walk ended with groups still open.
    #[error("unbalanced interface: {0} group(s) left open")]
    UnclosedGroups(usize),

    /// Two controls normalize to the same hierarchical path.
    #[error("duplicate parameter path '{0}'")]
    DuplicatePath(String),

    /// A control was declared with an empty label.
    #[error("control declared with an empty label inside '{0}'")]
    EmptyLabel(String),

    /// The unit factory could not create an instance.
    #[error("cannot allocate unit instance: {0}")]
    Instance(String),

    /// Polyphony must be at least one voice.
    #[error("invalid polyphony {0}: at least one voice is required")]
    InvalidPolyphony(usize),
}

/// Errors for addressing something that does not exist (any more).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No parameter with this id.
    #[error("unknown parameter id {0}")]
    UnknownId(u32),

    /// No parameter with this path.
    #[error("unknown parameter path '{0}'")]
    UnknownPath(String),

    /// The handle's generation does not match the live voice at its index.
    #[error("stale voice handle (slot {index}, generation {generation})")]
    StaleVoice {
        /// Pool index encoded in the handle.
        index: usize,
        /// Generation encoded in the handle.
        generation: u64,
    },

    /// No active voice is bound to the pitch.
    #[error("no active voice bound to pitch {0}")]
    NoVoiceForPitch(u8),
}

/// Errors for value writes that cannot be honoured.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// The control is an output (bargraph) written by the unit.
    #[error("parameter '{0}' is read-only")]
    ReadOnly(String),

    /// NaN and infinities are rejected.
    #[error("non-finite value {value} for parameter '{path}'")]
    NonFinite {
        /// Path of the target parameter.
        path: String,
        /// Rejected value.
        value: f32,
    },
}

/// Any failure of a parameter get/set request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    /// Lookup failure.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Value failure.
    #[error(transparent)]
    Value(#[from] ValueError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn unbalanced_close_display() {
        let err = ConstructionError::UnbalancedClose { controls: 3 };
        let msg = err.to_string();
        assert!(msg.contains("close_group"), "got: {msg}");
        assert!(msg.contains('3'), "got: {msg}");
    }

    #[test]
    fn duplicate_path_display() {
        let err = ConstructionError::DuplicatePath("/a/b".to_string());
        assert_eq!(err.to_string(), "duplicate parameter path '/a/b'");
    }

    #[test]
    fn stale_voice_display() {
        let err = LookupError::StaleVoice {
            index: 2,
            generation: 7,
        };
        assert_eq!(
            err.to_string(),
            "stale voice handle (slot 2, generation 7)"
        );
    }

    #[test]
    fn param_error_is_transparent() {
        let err: ParamError = LookupError::UnknownPath("/x".to_string()).into();
        assert_eq!(err.to_string(), "unknown parameter path '/x'");
        assert!(err.source().is_none());
    }

    #[test]
    fn read_only_display() {
        let err = ValueError::ReadOnly("/level".to_string());
        assert_eq!(err.to_string(), "parameter '/level' is read-only");
    }
}
