//! Polyvox Voice - polyphony around a single compiled unit
//!
//! Turns one mono [`DspUnit`](polyvox_core::DspUnit) into a fixed-size
//! polyphonic instrument.
//!
//! - [`VoicePool`] - Shared arena: allocation, stealing, release, value overlay
//! - [`VoiceRenderer`] - Audio-thread side: parameter push, compute, mix, retire
//! - [`VoiceHandle`] - Generation-checked reference to one allocation
//! - [`NoteBindings`] - Controls driven by the note (`freq`, `gate`, `gain`, ...)
//!
//! # Threading
//!
//! The pool is wrapped in an `Arc` and shared. Control threads call its
//! methods freely; the renderer reads only atomics and is owned by whatever
//! drives the audio callback.
//!
//! ```text
//! control threads ──► VoicePool (atomics + control mutex) ◄── VoiceRenderer (audio thread)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use polyvox_voice::{VoicePool, VoiceRenderer, VoiceScope, ReleasePolicy};
//!
//! let pool = Arc::new(VoicePool::new(table, 8)?);
//! let mut renderer = VoiceRenderer::new(pool.clone(), units, 48000, 512, ReleasePolicy::default())?;
//!
//! let voice = pool.allocate_by_pitch(60, 100);
//! pool.set_value("/organ/volume", 0.8, VoiceScope::Global)?;
//! renderer.render(512, &[], &mut [&mut left, &mut right]);
//! pool.release(voice, false)?;
//! ```

mod atomic;
pub mod binding;
pub mod handle;
pub mod pool;
pub mod render;

pub use binding::{NoteBindings, midi_to_freq, note_value};
pub use handle::{VoiceHandle, VoiceScope, VoiceState};
pub use pool::VoicePool;
pub use render::{MAX_CHANNELS, ReleasePolicy, VoiceRenderer};
