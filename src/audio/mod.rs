//! Audio output and instrument playback.
//!
//! This module defines the two audio seams the player drives:
//! - [`AudioContext`]: the single output context (creation, resume, teardown)
//! - [`Instrument`]: a sampled instrument that triggers and releases named notes
//!
//! The rodio/rustysynth implementations live in [`context`] and [`instrument`].

pub mod context;
pub mod instrument;

pub use context::RodioContext;
pub use instrument::{gm_program, SoundfontInstrument, SoundfontLoader, GM_INSTRUMENTS};

use crate::error::PlayerError;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Instrument preset loaded when none is configured.
pub const DEFAULT_INSTRUMENT: &str = "acoustic_grand_piano";

/// Activation state of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Rendering audio.
    Running,
    /// Created but not rendering until resumed.
    Suspended,
    /// Released; cannot be resumed.
    Closed,
}

/// The audio output context owned by one playback session.
pub trait AudioContext {
    fn state(&self) -> ContextState;

    /// Starts rendering if the context is suspended.
    fn resume(&mut self) -> Result<(), PlayerError>;

    /// Seconds since the context was created.
    fn current_time(&self) -> f64;

    /// Releases the output device. Calling it again is a no-op.
    fn close(&mut self);
}

/// Options for a single triggered note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// Linear amplitude, 0.0 to 1.0.
    pub gain: f32,
}

/// A sampled instrument bound to an audio context.
///
/// All calls are fire-and-forget. Stopping a note that is not sounding
/// does nothing.
pub trait Instrument {
    fn play(&self, note: &str, at: f64, options: PlayOptions);
    fn stop(&self, note: &str, at: f64);
    /// Releases every sounding note.
    fn stop_all(&self, at: f64);
}

/// Loads a named instrument into a context of type `C`.
pub trait InstrumentLoader<C: AudioContext> {
    fn load(&self, context: &mut C, name: &str) -> Result<Box<dyn Instrument>, PlayerError>;
}
