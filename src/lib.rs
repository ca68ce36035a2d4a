//! midiplayer - A terminal MIDI file player.
//!
//! This library provides the playback session, the audio backends and the
//! terminal interface used by the `midiplayer` binary.

pub mod app;
pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod player;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use config::PlayerConfig;
pub use error::{PlayerError, ValidationError};
pub use midi::{MidiSequencer, Sequencer, SequencerEvent};
pub use player::{PlaybackSession, Player};
