//! Error types for the player.
//!
//! Every failure the coordinator can observe is converted into a
//! [`PlayerError`] and then into the session's `last_error` message.
//! The `Display` text of each variant is what the user sees.

use thiserror::Error;

/// Largest file (in bytes) accepted by the intake check: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Errors raised by the UI-layer file intake guards.
///
/// These never reach the sequencer; the session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// File name lacks a `.mid` / `.midi` extension.
    #[error("Please select a valid MIDI file (.mid or .midi)")]
    Extension,
    /// File is larger than [`MAX_FILE_SIZE`].
    #[error("File is too large ({size} bytes). Please select a file smaller than 10MB.")]
    TooLarge { size: u64 },
    /// The file could not be read from disk.
    #[error("Failed to read the file. Please try again.")]
    Read,
}

/// Errors surfaced by the playback coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// No audio output is available, or the output context could not be created.
    #[error("Failed to initialize audio: {0}. Please restart the player and try again.")]
    AudioInit(String),
    /// The instrument samples could not be loaded.
    #[error("Failed to load instrument: {0}")]
    InstrumentLoad(String),
    /// The selected file was rejected before reaching the sequencer.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The sequencer could not parse the file bytes.
    #[error("Failed to load MIDI file ({0}). Please try a different file.")]
    MalformedFile(String),
    /// A play/pause/stop/tempo command failed.
    #[error("Playback error occurred ({0}). Please try again.")]
    Transport(String),
    /// A command arrived before audio initialization finished.
    #[error("Audio is still loading. Please wait.")]
    NotReady,
    /// A transport command arrived with no file loaded.
    #[error("No MIDI file loaded.")]
    NoFile,
}

impl PlayerError {
    /// Fatal errors disable every control for the rest of the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlayerError::AudioInit(_) | PlayerError::InstrumentLoad(_))
    }
}
