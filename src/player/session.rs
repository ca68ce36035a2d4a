//! UI-visible playback state.

use crate::midi::DEFAULT_TEMPO;
use std::sync::Arc;

/// Everything the UI shows about the current session.
///
/// Only the [`Player`](super::Player) mutates it; the UI reads it through
/// the accessors below.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub(super) audio_ready: bool,
    pub(super) file_buffer: Option<Arc<[u8]>>,
    pub(super) file_name: String,
    pub(super) format: Option<u8>,
    pub(super) tempo_bpm: u32,
    pub(super) is_playing: bool,
    pub(super) progress_percent: f64,
    pub(super) last_error: Option<String>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            audio_ready: false,
            file_buffer: None,
            file_name: String::new(),
            format: None,
            tempo_bpm: DEFAULT_TEMPO,
            is_playing: false,
            progress_percent: 0.0,
            last_error: None,
        }
    }
}

impl PlaybackSession {
    /// True once the audio context and instrument are ready.
    pub fn audio_ready(&self) -> bool {
        self.audio_ready
    }

    /// True once a file has been loaded successfully.
    pub fn file_loaded(&self) -> bool {
        self.file_buffer.is_some()
    }

    /// Raw bytes of the loaded file.
    pub fn file_buffer(&self) -> Option<&Arc<[u8]>> {
        self.file_buffer.as_ref()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// SMF format of the loaded file, if known.
    pub fn format(&self) -> Option<u8> {
        self.format
    }

    /// "Type 1", or "Unknown" when no format was reported.
    pub fn format_label(&self) -> String {
        match self.format {
            Some(format) => format!("Type {}", format),
            None => "Unknown".to_string(),
        }
    }

    pub fn tempo_bpm(&self) -> u32 {
        self.tempo_bpm
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Completion in percent, 0.0 to 100.0.
    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
