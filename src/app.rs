//! Application state and event handling.
//!
//! This module defines the application state that sits between the
//! terminal interface and the playback [`Player`].

use crate::audio::{AudioContext, InstrumentLoader, RodioContext};
use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::midi::{MidiSequencer, TEMPO_STEP};
use crate::player::{has_midi_extension, Player};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How long a status message stays on screen.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Number of entries the file browser shows at once.
pub const BROWSER_VISIBLE_ENTRIES: usize = 10;

/// State for the file browser dialog.
#[derive(Debug, Clone)]
pub struct FileBrowserState {
    /// Whether the browser is open.
    pub open: bool,
    /// Current directory path.
    pub current_dir: PathBuf,
    /// Directories first, then MIDI files.
    pub entries: Vec<PathBuf>,
    /// Currently selected index.
    pub selected: usize,
    /// Scroll offset for long lists.
    pub scroll: usize,
}

impl Default for FileBrowserState {
    fn default() -> Self {
        Self {
            open: false,
            current_dir: std::env::current_dir().unwrap_or_default(),
            entries: Vec::new(),
            selected: 0,
            scroll: 0,
        }
    }
}

/// Main application state.
pub struct App<C: AudioContext = RodioContext> {
    /// The playback session.
    pub player: Player<C, MidiSequencer>,
    pub config: PlayerConfig,
    pub file_browser: FileBrowserState,
    /// Transient message and the time it was set.
    pub status_message: Option<(String, Instant)>,
    /// Whether the help line is expanded.
    pub show_help: bool,
}

impl<C: AudioContext> App<C> {
    /// Creates the application. Audio is not opened until
    /// [`App::initialize_audio`] runs.
    pub fn new(config: PlayerConfig) -> Self {
        let player = Player::new(MidiSequencer::new(), config.progress_interval());

        let mut file_browser = FileBrowserState::default();
        if let Some(dir) = &config.browse_dir {
            file_browser.current_dir = dir.clone();
        }

        Self {
            player,
            config,
            file_browser,
            status_message: None,
            show_help: false,
        }
    }

    /// True until audio initialization succeeds or fails.
    pub fn is_loading(&self) -> bool {
        !self.player.session().audio_ready() && !self.player.is_fatal() && !self.player.is_disposed()
    }

    /// Opens the audio context and loads the configured instrument.
    ///
    /// # Returns
    ///
    /// true if audio is ready
    pub fn initialize_audio<F, L>(&mut self, open: F, loader: &L) -> bool
    where
        F: FnOnce() -> Result<C, PlayerError>,
        L: InstrumentLoader<C>,
    {
        let instrument = self.config.instrument.clone();
        match self.player.initialize(open, loader, &instrument) {
            Ok(()) => {
                self.set_status(format!("Instrument ready: {}", instrument));
                true
            }
            Err(_) => false,
        }
    }

    // ========== TRANSPORT ==========

    /// Plays or pauses the loaded file.
    pub fn toggle_playback(&mut self) {
        // Disabled until audio is ready and a file is loaded.
        if !self.player.can_play() {
            return;
        }
        let _ = self.player.toggle_playback(Instant::now());
    }

    /// Stops playback and rewinds.
    pub fn stop_playback(&mut self) {
        if self.player.is_fatal() || !self.player.session().file_loaded() {
            return;
        }
        self.player.stop();
    }

    /// Raises the tempo by one step.
    pub fn tempo_up(&mut self) {
        let bpm = self.player.session().tempo_bpm().saturating_add(TEMPO_STEP);
        self.change_tempo(bpm);
    }

    /// Lowers the tempo by one step.
    pub fn tempo_down(&mut self) {
        let bpm = self.player.session().tempo_bpm().saturating_sub(TEMPO_STEP);
        self.change_tempo(bpm);
    }

    fn change_tempo(&mut self, bpm: u32) {
        // The tempo control is disabled until a file is loaded.
        if !self.player.can_play() {
            return;
        }
        let _ = self.player.set_tempo(bpm, Instant::now());
    }

    /// Advances playback and expires old status messages. Called once per frame.
    pub fn tick(&mut self) {
        self.player.update(Instant::now());
        self.clear_expired_status();
    }

    /// Releases audio. Nothing plays after this returns.
    pub fn shutdown(&mut self) {
        self.player.dispose();
    }

    // ========== STATUS ==========

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }

    // ========== FILES ==========

    /// Loads a MIDI file from disk into the player.
    ///
    /// # Returns
    ///
    /// true if the file was loaded
    pub fn open_file(&mut self, path: &Path) -> bool {
        match self.player.open_path(path, Instant::now()) {
            Ok(()) => {
                let name = self.player.session().file_name().to_string();
                self.set_status(format!("Loaded: {}", name));
                true
            }
            Err(_) => false,
        }
    }

    /// Opens the file browser in the last visited directory.
    pub fn open_file_browser(&mut self) {
        if self.player.is_fatal() {
            return;
        }
        self.file_browser.open = true;
        self.file_browser.selected = 0;
        self.file_browser.scroll = 0;
        self.refresh_file_browser();
    }

    /// Re-reads the current directory, keeping folders and MIDI files.
    fn refresh_file_browser(&mut self) {
        self.file_browser.entries.clear();

        if self.file_browser.current_dir.parent().is_some() {
            self.file_browser.entries.push(PathBuf::from(".."));
        }

        match std::fs::read_dir(&self.file_browser.current_dir) {
            Ok(entries) => {
                let mut dirs: Vec<PathBuf> = Vec::new();
                let mut files: Vec<PathBuf> = Vec::new();

                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        dirs.push(path);
                    } else if path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(has_midi_extension)
                    {
                        files.push(path);
                    }
                }

                dirs.sort();
                files.sort();

                self.file_browser.entries.extend(dirs);
                self.file_browser.entries.extend(files);
            }
            Err(e) => {
                tracing::warn!("Failed to list {:?}: {}", self.file_browser.current_dir, e);
            }
        }

        if self.file_browser.selected >= self.file_browser.entries.len() {
            self.file_browser.selected = 0;
        }
    }

    /// Moves selection up in the file browser.
    pub fn file_browser_up(&mut self) {
        if self.file_browser.open && self.file_browser.selected > 0 {
            self.file_browser.selected -= 1;
            if self.file_browser.selected < self.file_browser.scroll {
                self.file_browser.scroll = self.file_browser.selected;
            }
        }
    }

    /// Moves selection down in the file browser.
    pub fn file_browser_down(&mut self) {
        if self.file_browser.open
            && self.file_browser.selected + 1 < self.file_browser.entries.len()
        {
            self.file_browser.selected += 1;
            if self.file_browser.selected >= self.file_browser.scroll + BROWSER_VISIBLE_ENTRIES {
                self.file_browser.scroll = self
                    .file_browser
                    .selected
                    .saturating_sub(BROWSER_VISIBLE_ENTRIES - 1);
            }
        }
    }

    /// Enters the selected directory or loads the selected file.
    ///
    /// # Returns
    ///
    /// true if a file was loaded
    pub fn file_browser_select(&mut self) -> bool {
        if !self.file_browser.open || self.file_browser.entries.is_empty() {
            return false;
        }

        let selected_path = self.file_browser.entries[self.file_browser.selected].clone();

        if selected_path == Path::new("..") {
            if let Some(parent) = self.file_browser.current_dir.parent() {
                self.file_browser.current_dir = parent.to_path_buf();
                self.file_browser.selected = 0;
                self.file_browser.scroll = 0;
                self.refresh_file_browser();
            }
            false
        } else if selected_path.is_dir() {
            self.file_browser.current_dir = selected_path;
            self.file_browser.selected = 0;
            self.file_browser.scroll = 0;
            self.refresh_file_browser();
            false
        } else {
            self.file_browser.open = false;
            self.open_file(&selected_path)
        }
    }

    /// Closes the file browser without loading anything.
    pub fn file_browser_cancel(&mut self) {
        self.file_browser.open = false;
        self.set_status("Load cancelled");
    }
}
