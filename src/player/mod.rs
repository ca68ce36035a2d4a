//! Playback coordination.
//!
//! The [`Player`] owns the audio context, the instrument and the sequencer
//! for one session, and is the only thing that mutates the
//! [`PlaybackSession`]. It:
//! - gates every command on audio initialization
//! - validates files before they reach the sequencer
//! - applies transport commands to the sequencer before updating `is_playing`
//! - consumes the sequencer's ordered event stream and routes notes to the instrument
//! - polls progress on a fixed interval while playing
//! - turns every failure into `last_error`

mod intake;
mod progress;
mod routing;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use intake::{has_midi_extension, read_file, validate};
pub use progress::{completed_percent, ProgressPoller, MAX_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use routing::{note_action, route_note, NoteAction};
pub use session::PlaybackSession;

use crate::audio::{AudioContext, ContextState, Instrument, InstrumentLoader};
use crate::error::PlayerError;
use crate::midi::{
    clamp_tempo, MidiSequencer, Sequencer, SequencerEvent, SequencerState, DEFAULT_TEMPO,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wraps non-transport failures of a transport command.
fn transport_error(err: PlayerError) -> PlayerError {
    match err {
        PlayerError::Transport(_) => err,
        other => PlayerError::Transport(other.to_string()),
    }
}

/// The playback coordinator for one session.
pub struct Player<C: AudioContext, S: Sequencer = MidiSequencer> {
    session: PlaybackSession,
    context: Option<C>,
    instrument: Option<Box<dyn Instrument>>,
    sequencer: S,
    poller: ProgressPoller,
    /// Set once audio or instrument initialization failed.
    fatal: bool,
    disposed: bool,
}

impl<C: AudioContext, S: Sequencer> Player<C, S> {
    /// Creates a session with audio not yet initialized.
    pub fn new(sequencer: S, poll_interval: Duration) -> Self {
        Self {
            session: PlaybackSession::default(),
            context: None,
            instrument: None,
            sequencer,
            poller: ProgressPoller::new(poll_interval),
            fatal: false,
            disposed: false,
        }
    }

    // ==================== Accessors ====================

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn sequencer(&self) -> &S {
        &self.sequencer
    }

    /// True after an audio or instrument failure; every control stays disabled.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// True while the progress poll is armed.
    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    /// Play/pause and tempo are enabled once a file is loaded and audio is ready.
    pub fn can_play(&self) -> bool {
        self.session.audio_ready && self.session.file_loaded()
    }

    /// "Playing", "Paused" or "Stopped".
    pub fn status_label(&self) -> &'static str {
        if self.session.is_playing {
            "Playing"
        } else if self.sequencer.state() == SequencerState::Paused {
            "Paused"
        } else {
            "Stopped"
        }
    }

    // ==================== Initialization ====================

    /// Opens the audio context and loads the instrument.
    ///
    /// A context that starts suspended is resumed before the instrument is
    /// loaded. Any failure is fatal to the session.
    ///
    /// # Arguments
    ///
    /// * `open` - Creates the audio context
    /// * `loader` - Loads the instrument into the context
    /// * `instrument` - Preset name, e.g. "acoustic_grand_piano"
    pub fn initialize<F, L>(
        &mut self,
        open: F,
        loader: &L,
        instrument: &str,
    ) -> Result<(), PlayerError>
    where
        F: FnOnce() -> Result<C, PlayerError>,
        L: InstrumentLoader<C>,
    {
        if self.disposed {
            return Err(PlayerError::AudioInit("session is closed".to_string()));
        }
        if self.session.audio_ready {
            return Ok(());
        }

        let result = self.try_initialize(open, loader, instrument);
        if result.is_ok() {
            self.fatal = false;
            self.session.last_error = None;
            tracing::info!(instrument, "Audio initialized");
        }
        self.record(result)
    }

    fn try_initialize<F, L>(
        &mut self,
        open: F,
        loader: &L,
        instrument: &str,
    ) -> Result<(), PlayerError>
    where
        F: FnOnce() -> Result<C, PlayerError>,
        L: InstrumentLoader<C>,
    {
        let mut context = open()?;

        if context.state() == ContextState::Suspended {
            if let Err(e) = context.resume() {
                context.close();
                return Err(PlayerError::AudioInit(format!(
                    "audio output stayed suspended ({e})"
                )));
            }
        }

        let loaded = match loader.load(&mut context, instrument) {
            Ok(loaded) => loaded,
            Err(e) => {
                context.close();
                return Err(e);
            }
        };

        self.context = Some(context);
        self.instrument = Some(loaded);
        self.session.audio_ready = true;
        Ok(())
    }

    // ==================== File intake ====================

    /// Reads, validates and loads a file from disk.
    pub fn open_path(&mut self, path: &Path, now: Instant) -> Result<(), PlayerError> {
        let read = self
            .ensure_ready()
            .and_then(|()| read_file(path).map_err(PlayerError::from));
        let (name, bytes) = self.record(read)?;
        self.load_file(&name, bytes, now)
    }

    /// Validates and loads file bytes, replacing the current file.
    ///
    /// Rejected files leave the session untouched. A file the sequencer
    /// cannot parse leaves the previous file loaded and playable.
    pub fn load_file(&mut self, name: &str, bytes: Vec<u8>, now: Instant) -> Result<(), PlayerError> {
        let result = self.try_load_file(name, bytes, now);
        self.record(result)
    }

    fn try_load_file(&mut self, name: &str, bytes: Vec<u8>, now: Instant) -> Result<(), PlayerError> {
        self.ensure_ready()?;
        validate(name, bytes.len() as u64)?;

        // Loading always stops in-flight playback first.
        self.halt();
        self.session.progress_percent = 0.0;

        self.sequencer.load(&bytes)?;
        self.session.file_buffer = Some(Arc::from(bytes));
        self.session.file_name = name.to_string();
        tracing::info!(file = name, "Loaded MIDI file");

        // Applies `FileLoaded`.
        self.pump(now);
        Ok(())
    }

    // ==================== Transport ====================

    /// Starts or resumes playback.
    pub fn play(&mut self, now: Instant) -> Result<(), PlayerError> {
        let result = self.try_play(now);
        self.record(result)
    }

    fn try_play(&mut self, now: Instant) -> Result<(), PlayerError> {
        self.ensure_ready()?;
        if !self.session.file_loaded() {
            return Err(PlayerError::NoFile);
        }
        if self.session.is_playing {
            return Ok(());
        }

        if let Some(context) = self.context.as_mut() {
            if context.state() != ContextState::Running {
                context.resume().map_err(transport_error)?;
            }
        }

        let from_start = self.sequencer.state() == SequencerState::Loaded;
        self.sequencer.play(now).map_err(transport_error)?;

        self.session.is_playing = true;
        if from_start {
            self.session.progress_percent = 0.0;
        }
        self.poller.start(now);
        self.clear_error();
        tracing::info!("Playing");
        Ok(())
    }

    /// Pauses playback, keeping the position.
    pub fn pause(&mut self, now: Instant) -> Result<(), PlayerError> {
        let result = self.try_pause(now);
        self.record(result)
    }

    fn try_pause(&mut self, now: Instant) -> Result<(), PlayerError> {
        self.ensure_ready()?;
        if !self.session.is_playing {
            return Ok(());
        }
        self.sequencer.pause(now);
        self.session.is_playing = false;
        self.poller.cancel();
        self.silence();
        self.clear_error();
        tracing::info!("Paused");
        Ok(())
    }

    /// Pauses when playing, plays otherwise.
    pub fn toggle_playback(&mut self, now: Instant) -> Result<(), PlayerError> {
        if self.session.is_playing {
            self.pause(now)
        } else {
            self.play(now)
        }
    }

    /// Stops playback and rewinds. Always leaves the session stopped at 0%.
    pub fn stop(&mut self) {
        self.halt();
        self.session.progress_percent = 0.0;
        self.clear_error();
        tracing::info!("Stopped");
    }

    /// Changes the playback tempo, clamped to the supported range.
    ///
    /// While playing, the sequencer is paused, retimed and resumed as one
    /// step. If it cannot be resumed the session reports not playing.
    pub fn set_tempo(&mut self, bpm: u32, now: Instant) -> Result<(), PlayerError> {
        let result = self.try_set_tempo(bpm, now);
        self.record(result)
    }

    fn try_set_tempo(&mut self, bpm: u32, now: Instant) -> Result<(), PlayerError> {
        self.ensure_ready()?;
        let bpm = clamp_tempo(bpm);
        if bpm == self.session.tempo_bpm {
            return Ok(());
        }

        if !self.session.is_playing {
            self.sequencer.set_tempo(bpm, now).map_err(transport_error)?;
            self.session.tempo_bpm = bpm;
            self.clear_error();
            return Ok(());
        }

        self.sequencer.pause(now);
        let retimed = self.sequencer.set_tempo(bpm, now);
        if retimed.is_ok() {
            self.session.tempo_bpm = bpm;
        }

        match retimed.and_then(|()| self.sequencer.play(now)) {
            Ok(()) => {
                self.clear_error();
                tracing::debug!(bpm, "Tempo changed");
                Ok(())
            }
            Err(e) => {
                self.session.is_playing = false;
                self.poller.cancel();
                self.silence();
                Err(transport_error(e))
            }
        }
    }

    // ==================== Event loop ====================

    /// Advances the sequencer, applies its events, and polls progress.
    /// Call this from the UI loop.
    pub fn update(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.pump(now);

        if self.session.is_playing && self.poller.due(now) {
            self.session.progress_percent = completed_percent(self.sequencer.percent_remaining());
        }
    }

    /// Drains the sequencer's event stream in order.
    fn pump(&mut self, now: Instant) {
        for event in self.sequencer.poll_events(now) {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: SequencerEvent) {
        match event {
            SequencerEvent::FileLoaded { format } => {
                self.session.format = Some(format);
                self.session.tempo_bpm = DEFAULT_TEMPO;
                self.session.progress_percent = 0.0;
                self.clear_error();
                tracing::debug!(format, "File ready");
            }
            SequencerEvent::Note(note) => {
                let at = self.audio_time();
                if let Some(instrument) = self.instrument.as_deref() {
                    route_note(instrument, &note, at);
                }
            }
            SequencerEvent::SetTempo { tick, bpm } => {
                tracing::debug!(tick, bpm, "Ignoring file tempo change");
            }
            SequencerEvent::Channel { .. } => {}
            SequencerEvent::EndOfFile => {
                self.session.is_playing = false;
                self.poller.cancel();
                self.session.progress_percent = 100.0;
                tracing::info!("End of file");
            }
        }
    }

    // ==================== Teardown ====================

    /// Cancels polling, silences the instrument and releases the audio
    /// context. No instrument call is made afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        // Releases held notes before the instrument goes away.
        self.halt();
        self.instrument = None;

        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.session.audio_ready = false;
        tracing::info!("Playback session closed");
    }

    // ==================== Helpers ====================

    fn ensure_ready(&self) -> Result<(), PlayerError> {
        if self.session.audio_ready && self.instrument.is_some() {
            Ok(())
        } else {
            Err(PlayerError::NotReady)
        }
    }

    /// Stops the sequencer and the poll, and releases held notes.
    fn halt(&mut self) {
        self.sequencer.stop();
        self.session.is_playing = false;
        self.poller.cancel();
        self.silence();
    }

    fn silence(&self) {
        if let Some(instrument) = self.instrument.as_deref() {
            instrument.stop_all(self.audio_time());
        }
    }

    fn audio_time(&self) -> f64 {
        self.context.as_ref().map_or(0.0, |c| c.current_time())
    }

    fn clear_error(&mut self) {
        if !self.fatal {
            self.session.last_error = None;
        }
    }

    /// Stores a failure as `last_error`. A fatal error is never replaced
    /// by a later, lesser one.
    fn record<T>(&mut self, result: Result<T, PlayerError>) -> Result<T, PlayerError> {
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!("{}", e);
                self.fatal = true;
                self.session.last_error = Some(e.to_string());
            } else {
                tracing::warn!("{}", e);
                if !self.fatal {
                    self.session.last_error = Some(e.to_string());
                }
            }
        }
        result
    }
}

impl<C: AudioContext, S: Sequencer> Drop for Player<C, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::error::{ValidationError, MAX_FILE_SIZE};
    use crate::midi::test_support::{long_note_song, three_event_song};

    type TestPlayer = Player<FakeContext, FlakySequencer>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Harness {
        player: TestPlayer,
        instrument: RecordingInstrument,
        probe: Probe,
        fail_play: std::rc::Rc<std::cell::Cell<bool>>,
    }

    fn harness() -> Harness {
        let sequencer = FlakySequencer::default();
        let fail_play = sequencer.fail_play.clone();
        let player = TestPlayer::new(sequencer, ms(100));
        Harness {
            player,
            instrument: RecordingInstrument::default(),
            probe: Probe::default(),
            fail_play,
        }
    }

    fn ready() -> Harness {
        let mut h = harness();
        let loader = FakeLoader {
            instrument: h.instrument.clone(),
            fail: false,
        };
        let probe = h.probe.clone();
        h.player
            .initialize(|| Ok(FakeContext::new(&probe)), &loader, "acoustic_grand_piano")
            .unwrap();
        h
    }

    fn position(h: &Harness) -> f64 {
        h.player.sequencer().inner.position_ticks()
    }

    // ==================== Initialization ====================

    #[test]
    fn test_commands_before_initialization_are_rejected() {
        let mut h = harness();
        let now = Instant::now();

        assert_eq!(
            h.player.load_file("a.mid", three_event_song(), now),
            Err(PlayerError::NotReady)
        );
        assert_eq!(h.player.play(now), Err(PlayerError::NotReady));
        assert_eq!(h.player.set_tempo(90, now), Err(PlayerError::NotReady));
        assert!(h.player.session().last_error().unwrap().contains("loading"));
        assert!(!h.player.session().file_loaded());
        assert_eq!(h.player.session().tempo_bpm(), 120);
    }

    #[test]
    fn test_initialize_resumes_suspended_context() {
        let mut h = harness();
        h.probe.suspended.set(true);
        let loader = FakeLoader::default();
        let probe = h.probe.clone();

        h.player
            .initialize(|| Ok(FakeContext::new(&probe)), &loader, "acoustic_grand_piano")
            .unwrap();

        assert!(h.player.session().audio_ready());
        assert_eq!(h.probe.resumes.get(), 1);
        assert_eq!(h.player.session().last_error(), None);
    }

    #[test]
    fn test_audio_init_failure_is_fatal() {
        let mut h = harness();
        let loader = FakeLoader::default();

        let err = h
            .player
            .initialize(
                || Err(PlayerError::AudioInit("no output device".to_string())),
                &loader,
                "acoustic_grand_piano",
            )
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(h.player.is_fatal());
        assert!(!h.player.session().audio_ready());

        // Later commands do not replace the fatal message.
        let _ = h.player.load_file("a.mid", three_event_song(), Instant::now());
        assert!(h
            .player
            .session()
            .last_error()
            .unwrap()
            .contains("no output device"));
    }

    #[test]
    fn test_instrument_failure_closes_context() {
        let mut h = harness();
        let loader = FakeLoader {
            fail: true,
            ..Default::default()
        };
        let probe = h.probe.clone();

        let err = h
            .player
            .initialize(|| Ok(FakeContext::new(&probe)), &loader, "acoustic_grand_piano")
            .unwrap_err();
        assert!(matches!(err, PlayerError::InstrumentLoad(_)));
        assert!(h.player.is_fatal());
        assert!(!h.player.can_play());
        assert_eq!(h.probe.closes.get(), 1);
    }

    #[test]
    fn test_resume_failure_during_initialization_is_fatal() {
        let mut h = harness();
        h.probe.suspended.set(true);
        h.probe.resume_fails.set(true);
        let probe = h.probe.clone();

        let err = h
            .player
            .initialize(
                || Ok(FakeContext::new(&probe)),
                &FakeLoader::default(),
                "acoustic_grand_piano",
            )
            .unwrap_err();
        assert!(matches!(err, PlayerError::AudioInit(_)));
        assert_eq!(h.probe.closes.get(), 1);
    }

    #[test]
    fn test_retry_after_failed_initialization_clears_fatal() {
        let mut h = harness();
        let _ = h.player.initialize(
            || Err(PlayerError::AudioInit("device busy".to_string())),
            &FakeLoader::default(),
            "acoustic_grand_piano",
        );
        assert!(h.player.is_fatal());

        let loader = FakeLoader {
            instrument: h.instrument.clone(),
            fail: false,
        };
        let probe = h.probe.clone();
        h.player
            .initialize(|| Ok(FakeContext::new(&probe)), &loader, "acoustic_grand_piano")
            .unwrap();
        assert!(!h.player.is_fatal());
        assert!(h.player.session().audio_ready());
        assert_eq!(h.player.session().last_error(), None);

        let now = Instant::now();
        h.player.load_file("a.mid", long_note_song(), now).unwrap();
        assert!(h.player.can_play());
        h.player.play(now).unwrap();
        assert!(h.player.session().is_playing());
    }

    // ==================== File intake ====================

    #[test]
    fn test_load_three_event_file_and_play_to_end() {
        let mut h = ready();
        let t0 = Instant::now();

        h.player.load_file("song.mid", three_event_song(), t0).unwrap();
        let session = h.player.session();
        assert!(session.file_loaded());
        assert_eq!(session.file_name(), "song.mid");
        assert_eq!(session.format(), Some(1));
        assert_eq!(session.tempo_bpm(), 120);
        assert_eq!(session.progress_percent(), 0.0);

        h.instrument.clear();
        h.player.play(t0).unwrap();
        assert!(h.player.session().is_playing());
        assert!(h.player.is_polling());

        h.player.update(t0);
        assert_eq!(
            h.instrument.note_calls(),
            vec![Call::Play {
                note: "C4".to_string(),
                at: 0.0,
                gain: 100.0 / 127.0
            }]
        );

        h.player.update(t0 + ms(500));
        assert_eq!(
            h.instrument.note_calls(),
            vec![
                Call::Play {
                    note: "C4".to_string(),
                    at: 0.0,
                    gain: 100.0 / 127.0
                },
                Call::Stop {
                    note: "C4".to_string(),
                    at: 0.0
                },
                Call::Stop {
                    note: "E4".to_string(),
                    at: 0.0
                },
            ]
        );
        assert!(!h.player.session().is_playing());
        assert!(!h.player.is_polling());
        assert_eq!(h.player.session().progress_percent(), 100.0);
        assert_eq!(h.player.status_label(), "Stopped");
    }

    #[test]
    fn test_replay_after_end_starts_from_zero() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("song.mid", three_event_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.player.update(t0 + ms(600));
        assert_eq!(h.player.session().progress_percent(), 100.0);

        h.player.play(t0 + ms(700)).unwrap();
        assert_eq!(h.player.session().progress_percent(), 0.0);
        assert!(h.player.session().is_playing());
    }

    #[test]
    fn test_bad_extension_leaves_session_untouched() {
        let mut h = ready();
        let now = Instant::now();
        h.player.load_file("first.mid", three_event_song(), now).unwrap();
        h.player.set_tempo(150, now).unwrap();
        let before = h.player.session().clone();

        for name in ["song.mp3", "song.mid.bak", "README"] {
            let err = h.player.load_file(name, three_event_song(), now).unwrap_err();
            assert_eq!(err, PlayerError::Validation(ValidationError::Extension));
        }

        let after = h.player.session();
        assert_eq!(after.file_name(), before.file_name());
        assert_eq!(after.format(), before.format());
        assert_eq!(after.tempo_bpm(), 150);
        assert!(after.last_error().is_some());
    }

    #[test]
    fn test_uppercase_extension_accepted() {
        let mut h = ready();
        h.player
            .load_file("LOUD.MIDI", long_note_song(), Instant::now())
            .unwrap();
        assert_eq!(h.player.session().file_name(), "LOUD.MIDI");
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut h = ready();
        let now = Instant::now();

        let err = h
            .player
            .load_file("big.mid", vec![0u8; (MAX_FILE_SIZE + 1) as usize], now)
            .unwrap_err();
        assert!(matches!(
            err,
            PlayerError::Validation(ValidationError::TooLarge { .. })
        ));
        assert!(!h.player.session().file_loaded());

        h.player.load_file("ok.mid", long_note_song(), now).unwrap();
        let err = h
            .player
            .load_file("huge.mid", vec![0u8; 11 * 1024 * 1024], now)
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(h.player.session().last_error().unwrap().contains("too large"));
        assert!(h.player.session().file_loaded());
        assert_eq!(h.player.session().file_name(), "ok.mid");
    }

    #[test]
    fn test_malformed_reload_keeps_previous_file() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("good.mid", long_note_song(), t0).unwrap();

        let err = h
            .player
            .load_file("broken.mid", b"MThd garbage".to_vec(), t0)
            .unwrap_err();
        assert!(matches!(err, PlayerError::MalformedFile(_)));

        let session = h.player.session();
        assert!(session.file_loaded());
        assert_eq!(session.file_name(), "good.mid");
        assert_eq!(session.format(), Some(0));
        assert!(session.last_error().unwrap().contains("Failed to load MIDI file"));

        h.player.play(t0).unwrap();
        assert!(h.player.session().is_playing());
        assert_eq!(h.player.session().last_error(), None);
    }

    #[test]
    fn test_loading_b_after_a_leaves_only_b() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", three_event_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.player.update(t0 + ms(200));

        h.player.load_file("b.mid", long_note_song(), t0 + ms(250)).unwrap();
        assert!(!h.player.session().is_playing());
        assert_eq!(h.player.session().progress_percent(), 0.0);

        h.player.stop();
        let session = h.player.session();
        assert_eq!(session.file_name(), "b.mid");
        assert_eq!(session.format(), Some(0));
        assert_eq!(
            session.file_buffer().map(|b| b.to_vec()),
            Some(long_note_song())
        );
    }

    #[test]
    fn test_load_while_playing_silences_notes() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.player.update(t0);
        h.instrument.clear();

        h.player.load_file("b.mid", three_event_song(), t0 + ms(100)).unwrap();
        assert_eq!(h.instrument.calls(), vec![Call::StopAll]);
    }

    #[test]
    fn test_load_resets_tempo_to_default() {
        let mut h = ready();
        let now = Instant::now();
        h.player.load_file("a.mid", long_note_song(), now).unwrap();
        h.player.set_tempo(180, now).unwrap();

        h.player.load_file("b.mid", long_note_song(), now).unwrap();
        assert_eq!(h.player.session().tempo_bpm(), 120);
        assert_eq!(h.player.sequencer().inner.tempo(), 120);
    }

    #[test]
    fn test_open_path_reads_from_disk() {
        let mut h = ready();
        let dir = std::env::temp_dir().join(format!("midiplayer-player-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("disk.mid");
        std::fs::write(&path, long_note_song()).unwrap();

        h.player.open_path(&path, Instant::now()).unwrap();
        assert_eq!(h.player.session().file_name(), "disk.mid");

        let err = h
            .player
            .open_path(&dir.join("absent.mid"), Instant::now())
            .unwrap_err();
        assert_eq!(err, PlayerError::Validation(ValidationError::Read));
        assert_eq!(h.player.session().file_name(), "disk.mid");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // ==================== Transport ====================

    #[test]
    fn test_play_without_file() {
        let mut h = ready();
        assert_eq!(h.player.play(Instant::now()), Err(PlayerError::NoFile));
        assert!(!h.player.session().is_playing());
    }

    #[test]
    fn test_stop_resets_from_any_state() {
        let mut h = ready();
        let t0 = Instant::now();

        // Nothing loaded.
        h.player.stop();
        assert!(!h.player.session().is_playing());
        assert_eq!(h.player.session().progress_percent(), 0.0);

        // Playing.
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.player.update(t0 + ms(300));
        assert!(h.player.session().progress_percent() > 0.0);
        h.player.stop();
        assert!(!h.player.session().is_playing());
        assert!(!h.player.is_polling());
        assert_eq!(h.player.session().progress_percent(), 0.0);
        assert_eq!(position(&h), 0.0);

        // Paused.
        h.player.play(t0 + ms(400)).unwrap();
        h.player.update(t0 + ms(600));
        h.player.pause(t0 + ms(600)).unwrap();
        h.player.stop();
        assert!(!h.player.session().is_playing());
        assert_eq!(h.player.session().progress_percent(), 0.0);
        assert_eq!(h.player.status_label(), "Stopped");
    }

    #[test]
    fn test_pause_and_resume() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.player.update(t0);
        h.instrument.clear();

        h.player.toggle_playback(t0 + ms(250)).unwrap();
        assert!(!h.player.session().is_playing());
        assert!(!h.player.is_polling());
        assert_eq!(h.player.status_label(), "Paused");
        assert_eq!(h.instrument.calls(), vec![Call::StopAll]);

        h.player.update(t0 + ms(2000));
        assert!((position(&h) - 240.0).abs() < 1e-6);

        h.player.toggle_playback(t0 + ms(2000)).unwrap();
        assert!(h.player.session().is_playing());
        h.player.update(t0 + ms(2250));
        assert!((position(&h) - 480.0).abs() < 1e-6);
    }

    #[test]
    fn test_play_fails_when_context_cannot_resume() {
        let mut h = ready();
        let now = Instant::now();
        h.player.load_file("a.mid", long_note_song(), now).unwrap();

        h.probe.suspended.set(true);
        h.probe.resume_fails.set(true);
        let err = h.player.play(now).unwrap_err();
        assert!(matches!(err, PlayerError::Transport(_)));
        assert!(!h.player.session().is_playing());
        assert!(!h.player.is_polling());
        assert!(h.player.session().last_error().is_some());

        h.probe.resume_fails.set(false);
        h.player.play(now).unwrap();
        assert!(h.player.session().is_playing());
        assert_eq!(h.player.session().last_error(), None);
    }

    #[test]
    fn test_sequencer_refusing_to_play_is_transport_error() {
        let mut h = ready();
        let now = Instant::now();
        h.player.load_file("a.mid", long_note_song(), now).unwrap();
        h.fail_play.set(true);

        assert!(matches!(h.player.play(now), Err(PlayerError::Transport(_))));
        assert!(!h.player.session().is_playing());
    }

    // ==================== Tempo ====================

    #[test]
    fn test_tempo_change_while_playing_keeps_position() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.player.update(t0 + ms(250));
        assert!((position(&h) - 240.0).abs() < 1e-6);

        h.player.set_tempo(90, t0 + ms(250)).unwrap();
        assert!(h.player.session().is_playing());
        assert_eq!(h.player.session().tempo_bpm(), 90);
        assert!((position(&h) - 240.0).abs() < 1e-6);

        // 90 BPM at 480 ppq advances 720 ticks per second.
        h.player.update(t0 + ms(750));
        assert!((position(&h) - 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_same_tempo_twice_is_same_as_once() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();

        h.player.set_tempo(90, t0 + ms(100)).unwrap();
        h.player.set_tempo(90, t0 + ms(200)).unwrap();
        h.player.update(t0 + ms(300));

        // 96 ticks at 120 BPM, then 200ms at 720 ticks/s.
        assert!((position(&h) - 240.0).abs() < 1e-6);
        assert_eq!(h.player.sequencer().inner.tempo(), 90);
    }

    #[test]
    fn test_tempo_is_clamped() {
        let mut h = ready();
        let now = Instant::now();
        h.player.set_tempo(10, now).unwrap();
        assert_eq!(h.player.session().tempo_bpm(), 50);
        h.player.set_tempo(999, now).unwrap();
        assert_eq!(h.player.session().tempo_bpm(), 200);
    }

    #[test]
    fn test_failed_resume_after_tempo_change_reports_stopped() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();

        h.fail_play.set(true);
        let err = h.player.set_tempo(90, t0 + ms(100)).unwrap_err();
        assert!(matches!(err, PlayerError::Transport(_)));
        assert!(!h.player.session().is_playing());
        assert!(!h.player.is_polling());
        assert_eq!(h.player.session().tempo_bpm(), 90);
    }

    // ==================== Progress ====================

    #[test]
    fn test_progress_polls_on_interval() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();

        h.player.update(t0 + ms(50));
        assert_eq!(h.player.session().progress_percent(), 0.0);

        // 96 of 960 ticks played.
        h.player.update(t0 + ms(100));
        assert!((h.player.session().progress_percent() - 10.0).abs() < 1e-6);

        h.player.pause(t0 + ms(150)).unwrap();
        h.player.update(t0 + ms(400));
        assert!((h.player.session().progress_percent() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_progress_stays_within_bounds() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();

        for step in 1..=12 {
            h.player.update(t0 + ms(step * 100));
            let p = h.player.session().progress_percent();
            assert!((0.0..=100.0).contains(&p), "progress {p}");
        }
        assert!(!h.player.session().is_playing());
    }

    // ==================== Teardown ====================

    #[test]
    fn test_dispose_releases_everything_once() {
        let mut h = ready();
        let t0 = Instant::now();
        h.player.load_file("a.mid", long_note_song(), t0).unwrap();
        h.player.play(t0).unwrap();
        h.instrument.clear();

        h.player.dispose();
        assert!(h.player.is_disposed());
        assert!(!h.player.session().is_playing());
        assert!(!h.player.session().audio_ready());
        assert!(!h.player.is_polling());
        assert_eq!(h.probe.closes.get(), 1);
        assert_eq!(h.instrument.calls(), vec![Call::StopAll]);

        h.instrument.clear();
        h.player.update(t0 + ms(500));
        assert_eq!(h.player.play(t0 + ms(500)), Err(PlayerError::NotReady));
        assert!(h.instrument.calls().is_empty());

        h.player.dispose();
        assert_eq!(h.probe.closes.get(), 1);
    }

    #[test]
    fn test_drop_closes_context() {
        let h = ready();
        let probe = h.probe.clone();
        drop(h);
        assert_eq!(probe.closes.get(), 1);
    }

    #[test]
    fn test_dispose_without_initialization_is_noop() {
        let mut h = harness();
        h.player.dispose();
        assert_eq!(h.probe.closes.get(), 0);
        assert!(h.player.is_disposed());
    }
}
