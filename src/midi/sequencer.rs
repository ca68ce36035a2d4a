//! Tempo-clocked Standard MIDI File sequencer.
//!
//! Parses a file with midly, flattens every track into one time-ordered
//! event list, and replays it against a wall clock scaled by the current
//! tempo. Time is always passed in by the caller, which keeps playback
//! deterministic under test.

use super::event::{ChannelMessage, NoteEvent, NoteKind, SequencerEvent};
use super::{note_to_name, DEFAULT_TEMPO};
use crate::error::PlayerError;
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::VecDeque;
use std::time::Instant;

/// Transport state of a sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// No file has been loaded.
    Empty,
    /// A file is loaded and positioned at the start.
    Loaded,
    /// Delivering events.
    Playing,
    /// Suspended mid-file, position kept.
    Paused,
}

/// The transport and event-stream contract the player drives.
///
/// Implementations buffer everything they emit (including lifecycle
/// events) and hand it out, in order, from [`Sequencer::poll_events`].
pub trait Sequencer {
    /// Parses `bytes` and replaces the loaded file. On failure the previous
    /// file, state and position are left untouched.
    fn load(&mut self, bytes: &[u8]) -> Result<(), PlayerError>;
    /// Starts or resumes playback.
    fn play(&mut self, now: Instant) -> Result<(), PlayerError>;
    /// Suspends playback at the current position.
    fn pause(&mut self, now: Instant);
    /// Stops playback and rewinds to the start.
    fn stop(&mut self);
    /// Rescales the playback clock without moving the position.
    fn set_tempo(&mut self, bpm: u32, now: Instant) -> Result<(), PlayerError>;
    fn state(&self) -> SequencerState;
    fn is_playing(&self) -> bool {
        self.state() == SequencerState::Playing
    }
    /// 100 at the start of the file, 0 at the end.
    fn percent_remaining(&self) -> f64;
    /// SMF format of the loaded file.
    fn format(&self) -> Option<u8>;
    /// Advances the clock to `now` and drains every pending event in order.
    fn poll_events(&mut self, now: Instant) -> Vec<SequencerEvent>;
}

/// A parsed file, flattened for playback.
#[derive(Debug, Clone)]
struct LoadedFile {
    format: u8,
    ticks_per_beat: u16,
    /// Sorted by tick; ties keep track order, then file order.
    events: Vec<SequencerEvent>,
    event_ticks: Vec<u64>,
    total_ticks: u64,
}

/// Sequencer over a midly-parsed file.
#[derive(Debug)]
pub struct MidiSequencer {
    file: Option<LoadedFile>,
    state: SequencerState,
    tempo: u32,
    /// Position banked at the last clock anchor.
    position_ticks: f64,
    /// Wall-clock time at which `position_ticks` was banked while playing.
    anchor: Option<Instant>,
    next_event: usize,
    pending: VecDeque<SequencerEvent>,
}

impl Default for MidiSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiSequencer {
    /// Creates an empty sequencer at the default tempo.
    pub fn new() -> Self {
        Self {
            file: None,
            state: SequencerState::Empty,
            tempo: DEFAULT_TEMPO,
            position_ticks: 0.0,
            anchor: None,
            next_event: 0,
            pending: VecDeque::new(),
        }
    }

    /// Current tempo in beats per minute.
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Position in ticks as of the last clock update.
    pub fn position_ticks(&self) -> f64 {
        self.position_ticks
    }

    /// Length of the loaded file in ticks.
    pub fn total_ticks(&self) -> u64 {
        self.file.as_ref().map_or(0, |f| f.total_ticks)
    }

    /// Ticks advanced per second of wall time at the current tempo.
    fn ticks_per_second(&self) -> f64 {
        let tpb = self.file.as_ref().map_or(0, |f| f.ticks_per_beat);
        tpb as f64 * self.tempo as f64 / 60.0
    }

    /// Moves `position_ticks` forward to `now` and re-anchors the clock.
    fn bank_position(&mut self, now: Instant) {
        if let Some(anchor) = self.anchor {
            let elapsed = now.saturating_duration_since(anchor).as_secs_f64();
            self.position_ticks += elapsed * self.ticks_per_second();
            self.anchor = Some(now);
        }
    }

    fn rewind(&mut self) {
        self.position_ticks = 0.0;
        self.next_event = 0;
        self.anchor = None;
    }
}

impl Sequencer for MidiSequencer {
    fn load(&mut self, bytes: &[u8]) -> Result<(), PlayerError> {
        let file = parse_file(bytes)?;
        let format = file.format;

        tracing::debug!(
            format,
            events = file.events.len(),
            total_ticks = file.total_ticks,
            "Parsed MIDI file"
        );

        self.file = Some(file);
        self.state = SequencerState::Loaded;
        self.tempo = DEFAULT_TEMPO;
        self.rewind();
        // Anything still queued belongs to the previous file.
        self.pending.clear();
        self.pending.push_back(SequencerEvent::FileLoaded { format });
        Ok(())
    }

    fn play(&mut self, now: Instant) -> Result<(), PlayerError> {
        match self.state {
            SequencerState::Empty => Err(PlayerError::NoFile),
            SequencerState::Playing => Ok(()),
            SequencerState::Loaded | SequencerState::Paused => {
                self.anchor = Some(now);
                self.state = SequencerState::Playing;
                Ok(())
            }
        }
    }

    fn pause(&mut self, now: Instant) {
        if self.state == SequencerState::Playing {
            self.bank_position(now);
            self.anchor = None;
            self.state = SequencerState::Paused;
        }
    }

    fn stop(&mut self) {
        self.rewind();
        self.state = if self.file.is_some() {
            SequencerState::Loaded
        } else {
            SequencerState::Empty
        };
    }

    fn set_tempo(&mut self, bpm: u32, now: Instant) -> Result<(), PlayerError> {
        if bpm == 0 {
            return Err(PlayerError::Transport("tempo must be positive".to_string()));
        }
        // Bank elapsed time at the old rate so the position does not jump.
        self.bank_position(now);
        self.tempo = bpm;
        Ok(())
    }

    fn state(&self) -> SequencerState {
        self.state
    }

    fn percent_remaining(&self) -> f64 {
        let total = self.total_ticks();
        if total == 0 {
            return 0.0;
        }
        let remaining = (total as f64 - self.position_ticks).max(0.0);
        remaining / total as f64 * 100.0
    }

    fn format(&self) -> Option<u8> {
        self.file.as_ref().map(|f| f.format)
    }

    fn poll_events(&mut self, now: Instant) -> Vec<SequencerEvent> {
        if self.state == SequencerState::Playing {
            self.bank_position(now);

            if let Some(file) = &self.file {
                while self.next_event < file.events.len()
                    && file.event_ticks[self.next_event] as f64 <= self.position_ticks
                {
                    self.pending.push_back(file.events[self.next_event].clone());
                    self.next_event += 1;
                }

                let finished = self.next_event >= file.events.len()
                    && self.position_ticks >= file.total_ticks as f64;
                // End of file rewinds for the next play-through.
                if finished {
                    self.pending.push_back(SequencerEvent::EndOfFile);
                    self.position_ticks = 0.0;
                    self.next_event = 0;
                    self.anchor = None;
                    self.state = SequencerState::Loaded;
                }
            }
        }

        self.pending.drain(..).collect()
    }
}

/// Parses SMF bytes into a flattened, time-ordered event list.
fn parse_file(bytes: &[u8]) -> Result<LoadedFile, PlayerError> {
    let smf = Smf::parse(bytes).map_err(|e| PlayerError::MalformedFile(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
        Timing::Metrical(_) => {
            return Err(PlayerError::MalformedFile(
                "zero ticks per beat".to_string(),
            ))
        }
        Timing::Timecode(_, _) => {
            return Err(PlayerError::MalformedFile(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };

    let format = match smf.header.format {
        Format::SingleTrack => 0,
        Format::Parallel => 1,
        Format::Sequential => 2,
    };

    let mut timed: Vec<(u64, SequencerEvent)> = Vec::new();
    let mut total_ticks: u64 = 0;
    // Format 2 tracks are independent patterns played one after another.
    let mut track_offset: u64 = 0;

    for track in &smf.tracks {
        let mut tick = if format == 2 { track_offset } else { 0 };

        for event in track {
            tick += event.delta.as_int() as u64;
            if let Some(converted) = convert_event(&event.kind, tick) {
                timed.push((tick, converted));
            }
        }

        total_ticks = total_ticks.max(tick);
        track_offset = tick;
    }

    // Stable sort keeps track order for simultaneous events.
    timed.sort_by_key(|(tick, _)| *tick);
    let (event_ticks, events) = timed.into_iter().unzip();

    Ok(LoadedFile {
        format,
        ticks_per_beat,
        events,
        event_ticks,
        total_ticks,
    })
}

/// Converts a midly event into a stream record. SysEx, escapes and
/// non-tempo meta events are dropped.
fn convert_event(kind: &TrackEventKind, tick: u64) -> Option<SequencerEvent> {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            let note = |kind: NoteKind, key: u8, velocity: u8| {
                SequencerEvent::Note(NoteEvent {
                    kind,
                    channel,
                    note_number: key,
                    note_name: note_to_name(key),
                    velocity,
                    tick,
                })
            };
            let message = match message {
                MidiMessage::NoteOn { key, vel } => {
                    return Some(note(NoteKind::On, key.as_int(), vel.as_int()))
                }
                MidiMessage::NoteOff { key, vel } => {
                    return Some(note(NoteKind::Off, key.as_int(), vel.as_int()))
                }
                MidiMessage::Controller { controller, value } => ChannelMessage::Controller {
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::ProgramChange { program } => ChannelMessage::ProgramChange {
                    program: program.as_int(),
                },
                MidiMessage::PitchBend { .. } => ChannelMessage::PitchBend,
                MidiMessage::Aftertouch { .. } | MidiMessage::ChannelAftertouch { .. } => {
                    ChannelMessage::Aftertouch
                }
            };
            Some(SequencerEvent::Channel {
                tick,
                channel,
                message,
            })
        }
        TrackEventKind::Meta(MetaMessage::Tempo(usec_per_beat)) => {
            let usec = usec_per_beat.as_int();
            (usec > 0).then(|| SequencerEvent::SetTempo {
                tick,
                bpm: 60_000_000.0 / usec as f64,
            })
        }
        _ => None,
    }
}
