//! MIDI file sequencing.
//!
//! This module provides the sequencer that replays a Standard MIDI File
//! against a tempo clock, the event records it emits, and helpers for
//! converting between MIDI note numbers and note names.

mod event;
mod sequencer;

pub use event::{ChannelMessage, NoteEvent, NoteKind, SequencerEvent};
pub use sequencer::{MidiSequencer, Sequencer, SequencerState};

/// Standard MIDI note names for display purposes.
/// Maps MIDI note number (0-127) to note name within an octave.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Tempo every file starts at, in beats per minute.
pub const DEFAULT_TEMPO: u32 = 120;

/// Slowest tempo the player accepts.
pub const MIN_TEMPO: u32 = 50;

/// Fastest tempo the player accepts.
pub const MAX_TEMPO: u32 = 200;

/// Increment used by the tempo control.
pub const TEMPO_STEP: u32 = 5;

/// Clamps a tempo to the playable range [`MIN_TEMPO`, `MAX_TEMPO`].
pub fn clamp_tempo(bpm: u32) -> u32 {
    bpm.clamp(MIN_TEMPO, MAX_TEMPO)
}

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Arguments
///
/// * `note` - MIDI note number (0-127)
///
/// # Returns
///
/// String representation like "C4" or "F#5"
///
/// # Examples
///
/// ```
/// use midiplayer::midi::note_to_name;
///
/// let name = note_to_name(60); // Middle C
/// assert_eq!(name, "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts a note name to MIDI note number.
///
/// Accepts sharps (`C#4`) and the flat spellings `Db`, `Eb`, `Gb`, `Ab`, `Bb`.
///
/// # Returns
///
/// MIDI note number (0-127) or None if invalid
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    // Find where the octave number starts
    let octave_start = name
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() || *c == '-')
        .map(|(i, _)| i)?;

    let note_part = &name[..octave_start];
    let octave_part = &name[octave_start..];

    let note_index = match note_part {
        "Db" => 1,
        "Eb" => 3,
        "Gb" => 6,
        "Ab" => 8,
        "Bb" => 10,
        _ => NOTE_NAMES.iter().position(|&n| n == note_part)?,
    };
    let octave: i16 = octave_part.parse().ok()?;

    // MIDI note = (octave + 1) * 12 + note_index
    let midi_note = (octave + 1) * 12 + note_index as i16;
    u8::try_from(midi_note).ok().filter(|n| *n <= 127)
}
