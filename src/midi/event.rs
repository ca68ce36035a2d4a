//! Event records emitted by the sequencer.
//!
//! The sequencer produces a single ordered stream of [`SequencerEvent`]s.
//! Lifecycle events (`FileLoaded`, `EndOfFile`) travel on the same stream
//! as note events so the consumer sees them in the order they happened.

/// Whether a note record activates or releases a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// "Note on". A velocity of 0 still arrives as `On`.
    On,
    /// "Note off".
    Off,
}

impl NoteKind {
    /// Display name used in note traces.
    pub fn name(self) -> &'static str {
        match self {
            NoteKind::On => "Note on",
            NoteKind::Off => "Note off",
        }
    }
}

/// A single note activation or release, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEvent {
    pub kind: NoteKind,
    /// MIDI channel (0-15).
    pub channel: u8,
    /// MIDI note number (0-127).
    pub note_number: u8,
    /// Scientific pitch name, e.g. "C4".
    pub note_name: String,
    /// Velocity (0-127), passed through untouched.
    pub velocity: u8,
    /// Absolute position in file ticks.
    pub tick: u64,
}

/// Non-note channel messages. Delivered for completeness, never routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    Controller { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    PitchBend,
    Aftertouch,
}

/// One entry of the sequencer's ordered output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// A file was parsed and is ready to play.
    FileLoaded { format: u8 },
    /// A note activation or release.
    Note(NoteEvent),
    /// A Set Tempo meta event from the file.
    SetTempo { tick: u64, bpm: f64 },
    /// Any other channel message.
    Channel {
        tick: u64,
        channel: u8,
        message: ChannelMessage,
    },
    /// The last event of the play-through was delivered.
    EndOfFile,
}
