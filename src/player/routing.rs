//! Note routing from sequencer events to the instrument.

use crate::audio::{Instrument, PlayOptions};
use crate::midi::{NoteEvent, NoteKind};

/// What a note event turns into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteAction {
    Play { gain: f32 },
    Stop,
}

/// Decides the instrument call for a note event.
///
/// A note-on with velocity 0 is a release, per MIDI running-status
/// convention; the sequencer delivers it as a note-on untouched.
pub fn note_action(event: &NoteEvent) -> NoteAction {
    match event.kind {
        NoteKind::On if event.velocity > 0 => NoteAction::Play {
            gain: event.velocity as f32 / 127.0,
        },
        NoteKind::On | NoteKind::Off => NoteAction::Stop,
    }
}

/// Sends exactly one play or stop call to the instrument.
pub fn route_note(instrument: &dyn Instrument, event: &NoteEvent, at: f64) {
    tracing::trace!(
        kind = event.kind.name(),
        note = %event.note_name,
        velocity = event.velocity,
        tick = event.tick,
        "Routing note"
    );
    match note_action(event) {
        NoteAction::Play { gain } => instrument.play(&event.note_name, at, PlayOptions { gain }),
        NoteAction::Stop => instrument.stop(&event.note_name, at),
    }
}
