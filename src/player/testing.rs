//! In-memory audio fakes for exercising the player without a device.

use crate::audio::{AudioContext, ContextState, Instrument, InstrumentLoader, PlayOptions};
use crate::error::PlayerError;
use crate::midi::{MidiSequencer, Sequencer, SequencerEvent, SequencerState};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// One recorded instrument call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Play { note: String, at: f64, gain: f32 },
    Stop { note: String, at: f64 },
    StopAll,
}

/// Instrument that records every call. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingInstrument {
    log: Rc<RefCell<Vec<Call>>>,
}

impl RecordingInstrument {
    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    /// Play/stop calls only.
    pub fn note_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::StopAll)
            .collect()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Instrument for RecordingInstrument {
    fn play(&self, note: &str, at: f64, options: PlayOptions) {
        self.log.borrow_mut().push(Call::Play {
            note: note.to_string(),
            at,
            gain: options.gain,
        });
    }

    fn stop(&self, note: &str, at: f64) {
        self.log.borrow_mut().push(Call::Stop {
            note: note.to_string(),
            at,
        });
    }

    fn stop_all(&self, _at: f64) {
        self.log.borrow_mut().push(Call::StopAll);
    }
}

/// Knobs and counters shared between a test and its [`FakeContext`].
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub suspended: Rc<Cell<bool>>,
    pub resume_fails: Rc<Cell<bool>>,
    pub resumes: Rc<Cell<u32>>,
    pub closes: Rc<Cell<u32>>,
}

#[derive(Debug)]
pub struct FakeContext {
    probe: Probe,
    closed: bool,
}

impl FakeContext {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            closed: false,
        }
    }
}

impl AudioContext for FakeContext {
    fn state(&self) -> ContextState {
        if self.closed {
            ContextState::Closed
        } else if self.probe.suspended.get() {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        if self.closed || self.probe.resume_fails.get() {
            return Err(PlayerError::Transport("resume rejected".to_string()));
        }
        self.probe.suspended.set(false);
        self.probe.resumes.set(self.probe.resumes.get() + 1);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.probe.closes.set(self.probe.closes.get() + 1);
        }
    }
}

/// Hands out a shared [`RecordingInstrument`], or fails on demand.
#[derive(Debug, Clone, Default)]
pub struct FakeLoader {
    pub instrument: RecordingInstrument,
    pub fail: bool,
}

impl InstrumentLoader<FakeContext> for FakeLoader {
    fn load(
        &self,
        _context: &mut FakeContext,
        _name: &str,
    ) -> Result<Box<dyn Instrument>, PlayerError> {
        if self.fail {
            return Err(PlayerError::InstrumentLoad("sample fetch failed".to_string()));
        }
        Ok(Box::new(self.instrument.clone()))
    }
}

/// A real sequencer whose `play` can be made to fail.
#[derive(Debug, Default)]
pub struct FlakySequencer {
    pub inner: MidiSequencer,
    pub fail_play: Rc<Cell<bool>>,
}

impl Sequencer for FlakySequencer {
    fn load(&mut self, bytes: &[u8]) -> Result<(), PlayerError> {
        self.inner.load(bytes)
    }

    fn play(&mut self, now: Instant) -> Result<(), PlayerError> {
        if self.fail_play.get() {
            return Err(PlayerError::Transport(
                "sequencer refused to start".to_string(),
            ));
        }
        self.inner.play(now)
    }

    fn pause(&mut self, now: Instant) {
        self.inner.pause(now)
    }

    fn stop(&mut self) {
        self.inner.stop()
    }

    fn set_tempo(&mut self, bpm: u32, now: Instant) -> Result<(), PlayerError> {
        self.inner.set_tempo(bpm, now)
    }

    fn state(&self) -> SequencerState {
        self.inner.state()
    }

    fn percent_remaining(&self) -> f64 {
        self.inner.percent_remaining()
    }

    fn format(&self) -> Option<u8> {
        self.inner.format()
    }

    fn poll_events(&mut self, now: Instant) -> Vec<SequencerEvent> {
        self.inner.poll_events(now)
    }
}
