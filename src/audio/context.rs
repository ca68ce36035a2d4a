//! Audio context backed by a rodio output stream.
//!
//! The context owns the output device for the lifetime of a session.
//! Sources are mixed through a single [`Sink`], which starts paused so
//! nothing is pulled from the synthesizer before the player resumes it.

use super::{AudioContext, ContextState};
use crate::error::PlayerError;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::time::Instant;

/// The rodio output device and its mixing sink.
pub struct RodioContext {
    /// Audio output stream (must be kept alive).
    _stream: Option<OutputStream>,
    /// Audio output handle for playback.
    _stream_handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    created: Instant,
}

impl RodioContext {
    /// Opens the default output device.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::AudioInit`] if no output device is available
    /// or the sink cannot be created.
    pub fn initialize() -> Result<Self, PlayerError> {
        Self::open().map_err(|e| PlayerError::AudioInit(format!("{e:#}")))
    }

    fn open() -> Result<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;
        let sink = Sink::try_new(&stream_handle).context("Failed to create audio sink")?;
        sink.pause();

        tracing::info!("Opened audio output");

        Ok(Self {
            _stream: Some(stream),
            _stream_handle: Some(stream_handle),
            sink: Some(sink),
            created: Instant::now(),
        })
    }

    /// Routes a continuous source into the output.
    ///
    /// # Errors
    ///
    /// Fails with [`PlayerError::InstrumentLoad`] once the context is closed.
    pub fn connect<S>(&mut self, source: S) -> Result<(), PlayerError>
    where
        S: Source<Item = f32> + Send + 'static,
    {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| PlayerError::InstrumentLoad("audio context is closed".to_string()))?;
        sink.append(source);
        Ok(())
    }
}

impl AudioContext for RodioContext {
    fn state(&self) -> ContextState {
        match &self.sink {
            None => ContextState::Closed,
            Some(sink) if sink.is_paused() => ContextState::Suspended,
            Some(_) => ContextState::Running,
        }
    }

    fn resume(&mut self) -> Result<(), PlayerError> {
        match &self.sink {
            Some(sink) => {
                sink.play();
                Ok(())
            }
            None => Err(PlayerError::Transport(
                "audio context is closed".to_string(),
            )),
        }
    }

    fn current_time(&self) -> f64 {
        self.created.elapsed().as_secs_f64()
    }

    fn close(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            tracing::info!("Closed audio output");
        }
        self._stream_handle = None;
        self._stream = None;
    }
}

impl Drop for RodioContext {
    fn drop(&mut self) {
        self.close();
    }
}
