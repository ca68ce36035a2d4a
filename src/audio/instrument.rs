//! SoundFont instrument rendered with rustysynth.
//!
//! The loader reads a SoundFont, selects a preset by General MIDI name
//! (or by the preset's own name), and connects a synthesizer-driven
//! source to the audio context. Notes are addressed by name ("C4") and
//! triggered on a single MIDI channel.

use super::context::RodioContext;
use super::{Instrument, InstrumentLoader, PlayOptions, SAMPLE_RATE};
use crate::error::PlayerError;
use crate::midi::name_to_note;
use anyhow::{Context, Result};
use rodio::Source;
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// Channel every note is played on.
const CHANNEL: i32 = 0;

/// General MIDI program names, indexed by program number.
pub const GM_INSTRUMENTS: [&str; 128] = [
    "acoustic_grand_piano", "bright_acoustic_piano", "electric_grand_piano", "honkytonk_piano",
    "electric_piano_1", "electric_piano_2", "harpsichord", "clavinet",
    "celesta", "glockenspiel", "music_box", "vibraphone",
    "marimba", "xylophone", "tubular_bells", "dulcimer",
    "drawbar_organ", "percussive_organ", "rock_organ", "church_organ",
    "reed_organ", "accordion", "harmonica", "tango_accordion",
    "acoustic_guitar_nylon", "acoustic_guitar_steel", "electric_guitar_jazz", "electric_guitar_clean",
    "electric_guitar_muted", "overdriven_guitar", "distortion_guitar", "guitar_harmonics",
    "acoustic_bass", "electric_bass_finger", "electric_bass_pick", "fretless_bass",
    "slap_bass_1", "slap_bass_2", "synth_bass_1", "synth_bass_2",
    "violin", "viola", "cello", "contrabass",
    "tremolo_strings", "pizzicato_strings", "orchestral_harp", "timpani",
    "string_ensemble_1", "string_ensemble_2", "synth_strings_1", "synth_strings_2",
    "choir_aahs", "voice_oohs", "synth_choir", "orchestra_hit",
    "trumpet", "trombone", "tuba", "muted_trumpet",
    "french_horn", "brass_section", "synth_brass_1", "synth_brass_2",
    "soprano_sax", "alto_sax", "tenor_sax", "baritone_sax",
    "oboe", "english_horn", "bassoon", "clarinet",
    "piccolo", "flute", "recorder", "pan_flute",
    "blown_bottle", "shakuhachi", "whistle", "ocarina",
    "lead_1_square", "lead_2_sawtooth", "lead_3_calliope", "lead_4_chiff",
    "lead_5_charang", "lead_6_voice", "lead_7_fifths", "lead_8_bass_lead",
    "pad_1_new_age", "pad_2_warm", "pad_3_polysynth", "pad_4_choir",
    "pad_5_bowed", "pad_6_metallic", "pad_7_halo", "pad_8_sweep",
    "fx_1_rain", "fx_2_soundtrack", "fx_3_crystal", "fx_4_atmosphere",
    "fx_5_brightness", "fx_6_goblins", "fx_7_echoes", "fx_8_scifi",
    "sitar", "banjo", "shamisen", "koto",
    "kalimba", "bagpipe", "fiddle", "shanai",
    "tinkle_bell", "agogo", "steel_drums", "woodblock",
    "taiko_drum", "melodic_tom", "synth_drum", "reverse_cymbal",
    "guitar_fret_noise", "breath_noise", "seashore", "bird_tweet",
    "telephone_ring", "helicopter", "applause", "gunshot",
];

/// Normalizes a preset name for lookup: lowercase, words joined by `_`.
fn normalize_name(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Looks up the General MIDI program number for a preset name.
///
/// # Examples
///
/// ```
/// use midiplayer::audio::gm_program;
///
/// assert_eq!(gm_program("acoustic_grand_piano"), Some(0));
/// assert_eq!(gm_program("Acoustic Grand Piano"), Some(0));
/// assert_eq!(gm_program("theremin"), None);
/// ```
pub fn gm_program(name: &str) -> Option<u8> {
    let wanted = normalize_name(name);
    GM_INSTRUMENTS
        .iter()
        .position(|&gm| gm == wanted)
        .map(|p| p as u8)
}

/// Finds a bank-0 preset in the SoundFont whose own name matches `name`.
fn soundfont_program(soundfont: &SoundFont, name: &str) -> Option<u8> {
    let wanted = normalize_name(name);
    soundfont
        .get_presets()
        .iter()
        .filter(|preset| preset.get_bank_number() == 0)
        .find(|preset| normalize_name(preset.get_name()) == wanted)
        .and_then(|preset| u8::try_from(preset.get_patch_number()).ok())
        .filter(|program| *program < 128)
}

/// Audio source that generates samples from the synthesizer.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    synth: Arc<Mutex<Synthesizer>>,
    left_buf: Vec<f32>,
    right_buf: Vec<f32>,
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(synth: Arc<Mutex<Synthesizer>>) -> Self {
        Self {
            synth,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.buf_pos >= BUFFER_SIZE {
            if let Ok(mut synth) = self.synth.lock() {
                synth.render(&mut self.left_buf, &mut self.right_buf);
            } else {
                self.left_buf.fill(0.0);
                self.right_buf.fill(0.0);
            }
            self.buf_pos = 0;
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Converts a linear gain to a MIDI velocity.
fn gain_to_velocity(gain: f32) -> i32 {
    (gain.clamp(0.0, 1.0) * 127.0).round() as i32
}

/// One SoundFont preset, playable by note name.
pub struct SoundfontInstrument {
    synth: Arc<Mutex<Synthesizer>>,
}

impl SoundfontInstrument {
    fn with_synth(&self, f: impl FnOnce(&mut Synthesizer)) {
        if let Ok(mut synth) = self.synth.lock() {
            f(&mut synth);
        }
    }
}

impl Instrument for SoundfontInstrument {
    // The synthesizer renders in real time, so `at` is always "now".
    fn play(&self, note: &str, _at: f64, options: PlayOptions) {
        let Some(key) = name_to_note(note) else {
            tracing::warn!(note, "Ignoring unknown note name");
            return;
        };
        let velocity = gain_to_velocity(options.gain);
        if velocity == 0 {
            return;
        }
        self.with_synth(|synth| synth.note_on(CHANNEL, key as i32, velocity));
    }

    fn stop(&self, note: &str, _at: f64) {
        if let Some(key) = name_to_note(note) {
            self.with_synth(|synth| synth.note_off(CHANNEL, key as i32));
        }
    }

    fn stop_all(&self, _at: f64) {
        self.with_synth(|synth| synth.note_off_all(false));
    }
}

/// Loads presets from one SoundFont file.
#[derive(Debug, Clone)]
pub struct SoundfontLoader {
    soundfont_path: Option<PathBuf>,
}

impl SoundfontLoader {
    /// Creates a loader. A missing path makes every load fail.
    pub fn new(soundfont_path: Option<PathBuf>) -> Self {
        Self { soundfont_path }
    }

    fn read_soundfont(path: &Path) -> Result<Arc<SoundFont>> {
        let mut file = BufReader::new(
            File::open(path)
                .with_context(|| format!("Failed to open SoundFont: {}", path.display()))?,
        );
        let soundfont = SoundFont::new(&mut file)
            .map_err(|e| anyhow::anyhow!("Failed to load SoundFont: {:?}", e))?;
        Ok(Arc::new(soundfont))
    }

    fn build(&self, name: &str) -> Result<(SoundfontInstrument, SynthSource)> {
        let path = self
            .soundfont_path
            .as_deref()
            .context("No SoundFont configured (use --soundfont <path>)")?;
        let soundfont = Self::read_soundfont(path)?;

        let program = gm_program(name)
            .or_else(|| soundfont_program(&soundfont, name))
            .with_context(|| format!("Unknown instrument preset: {name}"))?;

        let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let mut synth = Synthesizer::new(&soundfont, &settings)
            .map_err(|e| anyhow::anyhow!("Failed to create synthesizer: {:?}", e))?;
        // Program change is MIDI command 0xC0 (192)
        synth.process_midi_message(CHANNEL, 0xC0, program as i32, 0);

        let synth = Arc::new(Mutex::new(synth));
        let source = SynthSource::new(Arc::clone(&synth));
        let instrument = SoundfontInstrument { synth };

        tracing::info!(
            soundfont = %path.display(),
            preset = name,
            program,
            "Loaded instrument"
        );

        Ok((instrument, source))
    }
}

impl InstrumentLoader<RodioContext> for SoundfontLoader {
    fn load(
        &self,
        context: &mut RodioContext,
        name: &str,
    ) -> Result<Box<dyn Instrument>, PlayerError> {
        let (instrument, source) = self
            .build(name)
            .map_err(|e| PlayerError::InstrumentLoad(format!("{e:#}")))?;
        context.connect(source)?;
        Ok(Box::new(instrument))
    }
}
