//! File intake guards.
//!
//! These checks run before any bytes reach the sequencer. They look at the
//! file name and size only; format validation is the sequencer's job.

use crate::error::{ValidationError, MAX_FILE_SIZE};
use std::fs;
use std::path::Path;

/// Accepts names ending in `.mid` or `.midi`, case-insensitively.
pub fn has_midi_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".mid") || lower.ends_with(".midi")
}

/// Checks a file name and byte length against the intake rules.
pub fn validate(name: &str, size: u64) -> Result<(), ValidationError> {
    if !has_midi_extension(name) {
        return Err(ValidationError::Extension);
    }
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge { size });
    }
    Ok(())
}

/// Reads a MIDI file from disk after validating its name and size.
///
/// The size is checked from metadata before the file is read, so an
/// oversized file is never loaded into memory.
///
/// # Returns
///
/// The file's display name and its bytes.
pub fn read_file(path: &Path) -> Result<(String, Vec<u8>), ValidationError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    if !has_midi_extension(&name) {
        return Err(ValidationError::Extension);
    }

    let size = fs::metadata(path)
        .map_err(|e| {
            tracing::warn!("Failed to stat {:?}: {}", path, e);
            ValidationError::Read
        })?
        .len();
    validate(&name, size)?;

    let bytes = fs::read(path).map_err(|e| {
        tracing::warn!("Failed to read {:?}: {}", path, e);
        ValidationError::Read
    })?;

    Ok((name, bytes))
}
