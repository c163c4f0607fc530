//! Error types for sound banks and the engine runtime.

use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating a [`SoundBank`](crate::SoundBank).
#[derive(Debug, Error)]
pub enum BankError {
    /// Failed to read the bank file
    #[error("failed to read bank '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse bank TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize bank TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The bank defines no melodic patches
    #[error("bank '{0}' defines no patches")]
    NoPatches(String),

    /// Program or kit number outside 0..=127
    #[error("{what} number {number} is out of range 0..=127")]
    OutOfRange {
        /// "program", "kit" or "drum note".
        what: &'static str,
        /// Offending value.
        number: u16,
    },

    /// Duplicate program or kit number
    #[error("duplicate {what} number {number}")]
    Duplicate {
        /// "program" or "kit".
        what: &'static str,
        /// Offending value.
        number: u8,
    },

    /// A numeric field has an unusable value
    #[error("invalid {field} {value} in '{name}'")]
    InvalidValue {
        /// Patch or kit piece name.
        name: String,
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f32,
    },
}

impl BankError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BankError::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(name: &str, field: &'static str, value: f32) -> Self {
        BankError::InvalidValue {
            name: name.to_owned(),
            field,
            value,
        }
    }
}

/// Errors acquiring the process-wide engine [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RuntimeError {
    /// The runtime is alive at a different sample rate
    #[error("engine runtime is running at {active} Hz, cannot acquire at {requested} Hz")]
    SampleRateConflict {
        /// Rate of the live runtime.
        active: f32,
        /// Rate asked for.
        requested: f32,
    },

    /// Sample rate is not a positive finite number
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f32),
}
