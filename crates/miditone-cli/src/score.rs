//! Score file format.
//!
//! A score is a flat list of timed events plus the control-path settings
//! applied before rendering starts.
//!
//! ```toml
//! sample_rate = 48000
//! block_size = 512
//! channels = 2
//! tail_seconds = 1.0
//!
//! [control]
//! instrument = 24
//! transposition = -2
//!
//! [[events]]
//! type = "note_on"
//! time = 0.0
//! channel = 0
//! note = 60
//! velocity = 100
//!
//! [[events]]
//! type = "parameter"
//! time = 0.5
//! name = "transposition"
//! value = 5
//! ```

use std::path::{Path, PathBuf};

use miditone_core::{DEFAULT_MAXIMUM_FRAMES, EventKind, MidiMessage, ParamAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating a [`Score`].
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Failed to read the score file
    #[error("failed to read score '{path}': {source}")]
    ReadFile {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse score TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Sample rate is zero
    #[error("invalid sample rate {0}")]
    SampleRate(u32),

    /// Block size outside the kernel's limits
    #[error("block size {block_size} must be between 1 and {maximum}")]
    BlockSize {
        /// Requested block size.
        block_size: u32,
        /// Kernel maximum.
        maximum: u32,
    },

    /// Channel count is zero
    #[error("invalid output channel count {0}")]
    Channels(u16),

    /// Tail length is negative or not finite
    #[error("invalid tail length {0} s")]
    Tail(f64),

    /// Event time is negative or not finite
    #[error("event {index}: invalid time {time}")]
    Time {
        /// Event index in the score.
        index: usize,
        /// Offending time in seconds.
        time: f64,
    },

    /// MIDI channel above 15
    #[error("event {index}: MIDI channel {channel} is out of range 0..=15")]
    MidiChannel {
        /// Event index in the score.
        index: usize,
        /// Offending channel.
        channel: u8,
    },

    /// A data byte above 127
    #[error("event {index}: {field} {value} is out of range 0..=127")]
    DataByte {
        /// Event index in the score.
        index: usize,
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u16,
    },

    /// Raw message must have 1 to 3 bytes
    #[error("event {index}: raw message has {len} bytes, expected 1 to 3")]
    RawLength {
        /// Event index in the score.
        index: usize,
        /// Number of bytes given.
        len: usize,
    },

    /// Unknown parameter name
    #[error("event {index}: unknown parameter '{name}'")]
    Parameter {
        /// Event index in the score.
        index: usize,
        /// Name given.
        name: String,
    },
}

/// A renderable score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Score {
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Frames per render quantum.
    #[serde(default = "default_block_size")]
    pub block_size: u32,

    /// Output channel count.
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Silence rendered after the last event, in seconds.
    #[serde(default = "default_tail_seconds")]
    pub tail_seconds: f64,

    /// Sound bank path; the built-in bank when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,

    /// Settings applied through the control path before rendering.
    #[serde(default)]
    pub control: Control,

    /// Timed events, in any order.
    #[serde(default)]
    pub events: Vec<ScoreEvent>,
}

/// Control-path settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Control {
    /// Override instrument code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<i32>,
    /// Standing transposition in semitones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transposition: Option<i32>,
    /// Mute flag.
    #[serde(default)]
    pub muted: bool,
    /// Bypass flag.
    #[serde(default)]
    pub bypassed: bool,
}

/// One timed score event. `time` is in seconds from the start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreEvent {
    /// Note-on.
    NoteOn {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Key.
        note: u16,
        /// Velocity.
        #[serde(default = "default_velocity")]
        velocity: u16,
    },
    /// Note-off.
    NoteOff {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Key.
        note: u16,
        /// Release velocity.
        #[serde(default)]
        velocity: u16,
    },
    /// Control change.
    ControlChange {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Controller number.
        controller: u16,
        /// Value.
        value: u16,
    },
    /// Program change.
    ProgramChange {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Program number.
        program: u16,
    },
    /// 14-bit pitch bend, 8192 = center.
    PitchBend {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Bend value.
        value: u16,
    },
    /// Channel pressure.
    ChannelPressure {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Pressure.
        pressure: u16,
    },
    /// Polyphonic key pressure.
    PolyPressure {
        /// Seconds.
        time: f64,
        /// MIDI channel.
        channel: u8,
        /// Key.
        note: u16,
        /// Pressure.
        pressure: u16,
    },
    /// Raw bytes sent unchanged, for system or malformed messages.
    Raw {
        /// Seconds.
        time: f64,
        /// One to three bytes.
        bytes: Vec<u8>,
    },
    /// In-stream host parameter change.
    Parameter {
        /// Seconds.
        time: f64,
        /// `instrument`, `transposition`, `mute` or `bypass`.
        name: String,
        /// Value in plain units.
        value: f32,
    },
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> u32 {
    512
}

fn default_channels() -> u16 {
    2
}

fn default_tail_seconds() -> f64 {
    0.5
}

fn default_velocity() -> u16 {
    100
}

fn data_byte(index: usize, field: &'static str, value: u16) -> Result<u8, ScoreError> {
    u8::try_from(value)
        .ok()
        .filter(|&v| v <= 127)
        .ok_or(ScoreError::DataByte {
            index,
            field,
            value,
        })
}

fn midi_channel(index: usize, channel: u8) -> Result<u8, ScoreError> {
    if channel > 15 {
        return Err(ScoreError::MidiChannel { index, channel });
    }
    Ok(channel)
}

impl ScoreEvent {
    /// Event time in seconds.
    pub fn time(&self) -> f64 {
        match self {
            Self::NoteOn { time, .. }
            | Self::NoteOff { time, .. }
            | Self::ControlChange { time, .. }
            | Self::ProgramChange { time, .. }
            | Self::PitchBend { time, .. }
            | Self::ChannelPressure { time, .. }
            | Self::PolyPressure { time, .. }
            | Self::Raw { time, .. }
            | Self::Parameter { time, .. } => *time,
        }
    }

    /// Short type name, as written in the file.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NoteOn { .. } => "note_on",
            Self::NoteOff { .. } => "note_off",
            Self::ControlChange { .. } => "control_change",
            Self::ProgramChange { .. } => "program_change",
            Self::PitchBend { .. } => "pitch_bend",
            Self::ChannelPressure { .. } => "channel_pressure",
            Self::PolyPressure { .. } => "poly_pressure",
            Self::Raw { .. } => "raw",
            Self::Parameter { .. } => "parameter",
        }
    }

    /// Kernel event payload. `index` is used in error messages.
    pub fn to_kind(&self, index: usize) -> Result<EventKind, ScoreError> {
        let time = self.time();
        if !time.is_finite() || time < 0.0 {
            return Err(ScoreError::Time { index, time });
        }

        let message = match self {
            Self::NoteOn {
                channel,
                note,
                velocity,
                ..
            } => MidiMessage::note_on(
                midi_channel(index, *channel)?,
                data_byte(index, "note", *note)?,
                data_byte(index, "velocity", *velocity)?,
            ),
            Self::NoteOff {
                channel,
                note,
                velocity,
                ..
            } => MidiMessage::note_off(
                midi_channel(index, *channel)?,
                data_byte(index, "note", *note)?,
                data_byte(index, "velocity", *velocity)?,
            ),
            Self::ControlChange {
                channel,
                controller,
                value,
                ..
            } => MidiMessage::control_change(
                midi_channel(index, *channel)?,
                data_byte(index, "controller", *controller)?,
                data_byte(index, "value", *value)?,
            ),
            Self::ProgramChange {
                channel, program, ..
            } => MidiMessage::program_change(
                midi_channel(index, *channel)?,
                data_byte(index, "program", *program)?,
            ),
            Self::PitchBend { channel, value, .. } => {
                if *value > 0x3FFF {
                    return Err(ScoreError::DataByte {
                        index,
                        field: "pitch bend",
                        value: *value,
                    });
                }
                MidiMessage::pitch_bend(midi_channel(index, *channel)?, *value)
            }
            Self::ChannelPressure {
                channel, pressure, ..
            } => MidiMessage::channel_pressure(
                midi_channel(index, *channel)?,
                data_byte(index, "pressure", *pressure)?,
            ),
            Self::PolyPressure {
                channel,
                note,
                pressure,
                ..
            } => MidiMessage::poly_pressure(
                midi_channel(index, *channel)?,
                data_byte(index, "note", *note)?,
                data_byte(index, "pressure", *pressure)?,
            ),
            Self::Raw { bytes, .. } => match bytes.as_slice() {
                [status] => MidiMessage::new(*status, 0, 0),
                [status, d1] => MidiMessage::new(*status, *d1, 0),
                [status, d1, d2] => MidiMessage::new(*status, *d1, *d2),
                _ => {
                    return Err(ScoreError::RawLength {
                        index,
                        len: bytes.len(),
                    });
                }
            },
            Self::Parameter { name, value, .. } => {
                let address = ParamAddress::ALL
                    .into_iter()
                    .find(|a| a.name() == name)
                    .ok_or_else(|| ScoreError::Parameter {
                        index,
                        name: name.clone(),
                    })?;
                return Ok(EventKind::Parameter {
                    address: address.raw(),
                    value: *value,
                });
            }
        };
        Ok(EventKind::Midi(message))
    }
}

impl Score {
    /// Load and validate a score from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ScoreError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a score from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ScoreError> {
        let score: Score = toml::from_str(toml_str)?;
        score.validate()?;
        Ok(score)
    }

    /// Check render settings and every event.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if self.sample_rate == 0 {
            return Err(ScoreError::SampleRate(self.sample_rate));
        }
        if self.block_size == 0 || self.block_size > DEFAULT_MAXIMUM_FRAMES {
            return Err(ScoreError::BlockSize {
                block_size: self.block_size,
                maximum: DEFAULT_MAXIMUM_FRAMES,
            });
        }
        if self.channels == 0 {
            return Err(ScoreError::Channels(self.channels));
        }
        if !self.tail_seconds.is_finite() || self.tail_seconds < 0.0 {
            return Err(ScoreError::Tail(self.tail_seconds));
        }
        for (index, event) in self.events.iter().enumerate() {
            event.to_kind(index)?;
        }
        Ok(())
    }

    /// Convert seconds to a frame position.
    pub fn frame_at(&self, seconds: f64) -> u64 {
        (seconds * f64::from(self.sample_rate)).round() as u64
    }

    /// Events as `(frame, payload)`, sorted by frame. Events at the same
    /// frame keep file order.
    pub fn timeline(&self) -> Result<Vec<(u64, EventKind)>, ScoreError> {
        let mut timeline = self
            .events
            .iter()
            .enumerate()
            .map(|(index, event)| Ok((self.frame_at(event.time()), event.to_kind(index)?)))
            .collect::<Result<Vec<_>, ScoreError>>()?;
        timeline.sort_by_key(|(frame, _)| *frame);
        Ok(timeline)
    }

    /// Seconds from the start to the last event.
    pub fn last_event_time(&self) -> f64 {
        self.events
            .iter()
            .map(ScoreEvent::time)
            .fold(0.0, f64::max)
    }

    /// Total frames to render, tail included.
    pub fn total_frames(&self) -> u64 {
        self.frame_at(self.last_event_time() + self.tail_seconds)
    }
}
