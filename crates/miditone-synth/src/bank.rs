//! Sound bank file format and lookup.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::envelope::EnvelopeShape;
use crate::error::BankError;
use crate::oscillator::Waveform;

/// A bank of melodic patches and drum kits.
///
/// Banks are TOML files handed to [`FontSynth::prepare`](crate::FontSynth).
///
/// # TOML Format
///
/// ```toml
/// name = "General"
///
/// [[patches]]
/// program = 0
/// name = "Piano"
/// waveform = "triangle"
/// attack_ms = 2.0
/// decay_ms = 400.0
/// sustain = 0.4
/// release_ms = 300.0
/// gain = 0.8
///
/// [[kits]]
/// kit = 0
/// name = "Standard"
/// [[kits.pieces]]
/// notes = [35, 36]
/// waveform = "sine"
/// pitch_hz = 55.0
/// decay_ms = 180.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoundBank {
    /// Bank name.
    pub name: String,

    /// Melodic patches, keyed by program number.
    #[serde(default)]
    pub patches: Vec<Patch>,

    /// Drum kits, keyed by kit number.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kits: Vec<Kit>,
}

/// A melodic instrument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    /// Program number `0..=127`.
    pub program: u16,
    /// Display name.
    pub name: String,
    /// Oscillator waveform.
    #[serde(default)]
    pub waveform: Waveform,
    /// Attack time in ms.
    #[serde(default = "default_attack_ms")]
    pub attack_ms: f32,
    /// Decay time constant in ms.
    #[serde(default = "default_decay_ms")]
    pub decay_ms: f32,
    /// Sustain level `0..=1`.
    #[serde(default = "default_sustain")]
    pub sustain: f32,
    /// Release time constant in ms.
    #[serde(default = "default_release_ms")]
    pub release_ms: f32,
    /// Output gain.
    #[serde(default = "default_gain")]
    pub gain: f32,
    /// Fine tuning in cents.
    #[serde(default)]
    pub detune_cents: f32,
}

/// A drum kit: pieces mapped onto notes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kit {
    /// Kit number `0..=127`.
    pub kit: u16,
    /// Display name.
    pub name: String,
    /// Pieces; the first piece listing a note plays it.
    #[serde(default)]
    pub pieces: Vec<DrumPiece>,
}

/// One percussive sound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrumPiece {
    /// Notes that trigger this piece.
    pub notes: Vec<u16>,
    /// Oscillator waveform.
    #[serde(default = "default_drum_waveform")]
    pub waveform: Waveform,
    /// Fixed pitch in Hz (ignored by noise).
    #[serde(default = "default_pitch_hz")]
    pub pitch_hz: f32,
    /// Decay time constant in ms.
    #[serde(default = "default_decay_ms")]
    pub decay_ms: f32,
    /// Output gain.
    #[serde(default = "default_gain")]
    pub gain: f32,
}

fn default_attack_ms() -> f32 {
    5.0
}

fn default_decay_ms() -> f32 {
    200.0
}

fn default_sustain() -> f32 {
    0.7
}

fn default_release_ms() -> f32 {
    150.0
}

fn default_gain() -> f32 {
    1.0
}

fn default_pitch_hz() -> f32 {
    200.0
}

fn default_drum_waveform() -> Waveform {
    Waveform::Noise
}

impl Patch {
    /// Envelope settings for a voice of this patch.
    pub fn envelope(&self) -> EnvelopeShape {
        EnvelopeShape {
            attack_ms: self.attack_ms,
            decay_ms: self.decay_ms,
            sustain: self.sustain,
            release_ms: self.release_ms,
        }
    }

    fn validate(&self) -> Result<(), BankError> {
        check_number("program", self.program)?;
        for (field, value) in [
            ("attack_ms", self.attack_ms),
            ("decay_ms", self.decay_ms),
            ("release_ms", self.release_ms),
            ("gain", self.gain),
        ] {
            check_non_negative(&self.name, field, value)?;
        }
        if !(0.0..=1.0).contains(&self.sustain) {
            return Err(BankError::invalid(&self.name, "sustain", self.sustain));
        }
        if !self.detune_cents.is_finite() {
            return Err(BankError::invalid(&self.name, "detune_cents", self.detune_cents));
        }
        Ok(())
    }
}

impl Kit {
    /// Piece mapped to `note`, if any.
    pub fn piece(&self, note: u8) -> Option<&DrumPiece> {
        self.pieces
            .iter()
            .find(|piece| piece.notes.contains(&u16::from(note)))
    }

    fn validate(&self) -> Result<(), BankError> {
        check_number("kit", self.kit)?;
        for piece in &self.pieces {
            for &note in &piece.notes {
                check_number("drum note", note)?;
            }
            for (field, value) in [
                ("pitch_hz", piece.pitch_hz),
                ("decay_ms", piece.decay_ms),
                ("gain", piece.gain),
            ] {
                check_non_negative(&self.name, field, value)?;
            }
        }
        Ok(())
    }
}

impl DrumPiece {
    /// Envelope settings for a voice of this piece.
    pub fn envelope(&self) -> EnvelopeShape {
        EnvelopeShape::percussive(self.decay_ms)
    }
}

fn check_number(what: &'static str, number: u16) -> Result<(), BankError> {
    if number > 127 {
        return Err(BankError::OutOfRange { what, number });
    }
    Ok(())
}

fn check_non_negative(name: &str, field: &'static str, value: f32) -> Result<(), BankError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BankError::invalid(name, field, value));
    }
    Ok(())
}

fn check_unique(
    what: &'static str,
    numbers: impl Iterator<Item = u16>,
) -> Result<(), BankError> {
    let mut seen = [false; 128];
    for number in numbers {
        let slot = &mut seen[usize::from(number.min(127))];
        if *slot {
            return Err(BankError::Duplicate {
                what,
                number: number as u8,
            });
        }
        *slot = true;
    }
    Ok(())
}

impl SoundBank {
    /// Load and validate a bank from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| BankError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a bank from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, BankError> {
        let bank: SoundBank = toml::from_str(toml_str)?;
        bank.validate()?;
        Ok(bank)
    }

    /// Convert the bank to a TOML string.
    pub fn to_toml(&self) -> Result<String, BankError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check numbering and value ranges.
    pub fn validate(&self) -> Result<(), BankError> {
        if self.patches.is_empty() {
            return Err(BankError::NoPatches(self.name.clone()));
        }
        for patch in &self.patches {
            patch.validate()?;
        }
        for kit in &self.kits {
            kit.validate()?;
        }
        check_unique("program", self.patches.iter().map(|p| p.program))?;
        check_unique("kit", self.kits.iter().map(|k| k.kit))?;
        Ok(())
    }

    /// Patch for `program`: exact match, else the nearest lower program,
    /// else the lowest-numbered patch.
    pub fn patch(&self, program: u8) -> Option<&Patch> {
        let program = u16::from(program);
        self.patches
            .iter()
            .filter(|p| p.program <= program)
            .max_by_key(|p| p.program)
            .or_else(|| self.patches.iter().min_by_key(|p| p.program))
    }

    /// Kit `number`, else the first kit.
    pub fn kit(&self, number: u8) -> Option<&Kit> {
        self.kits
            .iter()
            .find(|k| k.kit == u16::from(number))
            .or_else(|| self.kits.first())
    }

    /// The bank compiled into the crate, selected with the asset path
    /// [`BUILTIN_ASSET`](crate::BUILTIN_ASSET).
    pub fn builtin() -> Self {
        let patch = |program, name: &str, waveform, attack_ms, decay_ms, sustain, release_ms, gain| {
            Patch {
                program,
                name: name.to_owned(),
                waveform,
                attack_ms,
                decay_ms,
                sustain,
                release_ms,
                gain,
                detune_cents: 0.0,
            }
        };
        let piece = |notes: &[u16], waveform, pitch_hz, decay_ms, gain| DrumPiece {
            notes: notes.to_vec(),
            waveform,
            pitch_hz,
            decay_ms,
            gain,
        };

        Self {
            name: "Builtin".to_owned(),
            patches: vec![
                patch(0, "Piano", Waveform::Triangle, 2.0, 400.0, 0.3, 300.0, 0.8),
                patch(16, "Organ", Waveform::Square, 8.0, 50.0, 1.0, 80.0, 0.35),
                patch(24, "Guitar", Waveform::Saw, 2.0, 250.0, 0.2, 200.0, 0.5),
                patch(32, "Bass", Waveform::Saw, 3.0, 150.0, 0.6, 100.0, 0.6),
                patch(48, "Strings", Waveform::Saw, 120.0, 500.0, 0.8, 400.0, 0.4),
                patch(56, "Brass", Waveform::Square, 40.0, 200.0, 0.7, 150.0, 0.4),
                patch(72, "Flute", Waveform::Sine, 60.0, 100.0, 0.9, 120.0, 0.8),
                patch(80, "Lead", Waveform::Square, 5.0, 100.0, 0.8, 100.0, 0.4),
                patch(88, "Pad", Waveform::Triangle, 400.0, 800.0, 0.8, 800.0, 0.6),
            ],
            kits: vec![
                Kit {
                    kit: 0,
                    name: "Standard".to_owned(),
                    pieces: vec![
                        piece(&[35, 36], Waveform::Sine, 55.0, 180.0, 1.0),
                        piece(&[38, 40], Waveform::Noise, 200.0, 120.0, 0.6),
                        piece(&[42, 44], Waveform::Noise, 200.0, 40.0, 0.3),
                        piece(&[46], Waveform::Noise, 200.0, 200.0, 0.3),
                        piece(&[41, 43], Waveform::Sine, 90.0, 220.0, 0.8),
                        piece(&[45, 47], Waveform::Sine, 130.0, 200.0, 0.8),
                        piece(&[48, 50], Waveform::Sine, 180.0, 180.0, 0.8),
                        piece(&[49, 51, 52, 55, 57, 59], Waveform::Noise, 200.0, 600.0, 0.25),
                    ],
                },
                Kit {
                    kit: 25,
                    name: "Electronic".to_owned(),
                    pieces: vec![
                        piece(&[35, 36], Waveform::Sine, 45.0, 300.0, 1.0),
                        piece(&[38, 40], Waveform::Square, 180.0, 90.0, 0.4),
                        piece(&[42, 44, 46], Waveform::Noise, 200.0, 30.0, 0.3),
                    ],
                },
            ],
        }
    }
}
