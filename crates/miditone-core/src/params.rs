//! Parameter state shared between the control and render contexts.
//!
//! All four parameters plus two pending-command bits live in one
//! `AtomicU64`, so the render path reads a consistent [`ParamSnapshot`]
//! with a single atomic operation per quantum and never blocks.
//!
//! ## Word Layout
//!
//! ```text
//! bits  0..16  override instrument (i16, -1 = none)
//! bits 16..32  transposition in semitones (i16)
//! bit  32      muted
//! bit  33      bypassed
//! bit  34      instrument select pending
//! bit  35      transposition pending
//! ```
//!
//! Both integer fields hold `i16`: setters saturate values outside
//! `i16::MIN..=i16::MAX`, and the getters report the saturated value.
//!
//! Control-path setters mark the matching engine command pending; the
//! kernel consumes the bits at the start of the next quantum and issues the
//! command to the engine it owns.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::event::{NO_OVERRIDE, ParamAddress};

const INSTRUMENT_SHIFT: u32 = 0;
const TRANSPOSITION_SHIFT: u32 = 16;
const FIELD_MASK: u64 = 0xFFFF;
const MUTED: u64 = 1 << 32;
const BYPASSED: u64 = 1 << 33;
const PENDING_INSTRUMENT: u64 = 1 << 34;
const PENDING_TRANSPOSITION: u64 = 1 << 35;
const PENDING_MASK: u64 = PENDING_INSTRUMENT | PENDING_TRANSPOSITION;

#[inline]
fn clamp_i16(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

#[inline]
fn read_field(word: u64, shift: u32) -> i32 {
    i32::from(((word >> shift) & FIELD_MASK) as u16 as i16)
}

#[inline]
fn write_field(word: u64, shift: u32, value: i32) -> u64 {
    let bits = u64::from(clamp_i16(value) as u16);
    (word & !(FIELD_MASK << shift)) | (bits << shift)
}

#[inline]
fn write_flag(word: u64, flag: u64, on: bool) -> u64 {
    if on { word | flag } else { word & !flag }
}

/// Integral parameter value from a host float.
#[inline]
fn integral(value: f32) -> i32 {
    if value.is_finite() {
        libm::roundf(value) as i32
    } else {
        0
    }
}

/// Consistent view of the parameters for one quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSnapshot {
    /// Override instrument, [`NO_OVERRIDE`] when unset.
    pub override_instrument: i32,
    /// Standing transposition in semitones.
    pub transposition: i32,
    /// Mute flag.
    pub is_muted: bool,
    /// Bypass flag.
    pub is_bypassed: bool,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        Self {
            override_instrument: NO_OVERRIDE,
            transposition: 0,
            is_muted: false,
            is_bypassed: false,
        }
    }
}

impl ParamSnapshot {
    fn from_word(word: u64) -> Self {
        Self {
            override_instrument: read_field(word, INSTRUMENT_SHIFT),
            transposition: read_field(word, TRANSPOSITION_SHIFT),
            is_muted: word & MUTED != 0,
            is_bypassed: word & BYPASSED != 0,
        }
    }

    /// True when the output should carry the input instead of synthesis.
    pub fn passes_through(&self) -> bool {
        self.is_bypassed || self.is_muted
    }

    /// True when host program changes must not reach the engine.
    pub fn suppresses_program_change(&self) -> bool {
        self.override_instrument != NO_OVERRIDE
    }

    /// Plain value of one parameter.
    pub fn get(&self, address: ParamAddress) -> f32 {
        match address {
            ParamAddress::Instrument => self.override_instrument as f32,
            ParamAddress::Transposition => self.transposition as f32,
            ParamAddress::Mute => f32::from(u8::from(self.is_muted)),
            ParamAddress::Bypass => f32::from(u8::from(self.is_bypassed)),
        }
    }
}

/// Engine commands armed by the control path since the last quantum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommands {
    /// Issue `select_instrument(override_instrument)`.
    pub instrument: bool,
    /// Issue `set_transposition(transposition)`.
    pub transposition: bool,
}

impl PendingCommands {
    fn from_word(word: u64) -> Self {
        Self {
            instrument: word & PENDING_INSTRUMENT != 0,
            transposition: word & PENDING_TRANSPOSITION != 0,
        }
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        !self.instrument && !self.transposition
    }
}

/// Parameter storage written by the control context, read by the render context.
///
/// Writers are lock-free (CAS loop); readers are wait-free.
///
/// # Example
///
/// ```rust
/// use miditone_core::{NO_OVERRIDE, ParameterState};
///
/// let params = ParameterState::new();
/// assert_eq!(params.override_instrument(), NO_OVERRIDE);
///
/// params.set_override_instrument(12);
/// params.set_muted(true);
///
/// let snap = params.snapshot();
/// assert!(snap.suppresses_program_change());
/// assert!(snap.passes_through());
/// ```
#[derive(Debug)]
pub struct ParameterState {
    word: AtomicU64,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterState {
    /// Defaults: no override, no transposition, not muted, not bypassed.
    pub const fn new() -> Self {
        let instrument = (NO_OVERRIDE as i16 as u16) as u64;
        Self {
            word: AtomicU64::new(instrument << INSTRUMENT_SHIFT),
        }
    }

    fn update(&self, f: impl Fn(u64) -> u64) {
        // The closure never returns None, so fetch_update cannot fail.
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| Some(f(word)));
    }

    /// Pin the instrument (`value != -1`) or release the pin (`-1`).
    ///
    /// A pin arms a one-shot instrument select for the next quantum and
    /// suppresses host program changes from then on. Values outside the
    /// `i16` range are stored saturated, so the engine receives (and
    /// rejects) `i16::MIN` or `i16::MAX`.
    pub fn set_override_instrument(&self, value: i32) {
        self.update(|word| {
            let word = write_field(word, INSTRUMENT_SHIFT, value);
            write_flag(word, PENDING_INSTRUMENT, value != NO_OVERRIDE)
        });
    }

    /// Current override instrument.
    pub fn override_instrument(&self) -> i32 {
        read_field(self.word.load(Ordering::Acquire), INSTRUMENT_SHIFT)
    }

    /// Set the standing transposition, forwarded to the engine next quantum.
    ///
    /// Saturates to the `i16` range; the engine applies its own tighter limit.
    pub fn set_transposition(&self, semitones: i32) {
        self.update(|word| write_field(word, TRANSPOSITION_SHIFT, semitones) | PENDING_TRANSPOSITION);
    }

    /// Current transposition in semitones.
    pub fn transposition(&self) -> i32 {
        read_field(self.word.load(Ordering::Acquire), TRANSPOSITION_SHIFT)
    }

    /// Set the mute flag.
    pub fn set_muted(&self, muted: bool) {
        self.update(|word| write_flag(word, MUTED, muted));
    }

    /// Mute flag.
    pub fn is_muted(&self) -> bool {
        self.word.load(Ordering::Acquire) & MUTED != 0
    }

    /// Set the bypass flag.
    pub fn set_bypassed(&self, bypassed: bool) {
        self.update(|word| write_flag(word, BYPASSED, bypassed));
    }

    /// Bypass flag.
    pub fn is_bypassed(&self) -> bool {
        self.word.load(Ordering::Acquire) & BYPASSED != 0
    }

    /// Set a parameter by address from a host float value.
    ///
    /// Integral parameters round to nearest; flags are on at `>= 0.5`.
    pub fn set_parameter(&self, address: ParamAddress, value: f32) {
        match address {
            ParamAddress::Instrument => self.set_override_instrument(integral(value)),
            ParamAddress::Transposition => self.set_transposition(integral(value)),
            ParamAddress::Mute => self.set_muted(value >= 0.5),
            ParamAddress::Bypass => self.set_bypassed(value >= 0.5),
        }
    }

    /// Read a parameter by address as a host float value.
    pub fn parameter(&self, address: ParamAddress) -> f32 {
        self.snapshot().get(address)
    }

    /// Read all parameters without consuming pending commands.
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot::from_word(self.word.load(Ordering::Acquire))
    }

    /// Read all parameters and consume pending commands in one atomic step.
    ///
    /// Called by the render context once per quantum.
    pub fn take_snapshot(&self) -> (ParamSnapshot, PendingCommands) {
        let word = self.word.fetch_and(!PENDING_MASK, Ordering::AcqRel);
        (ParamSnapshot::from_word(word), PendingCommands::from_word(word))
    }

    /// Store a value delivered inside the render event stream.
    ///
    /// The kernel has already applied the change to the engine at the event
    /// offset, so no pending command is armed.
    pub(crate) fn store_from_render(&self, address: ParamAddress, value: f32) {
        match address {
            ParamAddress::Instrument => {
                self.update(|word| write_field(word, INSTRUMENT_SHIFT, integral(value)));
            }
            ParamAddress::Transposition => {
                self.update(|word| write_field(word, TRANSPOSITION_SHIFT, integral(value)));
            }
            ParamAddress::Mute => self.set_muted(value >= 0.5),
            ParamAddress::Bypass => self.set_bypassed(value >= 0.5),
        }
    }

    /// Arm both engine commands so the current values are re-sent.
    ///
    /// Used after the engine loads a new sound bank.
    pub fn rearm(&self) {
        self.update(|word| {
            let word = word | PENDING_TRANSPOSITION;
            let instrument = read_field(word, INSTRUMENT_SHIFT);
            write_flag(word, PENDING_INSTRUMENT, instrument != NO_OVERRIDE)
        });
    }
}

/// Round a host parameter value the way [`ParameterState`] stores it.
pub(crate) fn integral_value(value: f32) -> i32 {
    i32::from(clamp_i16(integral(value)))
}
