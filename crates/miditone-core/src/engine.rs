//! Synthesis engine contract.
//!
//! The kernel treats the synthesizer as a black box: it forwards
//! channel-tagged MIDI commands and pulls interleaved float PCM on demand.
//! [`SynthEngine`] is that seam. It is owned and driven exclusively by the
//! render context; `prepare` is the only call expected outside it.

use crate::error::EngineError;
use crate::event::ChannelMessage;

/// Capability interface of an external synthesis engine.
///
/// Every command returns `Result<(), EngineError>`; the kernel counts and
/// logs failures but never aborts a render because of one.
///
/// # Example
///
/// ```rust
/// use miditone_core::{ChannelMessage, EngineError, SynthEngine};
///
/// /// Engine that renders a constant DC level while any note is held.
/// struct Drone {
///     held: usize,
/// }
///
/// impl SynthEngine for Drone {
///     type PrepareError = EngineError;
///
///     fn prepare(&mut self, _asset_path: &str) -> Result<(), EngineError> {
///         Ok(())
///     }
///
///     fn play_note_event(
///         &mut self,
///         _channel: u8,
///         kind: ChannelMessage,
///         _note: u8,
///         velocity: u8,
///     ) -> Result<(), EngineError> {
///         match kind {
///             ChannelMessage::NoteOn if velocity > 0 => self.held += 1,
///             ChannelMessage::NoteOn | ChannelMessage::NoteOff => {
///                 self.held = self.held.saturating_sub(1)
///             }
///             _ => {}
///         }
///         Ok(())
///     }
///
///     fn send_channel_event(
///         &mut self,
///         _channel: u8,
///         _kind: ChannelMessage,
///         _p1: u8,
///         _p2: Option<u8>,
///     ) -> Result<(), EngineError> {
///         Ok(())
///     }
///
///     fn select_drum_kit(&mut self, _channel: u8) -> Result<(), EngineError> {
///         Ok(())
///     }
///
///     fn select_instrument(&mut self, _code: i32) -> Result<(), EngineError> {
///         Ok(())
///     }
///
///     fn set_transposition(&mut self, _semitones: i32) -> Result<(), EngineError> {
///         Ok(())
///     }
///
///     fn decode(&mut self, interleaved: &mut [f32], channels: usize) -> Result<usize, EngineError> {
///         let level = if self.held > 0 { 0.25 } else { 0.0 };
///         interleaved.fill(level);
///         Ok(interleaved.len() / channels.max(1))
///     }
/// }
/// ```
pub trait SynthEngine {
    /// Error reported when loading a sound bank fails.
    type PrepareError: core::fmt::Debug + core::fmt::Display;

    /// Load the opaque sound bank at `asset_path`.
    ///
    /// Called outside the render path; may block and allocate.
    fn prepare(&mut self, asset_path: &str) -> Result<(), Self::PrepareError>;

    /// Note-on, note-off or polyphonic pressure for `note` on `channel`.
    ///
    /// `param` is the velocity or pressure byte.
    fn play_note_event(
        &mut self,
        channel: u8,
        kind: ChannelMessage,
        note: u8,
        param: u8,
    ) -> Result<(), EngineError>;

    /// Control change, pitch bend, program change or channel pressure.
    ///
    /// `p2` is `None` for single-data-byte kinds.
    fn send_channel_event(
        &mut self,
        channel: u8,
        kind: ChannelMessage,
        p1: u8,
        p2: Option<u8>,
    ) -> Result<(), EngineError>;

    /// Force the drum-kit program on `channel`. Must be idempotent.
    fn select_drum_kit(&mut self, channel: u8) -> Result<(), EngineError>;

    /// Select instrument `code` out-of-band of the MIDI stream.
    fn select_instrument(&mut self, code: i32) -> Result<(), EngineError>;

    /// Standing transposition applied to subsequent note events.
    fn set_transposition(&mut self, semitones: i32) -> Result<(), EngineError>;

    /// Render `interleaved.len() / channels` frames of interleaved PCM.
    ///
    /// Returns the number of frames written; `Err` means no data is
    /// available and the caller substitutes silence.
    fn decode(&mut self, interleaved: &mut [f32], channels: usize) -> Result<usize, EngineError>;

    /// Silence all voices and return to the initial controller state.
    fn reset(&mut self) {}
}

/// Engine that accepts every command and renders silence.
///
/// Useful as a stand-in when only scheduling or buffer assembly matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEngine;

impl SynthEngine for NullEngine {
    type PrepareError = EngineError;

    fn prepare(&mut self, _asset_path: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn play_note_event(
        &mut self,
        _channel: u8,
        _kind: ChannelMessage,
        _note: u8,
        _param: u8,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn send_channel_event(
        &mut self,
        _channel: u8,
        _kind: ChannelMessage,
        _p1: u8,
        _p2: Option<u8>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn select_drum_kit(&mut self, _channel: u8) -> Result<(), EngineError> {
        Ok(())
    }

    fn select_instrument(&mut self, _code: i32) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_transposition(&mut self, _semitones: i32) -> Result<(), EngineError> {
        Ok(())
    }

    fn decode(&mut self, interleaved: &mut [f32], channels: usize) -> Result<usize, EngineError> {
        interleaved.fill(0.0);
        Ok(interleaved.len() / channels.max(1))
    }
}
