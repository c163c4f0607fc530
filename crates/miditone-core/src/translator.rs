//! MIDI-to-engine translation.
//!
//! Converts one raw status/data triple into zero or more [`SynthEngine`]
//! commands, applying the drum-channel kit select and the program-change
//! suppression policy of an active instrument override.

use crate::engine::SynthEngine;
use crate::error::EngineError;
use crate::event::{ChannelMessage, DRUM_CHANNEL, MidiMessage};

/// What the translator did with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// Forwarded to the engine.
    Forwarded,
    /// Malformed (note number >= 128), dropped silently.
    Dropped,
    /// Program change suppressed by an instrument override.
    Suppressed,
    /// Not a channel-voice message.
    Ignored,
}

/// Stateless-per-message translator carrying the program-change policy.
///
/// Engine command failures never propagate; they are tallied and can be
/// drained with [`take_engine_failures`](Self::take_engine_failures).
#[derive(Debug, Default, Clone)]
pub struct MidiTranslator {
    suppress_program_change: bool,
    engine_failures: u32,
}

impl MidiTranslator {
    /// Create a translator; `suppress_program_change` mirrors an active override.
    pub const fn new(suppress_program_change: bool) -> Self {
        Self {
            suppress_program_change,
            engine_failures: 0,
        }
    }

    /// Update the program-change policy (override set or cleared mid-quantum).
    pub fn set_suppress_program_change(&mut self, suppress: bool) {
        self.suppress_program_change = suppress;
    }

    /// Current program-change policy.
    pub fn suppresses_program_change(&self) -> bool {
        self.suppress_program_change
    }

    /// Engine failures seen since the last call.
    pub fn take_engine_failures(&mut self) -> u32 {
        core::mem::take(&mut self.engine_failures)
    }

    /// Translate a parsed message, taking the channel from its status byte.
    pub fn translate_message<E: SynthEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        message: &MidiMessage,
    ) -> Translation {
        self.translate(
            engine,
            message.status(),
            message.data1(),
            message.data2(),
            message.channel(),
        )
    }

    /// Translate one raw message into engine commands.
    ///
    /// On [`DRUM_CHANNEL`] a drum-kit select is issued before dispatch for
    /// every channel-voice message, including ones that are then dropped.
    pub fn translate<E: SynthEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        status: u8,
        data1: u8,
        data2: u8,
        channel: u8,
    ) -> Translation {
        let Some(kind) = ChannelMessage::from_status(status) else {
            return Translation::Ignored;
        };

        if channel == DRUM_CHANNEL {
            let result = engine.select_drum_kit(channel);
            self.record(result, "select_drum_kit", channel);
        }

        match kind {
            ChannelMessage::NoteOff | ChannelMessage::NoteOn | ChannelMessage::PolyPressure => {
                if data1 >= 128 {
                    return Translation::Dropped;
                }
                let result = engine.play_note_event(channel, kind, data1, data2);
                self.record(result, "play_note_event", channel);
            }
            ChannelMessage::ControlChange | ChannelMessage::PitchBend => {
                let result = engine.send_channel_event(channel, kind, data1, Some(data2));
                self.record(result, "send_channel_event", channel);
            }
            ChannelMessage::ProgramChange => {
                if self.suppress_program_change {
                    return Translation::Suppressed;
                }
                let result = engine.send_channel_event(channel, kind, data1, None);
                self.record(result, "program_change", channel);
            }
            ChannelMessage::ChannelPressure => {
                let result = engine.send_channel_event(channel, kind, data1, None);
                self.record(result, "channel_pressure", channel);
            }
        }
        Translation::Forwarded
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn record(&mut self, result: Result<(), EngineError>, command: &'static str, channel: u8) {
        if let Err(err) = result {
            self.engine_failures += 1;
            #[cfg(feature = "tracing")]
            tracing::warn!(command, channel, %err, "engine command failed");
        }
    }
}
