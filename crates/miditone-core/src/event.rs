//! Render-event model: MIDI messages, parameter changes and the per-call
//! quantum descriptor.
//!
//! Events arrive from the host once per render call, time-stamped with a
//! sample offset relative to the start of the quantum. The kernel acts on
//! them during that call and never retains them afterwards.

/// MIDI channel (zero-indexed) permanently reserved for percussion.
pub const DRUM_CHANNEL: u8 = 9;

/// Default upper bound on frames per render quantum.
pub const DEFAULT_MAXIMUM_FRAMES: u32 = 1024;

/// Override instrument value meaning "no override".
pub const NO_OVERRIDE: i32 = -1;

/// Channel-voice message kinds, keyed by the status high nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChannelMessage {
    /// Stop playing a note.
    NoteOff = 0x80,
    /// Start playing a note.
    NoteOn = 0x90,
    /// Polyphonic key pressure (aftertouch).
    PolyPressure = 0xA0,
    /// Control change.
    ControlChange = 0xB0,
    /// Program change.
    ProgramChange = 0xC0,
    /// Channel pressure (aftertouch).
    ChannelPressure = 0xD0,
    /// Pitch bend change.
    PitchBend = 0xE0,
}

impl ChannelMessage {
    /// Decode the high nibble of a status byte.
    ///
    /// Returns `None` for data bytes and system messages (`0xF0..=0xFF`).
    pub const fn from_status(status: u8) -> Option<Self> {
        match status & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xA0 => Some(Self::PolyPressure),
            0xB0 => Some(Self::ControlChange),
            0xC0 => Some(Self::ProgramChange),
            0xD0 => Some(Self::ChannelPressure),
            0xE0 => Some(Self::PitchBend),
            _ => None,
        }
    }

    /// Status high nibble for this kind (channel bits cleared).
    pub const fn status_nibble(self) -> u8 {
        self as u8
    }

    /// Number of data bytes carried by this kind.
    pub const fn data_len(self) -> usize {
        match self {
            Self::ProgramChange | Self::ChannelPressure => 1,
            _ => 2,
        }
    }
}

/// A 3-byte MIDI payload (status + channel, data1, data2).
///
/// Single-data-byte messages leave `data2` at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    /// Raw bytes as delivered by the host.
    pub bytes: [u8; 3],
}

impl MidiMessage {
    /// Build a message from raw bytes.
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            bytes: [status, data1, data2],
        }
    }

    const fn channel_voice(kind: ChannelMessage, channel: u8, data1: u8, data2: u8) -> Self {
        Self::new(kind.status_nibble() | (channel & 0x0F), data1, data2)
    }

    /// Note-on for `note` at `velocity` on `channel`.
    pub const fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(ChannelMessage::NoteOn, channel, note, velocity)
    }

    /// Note-off for `note` on `channel`.
    pub const fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel_voice(ChannelMessage::NoteOff, channel, note, velocity)
    }

    /// Polyphonic pressure for `note` on `channel`.
    pub const fn poly_pressure(channel: u8, note: u8, pressure: u8) -> Self {
        Self::channel_voice(ChannelMessage::PolyPressure, channel, note, pressure)
    }

    /// Control change `controller` = `value` on `channel`.
    pub const fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::channel_voice(ChannelMessage::ControlChange, channel, controller, value)
    }

    /// Program change to `program` on `channel`.
    pub const fn program_change(channel: u8, program: u8) -> Self {
        Self::channel_voice(ChannelMessage::ProgramChange, channel, program, 0)
    }

    /// Channel pressure on `channel`.
    pub const fn channel_pressure(channel: u8, pressure: u8) -> Self {
        Self::channel_voice(ChannelMessage::ChannelPressure, channel, pressure, 0)
    }

    /// 14-bit pitch bend (`0..=16383`, center 8192) on `channel`.
    pub const fn pitch_bend(channel: u8, value: u16) -> Self {
        let value = if value > 0x3FFF { 0x3FFF } else { value };
        Self::channel_voice(
            ChannelMessage::PitchBend,
            channel,
            (value & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
        )
    }

    /// Status byte including channel bits.
    pub const fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// Channel number (`status & 0x0F`).
    pub const fn channel(&self) -> u8 {
        self.bytes[0] & 0x0F
    }

    /// First data byte.
    pub const fn data1(&self) -> u8 {
        self.bytes[1]
    }

    /// Second data byte.
    pub const fn data2(&self) -> u8 {
        self.bytes[2]
    }

    /// Channel-voice kind, or `None` for system messages.
    pub const fn kind(&self) -> Option<ChannelMessage> {
        ChannelMessage::from_status(self.bytes[0])
    }

    /// Number of meaningful bytes for a MIDI-output tap.
    pub const fn len(&self) -> usize {
        match self.kind() {
            Some(kind) => 1 + kind.data_len(),
            None => 3,
        }
    }

    /// Always false; a message carries at least its status byte.
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Addresses of the kernel's host-visible parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum ParamAddress {
    /// Override instrument (`-1` = none).
    Instrument = 0,
    /// Standing transposition in semitones.
    Transposition = 1,
    /// Mute flag (output passes input through).
    Mute = 2,
    /// Bypass flag (output passes input through).
    Bypass = 3,
}

impl ParamAddress {
    /// All addresses in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Instrument,
        Self::Transposition,
        Self::Mute,
        Self::Bypass,
    ];

    /// Look up an address from its raw host value.
    pub const fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::Instrument),
            1 => Some(Self::Transposition),
            2 => Some(Self::Mute),
            3 => Some(Self::Bypass),
            _ => None,
        }
    }

    /// Raw host value.
    pub const fn raw(self) -> u64 {
        self as u64
    }

    /// Short stable identifier (used by scores and diagnostics).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Instrument => "instrument",
            Self::Transposition => "transposition",
            Self::Mute => "mute",
            Self::Bypass => "bypass",
        }
    }
}

/// Payload of a render event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    /// A MIDI channel or system message.
    Midi(MidiMessage),
    /// Immediate parameter change.
    Parameter {
        /// Raw parameter address (see [`ParamAddress`]).
        address: u64,
        /// New value in plain units.
        value: f32,
    },
    /// Ramped parameter change. The kernel's parameters are integral or
    /// boolean, so only the end value is applied, at the event offset.
    ParameterRamp {
        /// Raw parameter address.
        address: u64,
        /// Value at the end of the ramp.
        end_value: f32,
        /// Ramp duration in frames.
        duration_frames: u32,
    },
    /// Render tokens and anything else the kernel does not act on.
    Other,
}

/// One time-stamped event in a render call's event list.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventRecord {
    /// Frame offset relative to the quantum start. Valid range is
    /// `0..=frame_count`; anything else is clamped by the scheduler.
    pub sample_offset: i64,
    /// Event payload.
    pub kind: EventKind,
}

impl EventRecord {
    /// MIDI event at `offset`.
    pub const fn midi(offset: i64, message: MidiMessage) -> Self {
        Self {
            sample_offset: offset,
            kind: EventKind::Midi(message),
        }
    }

    /// Parameter change at `offset`.
    pub const fn parameter(offset: i64, address: ParamAddress, value: f32) -> Self {
        Self {
            sample_offset: offset,
            kind: EventKind::Parameter {
                address: address.raw(),
                value,
            },
        }
    }

    /// Ignored event at `offset`.
    pub const fn other(offset: i64) -> Self {
        Self {
            sample_offset: offset,
            kind: EventKind::Other,
        }
    }
}

/// Descriptor for one host render callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderQuantum {
    /// Frames to produce in this call.
    pub frame_count: u32,
    /// Host sample time of the first frame.
    pub sample_time: i64,
    /// Output channel count.
    pub channel_count: usize,
}

impl RenderQuantum {
    /// Quantum of `frame_count` frames over `channel_count` channels at sample time 0.
    pub const fn new(frame_count: u32, channel_count: usize) -> Self {
        Self {
            frame_count,
            sample_time: 0,
            channel_count,
        }
    }

    /// Set the host sample time.
    pub const fn at(mut self, sample_time: i64) -> Self {
        self.sample_time = sample_time;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_nibble_decodes_all_channel_voice_kinds() {
        for (status, kind) in [
            (0x80, ChannelMessage::NoteOff),
            (0x9F, ChannelMessage::NoteOn),
            (0xA3, ChannelMessage::PolyPressure),
            (0xB0, ChannelMessage::ControlChange),
            (0xC9, ChannelMessage::ProgramChange),
            (0xD1, ChannelMessage::ChannelPressure),
            (0xE7, ChannelMessage::PitchBend),
        ] {
            assert_eq!(ChannelMessage::from_status(status), Some(kind));
        }
        assert_eq!(ChannelMessage::from_status(0xF8), None);
        assert_eq!(ChannelMessage::from_status(0x45), None);
    }

    #[test]
    fn channel_is_low_nibble() {
        let msg = MidiMessage::new(0x99, 36, 100);
        assert_eq!(msg.channel(), 9);
        assert_eq!(msg.kind(), Some(ChannelMessage::NoteOn));
        assert_eq!(MidiMessage::note_on(25, 60, 1).channel(), 9);
    }

    #[test]
    fn pitch_bend_splits_fourteen_bits() {
        let msg = MidiMessage::pitch_bend(0, 8192);
        assert_eq!(msg.data1(), 0);
        assert_eq!(msg.data2(), 64);

        let max = MidiMessage::pitch_bend(0, u16::MAX);
        assert_eq!((max.data1(), max.data2()), (0x7F, 0x7F));
    }

    #[test]
    fn message_length_follows_kind() {
        assert_eq!(MidiMessage::program_change(0, 5).len(), 2);
        assert_eq!(MidiMessage::channel_pressure(0, 5).len(), 2);
        assert_eq!(MidiMessage::note_on(0, 60, 100).len(), 3);
    }

    #[test]
    fn param_address_roundtrips_through_raw() {
        for address in ParamAddress::ALL {
            assert_eq!(ParamAddress::from_raw(address.raw()), Some(address));
        }
        assert_eq!(ParamAddress::from_raw(42), None);
    }
}
