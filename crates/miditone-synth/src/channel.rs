//! Per-channel controller state.

use miditone_core::DRUM_CHANNEL;

/// Pitch-bend range in semitones either side of center.
pub const BEND_RANGE_SEMITONES: f32 = 2.0;

const BEND_CENTER: u16 = 8192;

/// Controller state of one MIDI channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    /// Melodic program `0..=127`.
    pub program: u8,
    /// Channel plays drum kit pieces instead of the melodic program.
    pub is_drum: bool,
    /// Drum kit number, used while `is_drum`.
    pub kit: u8,
    /// CC 7.
    pub volume: u8,
    /// CC 10, 64 = center.
    pub pan: u8,
    /// CC 11.
    pub expression: u8,
    /// CC 64 held down.
    pub sustain: bool,
    /// 14-bit pitch bend, 8192 = center.
    pub bend: u16,
    /// Channel pressure.
    pub pressure: u8,
}

impl ChannelState {
    /// Power-on state for channel `index`. Channel 9 starts in drum mode.
    pub fn new(index: u8) -> Self {
        Self {
            program: 0,
            is_drum: index == DRUM_CHANNEL,
            kit: 0,
            volume: 100,
            pan: 64,
            expression: 127,
            sustain: false,
            bend: BEND_CENTER,
            pressure: 0,
        }
    }

    /// Restore controllers to their defaults (CC 121). Program, drum mode
    /// and kit are kept.
    pub fn reset_controllers(&mut self) {
        self.volume = 100;
        self.pan = 64;
        self.expression = 127;
        self.sustain = false;
        self.bend = BEND_CENTER;
        self.pressure = 0;
    }

    /// Linear gain from volume and expression (each squared, as a taper).
    pub fn gain(&self) -> f32 {
        let volume = f32::from(self.volume) / 127.0;
        let expression = f32::from(self.expression) / 127.0;
        volume * volume * expression * expression
    }

    /// Constant-power left/right gains for the current pan.
    pub fn pan_gains(&self) -> (f32, f32) {
        let position = f32::from(self.pan.min(127)) / 127.0;
        let angle = position * core::f32::consts::FRAC_PI_2;
        (libm::cosf(angle), libm::sinf(angle))
    }

    /// Pitch-bend offset in semitones.
    pub fn bend_semitones(&self) -> f32 {
        (f32::from(self.bend) - f32::from(BEND_CENTER)) / f32::from(BEND_CENTER)
            * BEND_RANGE_SEMITONES
    }

    /// Set the 14-bit bend from its LSB/MSB data bytes.
    pub fn set_bend(&mut self, lsb: u8, msb: u8) {
        self.bend = (u16::from(msb & 0x7F) << 7) | u16::from(lsb & 0x7F);
    }
}
