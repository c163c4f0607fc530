//! [`FontSynth`]: the sound-bank synthesizer behind the kernel's engine seam.

use std::sync::Arc;

use miditone_core::{ChannelMessage, DRUM_CHANNEL, EngineError, SynthEngine};

use crate::bank::SoundBank;
use crate::channel::{BEND_RANGE_SEMITONES, ChannelState};
use crate::error::BankError;
use crate::runtime::{Runtime, cents_to_ratio};
use crate::voice::{POOL_SIZE, VoicePool, VoiceStart};

/// Asset path that selects [`SoundBank::builtin`] instead of a file.
pub const BUILTIN_ASSET: &str = "builtin:";

/// Number of MIDI channels.
pub const CHANNELS: usize = 16;

/// Largest standing transposition, in semitones either way.
pub const MAX_TRANSPOSITION: i32 = 48;

const MASTER_GAIN: f32 = 0.3;

const CC_VOLUME: u8 = 7;
const CC_PAN: u8 = 10;
const CC_EXPRESSION: u8 = 11;
const CC_SUSTAIN: u8 = 64;
const CC_ALL_SOUND_OFF: u8 = 120;
const CC_RESET_CONTROLLERS: u8 = 121;
const CC_ALL_NOTES_OFF: u8 = 123;

/// Sixteen-channel synthesizer playing patches and drum kits from a
/// [`SoundBank`].
///
/// `decode` fails with [`EngineError::NotPrepared`] until
/// [`prepare`](SynthEngine::prepare) has loaded a bank.
///
/// # Example
///
/// ```rust
/// use miditone_core::{ChannelMessage, SynthEngine};
/// use miditone_synth::{BUILTIN_ASSET, FontSynth, Runtime};
///
/// let runtime = Runtime::acquire(48000.0).unwrap();
/// let mut synth = FontSynth::new(runtime);
/// synth.prepare(BUILTIN_ASSET).unwrap();
/// synth.play_note_event(0, ChannelMessage::NoteOn, 60, 100).unwrap();
///
/// let mut out = vec![0.0f32; 2 * 256];
/// assert_eq!(synth.decode(&mut out, 2).unwrap(), 256);
/// assert!(out.iter().any(|&s| s != 0.0));
/// ```
#[derive(Debug)]
pub struct FontSynth {
    runtime: Arc<Runtime>,
    channels: [ChannelState; CHANNELS],
    voices: VoicePool<POOL_SIZE>,
    bank: Option<SoundBank>,
    transposition: i32,
    seed: u32,
}

impl FontSynth {
    /// Create an unprepared synthesizer on `runtime`.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            channels: core::array::from_fn(|i| ChannelState::new(i as u8)),
            voices: VoicePool::new(),
            bank: None,
            transposition: 0,
            seed: 0x1234_5678,
        }
    }

    /// Create a synthesizer with `bank` already loaded.
    pub fn with_bank(runtime: Arc<Runtime>, bank: SoundBank) -> Self {
        let mut synth = Self::new(runtime);
        synth.bank = Some(bank);
        synth
    }

    /// Runtime this synthesizer renders on.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Loaded bank, if prepared.
    pub fn bank(&self) -> Option<&SoundBank> {
        self.bank.as_ref()
    }

    /// Controller state of `channel`.
    pub fn channel(&self, channel: u8) -> Option<&ChannelState> {
        self.channels.get(usize::from(channel))
    }

    /// Standing transposition in semitones.
    pub fn transposition(&self) -> i32 {
        self.transposition
    }

    /// Sounding voices.
    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    fn next_seed(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.seed
    }

    fn note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), EngineError> {
        let state = channel_mut(&mut self.channels, channel)?.clone();
        let bank = self.bank.as_ref().ok_or(EngineError::NotPrepared)?;
        let velocity_gain = f32::from(velocity.min(127)) / 127.0;

        let start = if state.is_drum {
            let Some(piece) = bank.kit(state.kit).and_then(|kit| kit.piece(key)) else {
                return Ok(());
            };
            VoiceStart {
                channel,
                key,
                note: key,
                freq_hz: piece.pitch_hz,
                waveform: piece.waveform,
                shape: piece.envelope(),
                gain: piece.gain * velocity_gain,
                pitched: false,
            }
        } else {
            let patch = bank.patch(state.program).ok_or(EngineError::Rejected)?;
            let note = (i32::from(key) + self.transposition).clamp(0, 127) as u8;
            VoiceStart {
                channel,
                key,
                note,
                freq_hz: self.runtime.note_frequency(note) * cents_to_ratio(patch.detune_cents),
                waveform: patch.waveform,
                shape: patch.envelope(),
                gain: patch.gain * velocity_gain,
                pitched: true,
            }
        };

        let seed = self.next_seed();
        let sample_rate = self.runtime.sample_rate();
        let bend = bend_ratio(&state);
        let voice = self.voices.allocate();
        voice.start(&start, seed, sample_rate);
        voice.set_bend_ratio(bend, sample_rate);
        Ok(())
    }

    fn note_off(&mut self, channel: u8, key: u8) -> Result<(), EngineError> {
        let pedal = channel_mut(&mut self.channels, channel)?.sustain;
        for voice in self.voices.on_channel(channel) {
            if voice.key() == key && voice.is_held() {
                voice.note_off(pedal);
            }
        }
        Ok(())
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> Result<(), EngineError> {
        let state = channel_mut(&mut self.channels, channel)?;
        match controller {
            CC_VOLUME => state.volume = value.min(127),
            CC_PAN => state.pan = value.min(127),
            CC_EXPRESSION => state.expression = value.min(127),
            CC_SUSTAIN => {
                state.sustain = value >= 64;
                if !state.sustain {
                    self.voices
                        .on_channel(channel)
                        .for_each(|v| v.release_sustained());
                }
            }
            CC_ALL_SOUND_OFF => self.voices.on_channel(channel).for_each(|v| v.kill()),
            CC_RESET_CONTROLLERS => {
                state.reset_controllers();
                for voice in self.voices.on_channel(channel) {
                    voice.release_sustained();
                    voice.set_pressure(0);
                }
            }
            CC_ALL_NOTES_OFF => self.voices.on_channel(channel).for_each(|v| v.release()),
            _ => tracing::trace!(channel, controller, value, "unhandled controller"),
        }
        Ok(())
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), EngineError> {
        if program > 127 {
            return Err(EngineError::Rejected);
        }
        let state = channel_mut(&mut self.channels, channel)?;
        if state.is_drum {
            state.kit = program;
        } else {
            state.program = program;
        }
        Ok(())
    }

    fn pitch_bend(&mut self, channel: u8, lsb: u8, msb: u8) -> Result<(), EngineError> {
        let state = channel_mut(&mut self.channels, channel)?;
        state.set_bend(lsb, msb);
        let ratio = bend_ratio(state);
        let sample_rate = self.runtime.sample_rate();
        self.voices
            .on_channel(channel)
            .for_each(|v| v.set_bend_ratio(ratio, sample_rate));
        Ok(())
    }
}

fn channel_mut(
    channels: &mut [ChannelState; CHANNELS],
    channel: u8,
) -> Result<&mut ChannelState, EngineError> {
    channels
        .get_mut(usize::from(channel))
        .ok_or(EngineError::Rejected)
}

fn bend_ratio(state: &ChannelState) -> f32 {
    let semitones = state.bend_semitones().clamp(-BEND_RANGE_SEMITONES, BEND_RANGE_SEMITONES);
    cents_to_ratio(semitones * 100.0)
}

impl SynthEngine for FontSynth {
    type PrepareError = BankError;

    fn prepare(&mut self, asset_path: &str) -> Result<(), BankError> {
        let bank = if asset_path == BUILTIN_ASSET {
            SoundBank::builtin()
        } else {
            SoundBank::load(asset_path)?
        };
        tracing::info!(
            bank = %bank.name,
            patches = bank.patches.len(),
            kits = bank.kits.len(),
            "sound bank loaded"
        );
        self.voices.kill_all();
        self.bank = Some(bank);
        Ok(())
    }

    fn play_note_event(
        &mut self,
        channel: u8,
        kind: ChannelMessage,
        note: u8,
        param: u8,
    ) -> Result<(), EngineError> {
        if note > 127 {
            return Err(EngineError::Rejected);
        }
        match kind {
            ChannelMessage::NoteOn if param > 0 => self.note_on(channel, note, param),
            ChannelMessage::NoteOn | ChannelMessage::NoteOff => self.note_off(channel, note),
            ChannelMessage::PolyPressure => {
                channel_mut(&mut self.channels, channel)?;
                for voice in self.voices.on_channel(channel) {
                    if voice.key() == note {
                        voice.set_pressure(param);
                    }
                }
                Ok(())
            }
            _ => Err(EngineError::Rejected),
        }
    }

    fn send_channel_event(
        &mut self,
        channel: u8,
        kind: ChannelMessage,
        p1: u8,
        p2: Option<u8>,
    ) -> Result<(), EngineError> {
        match kind {
            ChannelMessage::ControlChange => {
                self.control_change(channel, p1, p2.ok_or(EngineError::Rejected)?)
            }
            ChannelMessage::ProgramChange => self.program_change(channel, p1),
            ChannelMessage::PitchBend => self.pitch_bend(channel, p1, p2.ok_or(EngineError::Rejected)?),
            ChannelMessage::ChannelPressure => {
                channel_mut(&mut self.channels, channel)?.pressure = p1.min(127);
                self.voices
                    .on_channel(channel)
                    .for_each(|v| v.set_pressure(p1));
                Ok(())
            }
            _ => Err(EngineError::Rejected),
        }
    }

    fn select_drum_kit(&mut self, channel: u8) -> Result<(), EngineError> {
        let state = channel_mut(&mut self.channels, channel)?;
        if !state.is_drum {
            state.is_drum = true;
            state.kit = 0;
        }
        Ok(())
    }

    fn select_instrument(&mut self, code: i32) -> Result<(), EngineError> {
        match code {
            0..=127 => {
                for (index, state) in self.channels.iter_mut().enumerate() {
                    if index != usize::from(DRUM_CHANNEL) {
                        state.program = code as u8;
                        state.is_drum = false;
                    }
                }
            }
            128..=255 => {
                for state in &mut self.channels {
                    state.is_drum = true;
                    state.kit = (code - 128) as u8;
                }
            }
            _ => {
                tracing::warn!(code, "instrument code rejected");
                return Err(EngineError::Rejected);
            }
        }
        tracing::debug!(code, "instrument selected");
        Ok(())
    }

    fn set_transposition(&mut self, semitones: i32) -> Result<(), EngineError> {
        let clamped = semitones.clamp(-MAX_TRANSPOSITION, MAX_TRANSPOSITION);
        if clamped != semitones {
            tracing::debug!(semitones, clamped, "transposition clamped");
        }
        self.transposition = clamped;
        Ok(())
    }

    fn decode(&mut self, interleaved: &mut [f32], channels: usize) -> Result<usize, EngineError> {
        if self.bank.is_none() {
            return Err(EngineError::NotPrepared);
        }
        if channels == 0 {
            return Err(EngineError::Rejected);
        }

        let mix: [(f32, f32); CHANNELS] = core::array::from_fn(|i| {
            let state = &self.channels[i];
            let gain = state.gain() * MASTER_GAIN;
            let (left, right) = state.pan_gains();
            (left * gain, right * gain)
        });

        let frames = interleaved.len() / channels;
        for frame in interleaved.chunks_exact_mut(channels) {
            let (mut left, mut right) = (0.0f32, 0.0f32);
            for voice in self.voices.active_mut() {
                let sample = voice.next_sample();
                let (gl, gr) = mix[usize::from(voice.channel()) % CHANNELS];
                left += sample * gl;
                right += sample * gr;
            }
            match frame {
                [mono] => *mono = 0.5 * (left + right),
                _ => {
                    for (i, out) in frame.iter_mut().enumerate() {
                        *out = if i % 2 == 0 { left } else { right };
                    }
                }
            }
        }
        Ok(frames)
    }

    fn reset(&mut self) {
        self.voices.kill_all();
        self.channels = core::array::from_fn(|i| ChannelState::new(i as u8));
        self.transposition = 0;
        tracing::debug!("synth reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR_SECONDS: usize = 4 * 48000;

    fn synth() -> FontSynth {
        let mut synth = FontSynth::new(Runtime::acquire(48000.0).unwrap());
        synth.prepare(BUILTIN_ASSET).unwrap();
        synth
    }

    fn render(synth: &mut FontSynth, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        synth.decode(&mut out, 2).unwrap();
        out
    }

    #[test]
    fn decode_before_prepare_fails() {
        let mut synth = FontSynth::new(Runtime::acquire(48000.0).unwrap());
        let mut out = [0.0f32; 8];
        assert_eq!(synth.decode(&mut out, 2), Err(EngineError::NotPrepared));
    }

    #[test]
    fn velocity_zero_is_note_off() {
        let mut synth = synth();
        synth.play_note_event(0, ChannelMessage::NoteOn, 60, 100).unwrap();
        synth.play_note_event(0, ChannelMessage::NoteOn, 60, 0).unwrap();
        render(&mut synth, FOUR_SECONDS);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn sustain_pedal_defers_note_off() {
        let mut synth = synth();
        synth.send_channel_event(0, ChannelMessage::ControlChange, CC_SUSTAIN, Some(127)).unwrap();
        synth.play_note_event(0, ChannelMessage::NoteOn, 60, 100).unwrap();
        synth.play_note_event(0, ChannelMessage::NoteOff, 60, 0).unwrap();
        render(&mut synth, 4800);
        assert_eq!(synth.active_voices(), 1);

        synth.send_channel_event(0, ChannelMessage::ControlChange, CC_SUSTAIN, Some(0)).unwrap();
        render(&mut synth, FOUR_SECONDS);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn transposed_note_off_matches_starting_key() {
        let mut synth = synth();
        synth.set_transposition(12).unwrap();
        synth.play_note_event(0, ChannelMessage::NoteOn, 60, 100).unwrap();
        synth.set_transposition(0).unwrap();
        let voice = synth.voices.iter().find(|v| v.is_active()).unwrap();
        assert_eq!((voice.key(), voice.note()), (60, 72));

        synth.play_note_event(0, ChannelMessage::NoteOff, 60, 0).unwrap();
        assert!(synth.voices.iter().all(|v| !v.is_held()));
    }

    #[test]
    fn drum_notes_ignore_transposition() {
        let mut synth = synth();
        synth.set_transposition(7).unwrap();
        synth.play_note_event(9, ChannelMessage::NoteOn, 36, 100).unwrap();
        let voice = synth.voices.iter().find(|v| v.is_active()).unwrap();
        assert_eq!(voice.note(), 36);
    }

    #[test]
    fn transposition_clamps() {
        let mut synth = synth();
        synth.set_transposition(100).unwrap();
        assert_eq!(synth.transposition(), MAX_TRANSPOSITION);
        synth.set_transposition(-100).unwrap();
        assert_eq!(synth.transposition(), -MAX_TRANSPOSITION);
    }

    #[test]
    fn instrument_codes_select_programs_and_kits() {
        let mut synth = synth();
        synth.select_instrument(40).unwrap();
        assert_eq!(synth.channel(0).unwrap().program, 40);
        assert!(synth.channel(9).unwrap().is_drum);
        assert_eq!(synth.channel(9).unwrap().program, 0);

        synth.select_instrument(128 + 25).unwrap();
        assert!(synth.channels.iter().all(|c| c.is_drum && c.kit == 25));

        assert_eq!(synth.select_instrument(256), Err(EngineError::Rejected));
        assert_eq!(synth.select_instrument(-5), Err(EngineError::Rejected));
    }

    #[test]
    fn drum_select_keeps_chosen_kit() {
        let mut synth = synth();
        synth.send_channel_event(9, ChannelMessage::ProgramChange, 25, None).unwrap();
        synth.select_drum_kit(9).unwrap();
        assert_eq!(synth.channel(9).unwrap().kit, 25);

        synth.select_drum_kit(3).unwrap();
        let ch = synth.channel(3).unwrap();
        assert!(ch.is_drum);
        assert_eq!(ch.kit, 0);
    }

    #[test]
    fn mono_output_averages_stereo() {
        let mut left_only = synth();
        left_only.send_channel_event(0, ChannelMessage::ControlChange, CC_PAN, Some(0)).unwrap();
        left_only.play_note_event(0, ChannelMessage::NoteOn, 69, 127).unwrap();
        let mut mono = vec![0.0f32; 256];
        left_only.decode(&mut mono, 1).unwrap();

        let mut reference = synth();
        reference.send_channel_event(0, ChannelMessage::ControlChange, CC_PAN, Some(0)).unwrap();
        reference.play_note_event(0, ChannelMessage::NoteOn, 69, 127).unwrap();
        let stereo = render(&mut reference, 256);

        for (i, m) in mono.iter().enumerate() {
            let expected = 0.5 * (stereo[2 * i] + stereo[2 * i + 1]);
            assert!((m - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn wide_layouts_repeat_left_right() {
        let mut synth = synth();
        synth.play_note_event(0, ChannelMessage::NoteOn, 60, 100).unwrap();
        let mut out = vec![0.0f32; 4 * 64];
        assert_eq!(synth.decode(&mut out, 4).unwrap(), 64);
        for frame in out.chunks_exact(4) {
            assert_eq!(frame[0], frame[2]);
            assert_eq!(frame[1], frame[3]);
        }
    }

    #[test]
    fn all_sound_off_silences_channel() {
        let mut synth = synth();
        synth.play_note_event(2, ChannelMessage::NoteOn, 60, 100).unwrap();
        synth.play_note_event(3, ChannelMessage::NoteOn, 60, 100).unwrap();
        synth.send_channel_event(2, ChannelMessage::ControlChange, CC_ALL_SOUND_OFF, Some(0)).unwrap();
        assert_eq!(synth.active_voices(), 1);
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut synth = synth();
        synth.select_instrument(30).unwrap();
        synth.set_transposition(5).unwrap();
        synth.play_note_event(0, ChannelMessage::NoteOn, 60, 100).unwrap();
        synth.reset();
        assert_eq!(synth.active_voices(), 0);
        assert_eq!(synth.transposition(), 0);
        assert_eq!(synth.channel(0).unwrap().program, 0);
        assert!(synth.bank().is_some());
    }

    #[test]
    fn out_of_range_commands_are_rejected() {
        let mut synth = synth();
        assert_eq!(
            synth.play_note_event(16, ChannelMessage::NoteOn, 60, 100),
            Err(EngineError::Rejected)
        );
        assert_eq!(
            synth.send_channel_event(0, ChannelMessage::PitchBend, 0, None),
            Err(EngineError::Rejected)
        );
        assert_eq!(
            synth.send_channel_event(0, ChannelMessage::NoteOn, 60, Some(1)),
            Err(EngineError::Rejected)
        );
    }
}
