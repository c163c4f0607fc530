//! Voices and the fixed-size voice pool.

use crate::envelope::{Envelope, EnvelopeShape};
use crate::oscillator::{Oscillator, Waveform};

/// Default polyphony of [`FontSynth`](crate::FontSynth).
pub const POOL_SIZE: usize = 32;

/// Everything needed to start a voice.
#[derive(Debug, Clone, Copy)]
pub struct VoiceStart {
    /// MIDI channel.
    pub channel: u8,
    /// Key as received; note-offs match on this.
    pub key: u8,
    /// Key actually sounding, after transposition.
    pub note: u8,
    /// Pitch before bend.
    pub freq_hz: f32,
    /// Oscillator waveform.
    pub waveform: Waveform,
    /// Amplitude envelope.
    pub shape: EnvelopeShape,
    /// Patch gain times velocity.
    pub gain: f32,
    /// Follows channel pitch bend. False for drum pieces.
    pub pitched: bool,
}

/// One sounding note.
#[derive(Debug, Clone, Default)]
pub struct Voice {
    osc: Oscillator,
    env: Envelope,
    channel: u8,
    key: u8,
    note: u8,
    base_hz: f32,
    gain: f32,
    pressure: f32,
    pitched: bool,
    held: bool,
    sustained: bool,
    age: u64,
}

impl Voice {
    /// Start (or retrigger) the voice.
    pub fn start(&mut self, start: &VoiceStart, seed: u32, sample_rate: f32) {
        self.channel = start.channel;
        self.key = start.key;
        self.note = start.note;
        self.base_hz = start.freq_hz;
        self.gain = start.gain;
        self.pressure = 1.0;
        self.pitched = start.pitched;
        self.held = true;
        self.sustained = false;
        self.osc.set_waveform(start.waveform);
        self.osc.set_frequency(start.freq_hz, sample_rate);
        self.osc.restart(seed);
        self.env.trigger(&start.shape, sample_rate);
    }

    /// Key released. With the pedal down the voice keeps sounding until
    /// [`release_sustained`](Self::release_sustained).
    pub fn note_off(&mut self, pedal_down: bool) {
        if !self.held {
            return;
        }
        self.held = false;
        if pedal_down {
            self.sustained = true;
        } else {
            self.env.release();
        }
    }

    /// Release a voice held only by the sustain pedal.
    pub fn release_sustained(&mut self) {
        if self.sustained {
            self.sustained = false;
            self.env.release();
        }
    }

    /// Enter release regardless of key or pedal.
    pub fn release(&mut self) {
        self.held = false;
        self.sustained = false;
        self.env.release();
    }

    /// Silence immediately.
    pub fn kill(&mut self) {
        self.held = false;
        self.sustained = false;
        self.env.kill();
    }

    /// True until the envelope finishes.
    pub fn is_active(&self) -> bool {
        self.env.is_active()
    }

    /// Key down (not yet released).
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Kept alive by the sustain pedal.
    pub fn is_sustained(&self) -> bool {
        self.sustained
    }

    /// Channel the voice was started on.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Key that started the voice.
    pub fn key(&self) -> u8 {
        self.key
    }

    /// Key actually sounding.
    pub fn note(&self) -> u8 {
        self.note
    }

    /// Allocation order stamp.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Scale output by aftertouch `pressure` (`0..=127` adds up to +50%).
    pub fn set_pressure(&mut self, pressure: u8) {
        self.pressure = 1.0 + 0.5 * f32::from(pressure.min(127)) / 127.0;
    }

    /// Apply a pitch-bend ratio. Unpitched voices ignore it.
    pub fn set_bend_ratio(&mut self, ratio: f32, sample_rate: f32) {
        if self.pitched {
            self.osc.set_frequency(self.base_hz * ratio, sample_rate);
        }
    }

    /// Render one mono sample.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let level = self.env.next_level();
        self.osc.next_sample() * level * self.gain * self.pressure
    }
}

/// Fixed pool of `N` voices with oldest-note stealing. `N` must be at least 1.
#[derive(Debug, Clone)]
pub struct VoicePool<const N: usize> {
    voices: [Voice; N],
    age_counter: u64,
}

impl<const N: usize> Default for VoicePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> VoicePool<N> {
    /// Create a pool of idle voices.
    pub fn new() -> Self {
        Self {
            voices: core::array::from_fn(|_| Voice::default()),
            age_counter: 0,
        }
    }

    /// Claim a voice: the first idle one, otherwise the oldest.
    pub fn allocate(&mut self) -> &mut Voice {
        self.age_counter += 1;
        let index = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age)
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);
        let voice = &mut self.voices[index];
        voice.age = self.age_counter;
        voice
    }

    /// Sounding voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// All voices, idle ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Active voices on `channel`.
    pub fn on_channel(&mut self, channel: u8) -> impl Iterator<Item = &mut Voice> {
        self.voices
            .iter_mut()
            .filter(move |v| v.is_active() && v.channel == channel)
    }

    /// Active voices.
    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut().filter(|v| v.is_active())
    }

    /// Silence every voice.
    pub fn kill_all(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(key: u8) -> VoiceStart {
        VoiceStart {
            channel: 0,
            key,
            note: key,
            freq_hz: 440.0,
            waveform: Waveform::Saw,
            shape: EnvelopeShape {
                attack_ms: 1.0,
                decay_ms: 50.0,
                sustain: 0.8,
                release_ms: 5.0,
            },
            gain: 1.0,
            pitched: true,
        }
    }

    #[test]
    fn steals_oldest_when_full() {
        let mut pool: VoicePool<4> = VoicePool::new();
        for key in 60..64 {
            pool.allocate().start(&start(key), 1, 48000.0);
        }
        assert_eq!(pool.active_count(), 4);

        pool.allocate().start(&start(70), 1, 48000.0);
        assert_eq!(pool.active_count(), 4);
        let keys: Vec<u8> = pool.iter().map(Voice::key).collect();
        assert!(!keys.contains(&60));
        assert!(keys.contains(&70));
    }

    #[test]
    fn prefers_idle_voice_over_stealing() {
        let mut pool: VoicePool<2> = VoicePool::new();
        pool.allocate().start(&start(60), 1, 48000.0);
        pool.allocate().start(&start(61), 1, 48000.0);
        pool.on_channel(0).for_each(|v| {
            if v.key() == 61 {
                v.kill();
            }
        });
        pool.allocate().start(&start(62), 1, 48000.0);
        let keys: Vec<u8> = pool.iter().map(Voice::key).collect();
        assert!(keys.contains(&60) && keys.contains(&62));
    }

    #[test]
    fn pedal_holds_released_key() {
        let mut voice = Voice::default();
        voice.start(&start(60), 1, 48000.0);
        voice.note_off(true);
        assert!(voice.is_sustained());
        for _ in 0..4800 {
            voice.next_sample();
        }
        assert!(voice.is_active());

        voice.release_sustained();
        for _ in 0..4800 {
            voice.next_sample();
        }
        assert!(!voice.is_active());
    }

    #[test]
    fn unpitched_voice_ignores_bend() {
        let mut voice = Voice::default();
        let mut drum = start(36);
        drum.pitched = false;
        voice.start(&drum, 1, 48000.0);
        voice.set_bend_ratio(2.0, 48000.0);
        assert!((voice.osc.phase_increment() - 440.0 / 48000.0).abs() < 1e-7);
    }
}
