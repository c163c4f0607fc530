//! Amplitude envelopes for patch and drum voices.
//!
//! Linear attack, exponential decay toward sustain, exponential release.
//! A sustain of zero makes the envelope percussive: it ends on its own
//! after the decay without waiting for a note-off.

use libm::{expf, roundf};

/// Envelope stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    /// Silent, voice is free.
    #[default]
    Idle,
    /// Rising to full level.
    Attack,
    /// Falling toward sustain.
    Decay,
    /// Holding while the key (or pedal) is down.
    Sustain,
    /// Falling to silence after note-off.
    Release,
}

/// Time and level settings, in bank units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeShape {
    /// Attack time in milliseconds.
    pub attack_ms: f32,
    /// Decay time constant in milliseconds.
    pub decay_ms: f32,
    /// Sustain level `0..=1`.
    pub sustain: f32,
    /// Release time constant in milliseconds.
    pub release_ms: f32,
}

impl EnvelopeShape {
    /// Percussive shape: instant attack, decay to silence.
    pub const fn percussive(decay_ms: f32) -> Self {
        Self {
            attack_ms: 0.5,
            decay_ms,
            sustain: 0.0,
            release_ms: decay_ms,
        }
    }
}

const SILENCE: f32 = 1.0e-4;

fn coefficient(ms: f32, sample_rate: f32) -> f32 {
    let samples = ms * sample_rate / 1000.0;
    expf(-1.0 / samples.max(1.0))
}

/// ADSR envelope generator.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    stage: Stage,
    level: f32,
    attack_step: f32,
    attack_remaining: u32,
    decay_coeff: f32,
    release_coeff: f32,
    sustain: f32,
}

impl Envelope {
    /// Start the envelope from its current level (retrigger-safe).
    pub fn trigger(&mut self, shape: &EnvelopeShape, sample_rate: f32) {
        let attack_samples = roundf(shape.attack_ms * sample_rate / 1000.0).max(1.0) as u32;
        self.attack_remaining = attack_samples;
        self.attack_step = (1.0 - self.level.min(1.0)) / attack_samples as f32;
        self.decay_coeff = coefficient(shape.decay_ms, sample_rate);
        self.release_coeff = coefficient(shape.release_ms, sample_rate);
        self.sustain = shape.sustain.clamp(0.0, 1.0);
        self.stage = Stage::Attack;
    }

    /// Enter release from any active stage.
    pub fn release(&mut self) {
        if self.stage != Stage::Idle {
            self.stage = Stage::Release;
        }
    }

    /// Silence immediately.
    pub fn kill(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current level.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// True unless idle.
    pub fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    /// Advance one sample and return the level.
    #[inline]
    pub fn next_level(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                self.attack_remaining = self.attack_remaining.saturating_sub(1);
                if self.attack_remaining == 0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                } else {
                    self.level += self.attack_step;
                }
            }
            Stage::Decay => {
                self.level = self.sustain + (self.level - self.sustain) * self.decay_coeff;
                if self.sustain <= 0.0 && self.level < SILENCE {
                    self.kill();
                } else if (self.level - self.sustain).abs() < SILENCE {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.level = self.sustain,
            Stage::Release => {
                self.level *= self.release_coeff;
                if self.level < SILENCE {
                    self.kill();
                }
            }
        }
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn shape() -> EnvelopeShape {
        EnvelopeShape {
            attack_ms: 1.0,
            decay_ms: 10.0,
            sustain: 0.5,
            release_ms: 10.0,
        }
    }

    #[test]
    fn attack_reaches_full_level_in_attack_time() {
        let mut env = Envelope::default();
        env.trigger(&shape(), SR);
        for _ in 0..48 {
            env.next_level();
        }
        assert_eq!(env.stage(), Stage::Decay);
        assert_eq!(env.level(), 1.0);
    }

    #[test]
    fn attack_length_is_exact_for_fractional_sample_counts() {
        // 0.5 ms at 44.1 kHz rounds to 22 samples.
        let mut env = Envelope::default();
        env.trigger(&EnvelopeShape::percussive(20.0), 44100.0);
        let mut previous = 0.0;
        for _ in 0..21 {
            let level = env.next_level();
            assert!(level > previous && level < 1.0);
            previous = level;
        }
        assert_eq!(env.stage(), Stage::Attack);
        assert_eq!(env.next_level(), 1.0);
        assert_eq!(env.stage(), Stage::Decay);
    }

    #[test]
    fn retrigger_attacks_from_current_level() {
        let mut env = Envelope::default();
        env.trigger(&shape(), SR);
        for _ in 0..24 {
            env.next_level();
        }
        let midway = env.level();
        env.trigger(&shape(), SR);
        assert!(env.next_level() > midway);
        for _ in 0..47 {
            env.next_level();
        }
        assert_eq!(env.stage(), Stage::Decay);
        assert_eq!(env.level(), 1.0);
    }

    #[test]
    fn settles_at_sustain_then_releases_to_idle() {
        let mut env = Envelope::default();
        env.trigger(&shape(), SR);
        for _ in 0..SR as usize / 4 {
            env.next_level();
        }
        assert_eq!(env.stage(), Stage::Sustain);
        assert_eq!(env.level(), 0.5);

        env.release();
        for _ in 0..SR as usize / 4 {
            env.next_level();
        }
        assert!(!env.is_active());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn percussive_shape_ends_without_release() {
        let mut env = Envelope::default();
        env.trigger(&EnvelopeShape::percussive(20.0), SR);
        for _ in 0..SR as usize / 2 {
            env.next_level();
        }
        assert_eq!(env.stage(), Stage::Idle);
    }

    #[test]
    fn release_on_idle_is_ignored() {
        let mut env = Envelope::default();
        env.release();
        assert_eq!(env.stage(), Stage::Idle);
    }
}
