//! Band-limited oscillators for patch and drum voices.
//!
//! Saw and square use a two-sample PolyBLEP correction at each
//! discontinuity. Sine and triangle are continuous and rendered directly.
//! Noise is a xorshift32 generator.

use core::f32::consts::TAU;

use serde::{Deserialize, Serialize};

/// Oscillator waveform, as named in a sound bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Pure tone.
    #[default]
    Sine,
    /// Odd harmonics, soft.
    Triangle,
    /// All harmonics, bright.
    Saw,
    /// Odd harmonics, hollow.
    Square,
    /// White noise; frequency is ignored.
    Noise,
}

/// Phase-accumulator oscillator.
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f32,
    phase_inc: f32,
    waveform: Waveform,
    noise: u32,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(Waveform::Sine)
    }
}

impl Oscillator {
    /// Create an oscillator at phase 0 and zero frequency.
    pub fn new(waveform: Waveform) -> Self {
        Self {
            phase: 0.0,
            phase_inc: 0.0,
            waveform,
            noise: 0x9E37_79B9,
        }
    }

    /// Set waveform.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Current waveform.
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Set frequency; clamped below Nyquist.
    pub fn set_frequency(&mut self, freq_hz: f32, sample_rate: f32) {
        self.phase_inc = (freq_hz / sample_rate).clamp(0.0, 0.49);
    }

    /// Phase increment per sample.
    pub fn phase_increment(&self) -> f32 {
        self.phase_inc
    }

    /// Restart at phase 0; `seed` varies the noise sequence.
    pub fn restart(&mut self, seed: u32) {
        self.phase = 0.0;
        self.noise = seed | 1;
    }

    /// Produce one sample in `[-1, 1]` and advance.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let t = self.phase;
        let dt = self.phase_inc;
        let out = match self.waveform {
            Waveform::Sine => libm::sinf(t * TAU),
            Waveform::Triangle => 1.0 - 4.0 * libm::fabsf(t - 0.5),
            Waveform::Saw => 2.0 * t - 1.0 - poly_blep(t, dt),
            Waveform::Square => {
                let naive = if t < 0.5 { 1.0 } else { -1.0 };
                let falling = t + 0.5 - libm::floorf(t + 0.5);
                naive + poly_blep(t, dt) - poly_blep(falling, dt)
            }
            Waveform::Noise => self.next_noise(),
        };
        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }

    #[inline]
    fn next_noise(&mut self) -> f32 {
        let mut x = self.noise;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.noise = x;
        (x as i32 as f32) / (i32::MAX as f32)
    }
}

/// Two-sample polynomial band-limited step residual.
#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }
    if t < dt {
        let x = t / dt;
        x + x - x * x - 1.0
    } else if t > 1.0 - dt {
        let x = (t - 1.0) / dt;
        x * x + x + x + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(waveform: Waveform, freq: f32, samples: usize) -> Vec<f32> {
        let mut osc = Oscillator::new(waveform);
        osc.set_frequency(freq, 48000.0);
        (0..samples).map(|_| osc.next_sample()).collect()
    }

    #[test]
    fn outputs_stay_bounded() {
        for waveform in [
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Saw,
            Waveform::Square,
            Waveform::Noise,
        ] {
            for s in render(waveform, 1234.5, 4800) {
                assert!(s.is_finite() && s.abs() <= 1.01, "{waveform:?} produced {s}");
            }
        }
    }

    #[test]
    fn sine_starts_at_zero_and_peaks_at_quarter_period() {
        // 480 Hz at 48 kHz is 100 samples per cycle.
        let out = render(Waveform::Sine, 480.0, 100);
        assert!(out[0].abs() < 1e-6);
        assert!((out[25] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn saw_and_square_are_roughly_dc_free() {
        for waveform in [Waveform::Saw, Waveform::Square] {
            let out = render(waveform, 480.0, 4800);
            let mean: f32 = out.iter().sum::<f32>() / out.len() as f32;
            assert!(mean.abs() < 0.02, "{waveform:?} mean {mean}");
        }
    }

    #[test]
    fn frequency_clamps_below_nyquist() {
        let mut osc = Oscillator::new(Waveform::Saw);
        osc.set_frequency(100_000.0, 48000.0);
        assert!(osc.phase_increment() < 0.5);
    }

    #[test]
    fn waveform_names_deserialize_lowercase() {
        #[derive(Deserialize)]
        struct W {
            w: Waveform,
        }
        let parsed: W = toml::from_str("w = \"square\"").unwrap();
        assert_eq!(parsed.w, Waveform::Square);
    }
}
