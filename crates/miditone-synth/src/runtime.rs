//! Process-wide engine runtime.
//!
//! The engine needs one piece of process-global setup: the output sample
//! rate and the tables derived from it. [`Runtime`] models that as explicit
//! shared state with an init-once / teardown-once lifecycle:
//!
//! - the first [`Runtime::acquire`] initializes it,
//! - later acquires at the same rate share the live instance,
//! - an acquire at a different rate fails while any handle is alive,
//! - teardown runs when the last handle drops.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::error::RuntimeError;

static CURRENT: Mutex<Weak<Runtime>> = Mutex::new(Weak::new());

/// Shared engine state for one sample rate.
#[derive(Debug)]
pub struct Runtime {
    sample_rate: f32,
    note_hz: [f32; 128],
}

impl Runtime {
    /// Acquire the process-wide runtime at `sample_rate`.
    pub fn acquire(sample_rate: f32) -> Result<Arc<Self>, RuntimeError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(RuntimeError::InvalidSampleRate(sample_rate));
        }

        let mut current = CURRENT.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(live) = current.upgrade() {
            if live.sample_rate != sample_rate {
                return Err(RuntimeError::SampleRateConflict {
                    active: live.sample_rate,
                    requested: sample_rate,
                });
            }
            return Ok(live);
        }

        let runtime = Arc::new(Self {
            sample_rate,
            note_hz: core::array::from_fn(|note| midi_to_freq(note as f32)),
        });
        *current = Arc::downgrade(&runtime);
        tracing::info!(sample_rate, "engine runtime initialized");
        Ok(runtime)
    }

    /// True while any handle to the runtime is alive.
    pub fn is_active() -> bool {
        CURRENT
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .strong_count()
            > 0
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Equal-tempered frequency of MIDI note `note` (A4 = 69 = 440 Hz).
    #[inline]
    pub fn note_frequency(&self, note: u8) -> f32 {
        self.note_hz[usize::from(note.min(127))]
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        tracing::info!(sample_rate = self.sample_rate, "engine runtime torn down");
    }
}

/// Convert a (fractional) MIDI note number to Hz.
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * libm::exp2f((note - 69.0) / 12.0)
}

/// Convert cents to a frequency ratio (100 cents = 1 semitone).
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    libm::exp2f(cents / 1200.0)
}
