//! Sound-bank synthesizer for the miditone render kernel.
//!
//! [`FontSynth`] implements [`miditone_core::SynthEngine`]: sixteen MIDI
//! channels with full controller state, a fixed pool of band-limited
//! voices, and melodic patches plus drum kits loaded from a TOML
//! [`SoundBank`].
//!
//! ## Modules
//!
//! - [`runtime`] - Process-wide engine runtime (sample rate, note table)
//! - [`bank`] - Sound bank format, validation and lookup
//! - [`engine`] - The [`FontSynth`] engine
//! - [`channel`] - Per-channel controller state
//! - [`voice`] - Voices and oldest-note stealing
//! - [`oscillator`] - PolyBLEP oscillators and noise
//! - [`envelope`] - ADSR and percussive envelopes
//!
//! ## Example
//!
//! ```rust
//! use miditone_core::{
//!     ChannelPair, EventRecord, KernelConfig, MidiMessage, RenderQuantum, SynthKernel,
//! };
//! use miditone_synth::{BUILTIN_ASSET, FontSynth, Runtime};
//!
//! let runtime = Runtime::acquire(48000.0).unwrap();
//! let mut kernel = SynthKernel::new(FontSynth::new(runtime));
//! kernel.allocate_render_resources(KernelConfig::default()).unwrap();
//! kernel.prepare(BUILTIN_ASSET).unwrap();
//!
//! let events = [EventRecord::midi(0, MidiMessage::note_on(0, 60, 100))];
//! let mut left = vec![0.0f32; 512];
//! let mut right = vec![0.0f32; 512];
//! let mut io = [ChannelPair::OutputOnly(&mut left), ChannelPair::OutputOnly(&mut right)];
//! kernel
//!     .render(&RenderQuantum::new(512, 2), &events, &mut io[..], None)
//!     .unwrap();
//! assert!(left.iter().any(|&s| s != 0.0));
//! ```

pub mod bank;
pub mod channel;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod oscillator;
pub mod runtime;
pub mod voice;

pub use bank::{DrumPiece, Kit, Patch, SoundBank};
pub use channel::{BEND_RANGE_SEMITONES, ChannelState};
pub use engine::{BUILTIN_ASSET, CHANNELS, FontSynth, MAX_TRANSPOSITION};
pub use envelope::{Envelope, EnvelopeShape, Stage};
pub use error::{BankError, RuntimeError};
pub use oscillator::{Oscillator, Waveform};
pub use runtime::{Runtime, cents_to_ratio, midi_to_freq};
pub use voice::{POOL_SIZE, Voice, VoicePool, VoiceStart};
