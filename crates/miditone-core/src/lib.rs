//! Miditone Core - real-time MIDI render kernel
//!
//! Turns a host-delivered, time-stamped event list into synthesized PCM,
//! sample-accurately, inside a real-time render callback. The synthesizer
//! itself is an external collaborator behind the [`SynthEngine`] trait.
//!
//! # Components
//!
//! - [`run_quantum`] - Event scheduler: splits a quantum at event offsets
//! - [`MidiTranslator`] - MIDI to engine commands, drum channel and
//!   program-change override policy
//! - [`RenderBufferAssembler`] - pass-through, synthesis and underrun
//!   silence into host buffers
//! - [`ParameterState`] - lock-free instrument/transposition/mute/bypass
//! - [`KernelDiagnostics`] - counters for non-fatal render-path conditions
//! - [`SynthKernel`] - the composition, with allocate/render/deallocate
//!   lifecycle hooks
//!
//! # Real-Time Guarantees
//!
//! `SynthKernel::render` never allocates, never locks and never panics.
//! The decode scratch buffer is sized once by
//! [`SynthKernel::allocate_render_resources`]. Parameters cross from the
//! control context through a single atomic word.
//!
//! # no_std Support
//!
//! Disable the default `std` feature for embedded targets (`alloc` is
//! still required):
//!
//! ```toml
//! [dependencies]
//! miditone-core = { version = "0.1", default-features = false }
//! ```
//!
//! Enable the `tracing` feature to log lifecycle events, engine command
//! failures and underruns.
//!
//! # Example
//!
//! ```rust
//! use miditone_core::{
//!     ChannelPair, EventRecord, KernelConfig, MidiMessage, NullEngine, RenderMode,
//!     RenderQuantum, SynthKernel,
//! };
//!
//! let mut kernel = SynthKernel::new(NullEngine);
//! kernel.allocate_render_resources(KernelConfig::with_channels(1)).unwrap();
//! kernel.prepare("").unwrap();
//!
//! // Control context: pin instrument 12. Host program changes are now ignored.
//! kernel.parameters().set_override_instrument(12);
//!
//! let mut out = vec![0.0f32; 128];
//! let mut io = [ChannelPair::OutputOnly(&mut out)];
//! let events = [
//!     EventRecord::midi(0, MidiMessage::program_change(0, 40)),
//!     EventRecord::midi(32, MidiMessage::note_on(0, 60, 100)),
//! ];
//! let report = kernel
//!     .render(&RenderQuantum::new(128, 1), &events, &mut io[..], None)
//!     .unwrap();
//! assert_eq!(report.mode, RenderMode::Synthesis);
//! assert_eq!(report.schedule.dispatched, 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod assembler;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod event;
pub mod kernel;
pub mod params;
pub mod scheduler;
pub mod translator;

pub use assembler::{
    AudioIo, ChannelIo, ChannelPair, RenderBufferAssembler, RenderMode, SubRangeOutcome,
};
pub use diagnostics::{DiagnosticsSnapshot, KernelDiagnostics};
pub use engine::{NullEngine, SynthEngine};
pub use error::{EngineError, KernelError, RenderError};
pub use event::{
    ChannelMessage, DEFAULT_MAXIMUM_FRAMES, DRUM_CHANNEL, EventKind, EventRecord, MidiMessage,
    NO_OVERRIDE, ParamAddress, RenderQuantum,
};
pub use kernel::{KernelConfig, MidiOutput, RenderReport, SynthKernel};
pub use params::{ParamSnapshot, ParameterState, PendingCommands};
pub use scheduler::{QuantumHandler, QuantumReport, SubRange, run_quantum};
pub use translator::{MidiTranslator, Translation};
