//! The render kernel: host-facing entry point composing every component.
//!
//! ## Render Call
//!
//! ```text
//! validate quantum and buffers
//!   -> snapshot parameters, consume pending commands
//!   -> issue select_instrument / set_transposition if pending
//!   -> run_quantum: dispatch events (translator, parameter changes)
//!                   render sub-ranges (assembler)
//!   -> fold counters into diagnostics
//! ```
//!
//! The output mode (pass-through, synthesis, silence) is chosen once from
//! the snapshot and holds for the whole quantum, so a mute flip cannot
//! split a quantum into mismatched halves.

use alloc::sync::Arc;

use crate::assembler::{AudioIo, RenderBufferAssembler, RenderMode, SubRangeOutcome};
use crate::diagnostics::KernelDiagnostics;
use crate::engine::SynthEngine;
use crate::error::{EngineError, KernelError, RenderError};
use crate::event::{
    DEFAULT_MAXIMUM_FRAMES, EventKind, EventRecord, MidiMessage, NO_OVERRIDE, ParamAddress,
    RenderQuantum,
};
use crate::params::{ParameterState, integral_value};
use crate::scheduler::{QuantumHandler, QuantumReport, SubRange, run_quantum};
use crate::translator::{MidiTranslator, Translation};

/// Render resource configuration, applied by
/// [`SynthKernel::allocate_render_resources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Largest quantum the host may request.
    pub maximum_frames: u32,
    /// Output channel count.
    pub channel_count: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            maximum_frames: DEFAULT_MAXIMUM_FRAMES,
            channel_count: 2,
        }
    }
}

impl KernelConfig {
    /// Config with `channel_count` channels and the default maximum.
    pub const fn with_channels(channel_count: usize) -> Self {
        Self {
            maximum_frames: DEFAULT_MAXIMUM_FRAMES,
            channel_count,
        }
    }
}

/// Optional MIDI-output tap.
///
/// Receives every MIDI event the kernel handles, verbatim, at its
/// effective offset. The kernel originates no MIDI of its own.
pub trait MidiOutput {
    /// Forward `message` at frame `offset` of the current quantum.
    fn send(&mut self, offset: u32, message: &MidiMessage);
}

/// Summary of one successful render call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    /// Frames rendered.
    pub frames: u32,
    /// Output mode used for the whole quantum.
    pub mode: RenderMode,
    /// Scheduler bookkeeping.
    pub schedule: QuantumReport,
    /// Sub-ranges replaced by silence after a decode failure.
    pub underruns: u32,
    /// Frames the engine produced across all sub-ranges.
    pub synthesized_frames: usize,
    /// Malformed MIDI messages dropped.
    pub dropped_messages: u32,
    /// Engine commands that returned an error.
    pub engine_failures: u32,
}

/// Real-time render kernel driving a [`SynthEngine`].
///
/// Owns the engine exclusively. Control-context code talks to it only
/// through the shared [`ParameterState`] and reads [`KernelDiagnostics`];
/// `prepare` takes `&mut self` and so cannot overlap a render call.
///
/// # Example
///
/// ```rust
/// use miditone_core::{
///     ChannelPair, EventRecord, KernelConfig, MidiMessage, NullEngine, RenderQuantum,
///     SynthKernel,
/// };
///
/// let mut kernel = SynthKernel::new(NullEngine);
/// kernel.allocate_render_resources(KernelConfig::default()).unwrap();
/// kernel.prepare("bank").unwrap();
///
/// let mut left = vec![0.0f32; 256];
/// let mut right = vec![0.0f32; 256];
/// let mut io = [ChannelPair::OutputOnly(&mut left), ChannelPair::OutputOnly(&mut right)];
///
/// let events = [EventRecord::midi(100, MidiMessage::note_on(9, 36, 100))];
/// let report = kernel
///     .render(&RenderQuantum::new(256, 2), &events, &mut io[..], None)
///     .unwrap();
/// assert_eq!(report.schedule.sub_ranges, 2);
/// ```
pub struct SynthKernel<E: SynthEngine> {
    engine: E,
    params: Arc<ParameterState>,
    diagnostics: Arc<KernelDiagnostics>,
    assembler: RenderBufferAssembler,
    config: KernelConfig,
    prepared: bool,
}

impl<E: SynthEngine> core::fmt::Debug for SynthKernel<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SynthKernel")
            .field("config", &self.config)
            .field("allocated", &self.is_allocated())
            .field("prepared", &self.prepared)
            .field("params", &self.params.snapshot())
            .finish_non_exhaustive()
    }
}

impl<E: SynthEngine> SynthKernel<E> {
    /// Create a kernel with fresh parameter state.
    pub fn new(engine: E) -> Self {
        Self::with_parameters(engine, Arc::new(ParameterState::new()))
    }

    /// Create a kernel sharing an existing parameter state.
    pub fn with_parameters(engine: E, params: Arc<ParameterState>) -> Self {
        Self {
            engine,
            params,
            diagnostics: Arc::new(KernelDiagnostics::new()),
            assembler: RenderBufferAssembler::new(),
            config: KernelConfig::default(),
            prepared: false,
        }
    }

    // -- lifecycle ---------------------------------------------------------

    /// Allocate the decode scratch buffer; brackets a sequence of render calls.
    pub fn allocate_render_resources(&mut self, config: KernelConfig) -> Result<(), KernelError> {
        if self.assembler.is_allocated() {
            return Err(KernelError::ResourcesAllocated);
        }
        self.assembler
            .allocate(config.maximum_frames, config.channel_count)?;
        self.config = config;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            maximum_frames = config.maximum_frames,
            channel_count = config.channel_count,
            "render resources allocated"
        );
        Ok(())
    }

    /// Release render resources. Render calls fail until reallocated.
    pub fn deallocate_render_resources(&mut self) {
        self.assembler.deallocate();
        #[cfg(feature = "tracing")]
        tracing::debug!("render resources deallocated");
    }

    /// True between allocate and deallocate.
    pub fn is_allocated(&self) -> bool {
        self.assembler.is_allocated()
    }

    /// Largest quantum accepted by `render`.
    pub fn maximum_frames_to_render(&self) -> u32 {
        self.config.maximum_frames
    }

    /// Change the maximum quantum; only while deallocated.
    pub fn set_maximum_frames_to_render(&mut self, maximum_frames: u32) -> Result<(), KernelError> {
        if self.is_allocated() {
            return Err(KernelError::ResourcesAllocated);
        }
        if maximum_frames == 0 {
            return Err(KernelError::InvalidMaximumFrames(maximum_frames));
        }
        self.config.maximum_frames = maximum_frames;
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> KernelConfig {
        self.config
    }

    /// Load a sound bank into the engine.
    ///
    /// On success the current override instrument and transposition are
    /// armed again, so values set before the bank finished loading are
    /// applied at the next quantum. A failed load leaves any previous
    /// preparation in effect.
    pub fn prepare(&mut self, asset_path: &str) -> Result<(), E::PrepareError> {
        match self.engine.prepare(asset_path) {
            Ok(()) => {
                self.prepared = true;
                self.params.rearm();
                #[cfg(feature = "tracing")]
                tracing::info!(asset_path, "engine prepared");
                Ok(())
            }
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(asset_path, %err, "engine preparation failed");
                Err(err)
            }
        }
    }

    /// True once any `prepare` call has succeeded.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Silence the engine; parameters are re-sent at the next quantum.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.params.rearm();
    }

    // -- accessors -----------------------------------------------------------

    /// Shared parameter state, for the control context.
    pub fn parameters(&self) -> &Arc<ParameterState> {
        &self.params
    }

    /// Shared diagnostic counters.
    pub fn diagnostics(&self) -> &Arc<KernelDiagnostics> {
        &self.diagnostics
    }

    /// The engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The engine, mutably.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Consume the kernel, returning the engine.
    pub fn into_engine(self) -> E {
        self.engine
    }

    // -- render --------------------------------------------------------------

    fn validate<A: AudioIo + ?Sized>(&self, quantum: &RenderQuantum, io: &A) -> Result<(), RenderError> {
        if !self.assembler.is_allocated() {
            return Err(RenderError::NotAllocated);
        }
        let maximum = self.assembler.maximum_frames();
        if quantum.frame_count > maximum {
            return Err(RenderError::TooManyFrames {
                requested: quantum.frame_count,
                maximum,
            });
        }
        let expected = self.assembler.channel_count();
        for actual in [quantum.channel_count, io.channel_count()] {
            if actual != expected {
                return Err(RenderError::ChannelMismatch { expected, actual });
            }
        }
        let required = quantum.frame_count as usize;
        for channel in 0..expected {
            let len = io.channel_len(channel);
            if len < required {
                return Err(RenderError::BufferTooSmall {
                    channel,
                    len,
                    required,
                });
            }
        }
        Ok(())
    }

    /// Render one quantum into `io`, applying `events` sample-accurately.
    ///
    /// Never panics and never allocates. Host contract violations in the
    /// event list are clamped and counted; only unusable buffers or an
    /// unallocated kernel fail the call.
    pub fn render<A: AudioIo + ?Sized>(
        &mut self,
        quantum: &RenderQuantum,
        events: &[EventRecord],
        io: &mut A,
        midi_out: Option<&mut dyn MidiOutput>,
    ) -> Result<RenderReport, RenderError> {
        self.validate(quantum, io)?;

        let (snapshot, pending) = self.params.take_snapshot();
        let mut engine_failures = 0u32;
        if pending.instrument && snapshot.override_instrument != NO_OVERRIDE {
            let result = self.engine.select_instrument(snapshot.override_instrument);
            engine_failures += failed(result, "select_instrument");
        }
        if pending.transposition {
            let result = self.engine.set_transposition(snapshot.transposition);
            engine_failures += failed(result, "set_transposition");
        }

        let mode = if snapshot.passes_through() {
            RenderMode::PassThrough
        } else if self.prepared {
            RenderMode::Synthesis
        } else {
            RenderMode::Silence
        };

        let mut ctx = QuantumContext {
            engine: &mut self.engine,
            assembler: &mut self.assembler,
            params: &self.params,
            io,
            midi_out,
            translator: MidiTranslator::new(snapshot.suppresses_program_change()),
            mode,
            underruns: 0,
            synthesized_frames: 0,
            dropped_messages: 0,
            engine_failures,
        };
        let schedule = run_quantum(quantum.frame_count, events, &mut ctx);
        let engine_failures = ctx.engine_failures + ctx.translator.take_engine_failures();

        let report = RenderReport {
            frames: quantum.frame_count,
            mode,
            schedule,
            underruns: ctx.underruns,
            synthesized_frames: ctx.synthesized_frames,
            dropped_messages: ctx.dropped_messages,
            engine_failures,
        };

        #[cfg(feature = "tracing")]
        if report.underruns > 0 {
            tracing::warn!(
                underruns = report.underruns,
                sample_time = quantum.sample_time,
                "engine underrun, rendered silence"
            );
        }

        self.diagnostics.quantum_done(&report);
        Ok(report)
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn failed(result: Result<(), EngineError>, command: &'static str) -> u32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(command, %err, "engine command failed");
            1
        }
    }
}

/// Per-call state threaded through the scheduler.
struct QuantumContext<'a, 'm, E: SynthEngine, A: AudioIo + ?Sized> {
    engine: &'a mut E,
    assembler: &'a mut RenderBufferAssembler,
    params: &'a ParameterState,
    io: &'a mut A,
    midi_out: Option<&'a mut (dyn MidiOutput + 'm)>,
    translator: MidiTranslator,
    mode: RenderMode,
    underruns: u32,
    synthesized_frames: usize,
    dropped_messages: u32,
    engine_failures: u32,
}

impl<E: SynthEngine, A: AudioIo + ?Sized> QuantumContext<'_, '_, E, A> {
    fn apply_parameter(&mut self, raw_address: u64, value: f32) {
        let Some(address) = ParamAddress::from_raw(raw_address) else {
            return;
        };
        self.params.store_from_render(address, value);
        match address {
            ParamAddress::Instrument => {
                let code = integral_value(value);
                self.translator
                    .set_suppress_program_change(code != NO_OVERRIDE);
                if code != NO_OVERRIDE {
                    let result = self.engine.select_instrument(code);
                    self.engine_failures += failed(result, "select_instrument");
                }
            }
            ParamAddress::Transposition => {
                let result = self.engine.set_transposition(integral_value(value));
                self.engine_failures += failed(result, "set_transposition");
            }
            // Output mode is fixed per quantum; picked up at the next one.
            ParamAddress::Mute | ParamAddress::Bypass => {}
        }
    }
}

impl<E: SynthEngine, A: AudioIo + ?Sized> QuantumHandler for QuantumContext<'_, '_, E, A> {
    fn dispatch(&mut self, offset: u32, event: &EventRecord) {
        match event.kind {
            EventKind::Midi(message) => {
                if let Some(out) = self.midi_out.as_mut() {
                    out.send(offset, &message);
                }
                if self.translator.translate_message(&mut *self.engine, &message) == Translation::Dropped {
                    self.dropped_messages += 1;
                }
            }
            EventKind::Parameter { address, value } => self.apply_parameter(address, value),
            EventKind::ParameterRamp {
                address, end_value, ..
            } => self.apply_parameter(address, end_value),
            EventKind::Other => {}
        }
    }

    fn render(&mut self, range: SubRange) {
        match self
            .assembler
            .render_sub_range(range, self.mode, &mut *self.engine, &mut *self.io)
        {
            SubRangeOutcome::Underrun => self.underruns += 1,
            SubRangeOutcome::Synthesized { frames } => self.synthesized_frames += frames,
            SubRangeOutcome::PassedThrough | SubRangeOutcome::Silenced => {}
        }
    }
}
