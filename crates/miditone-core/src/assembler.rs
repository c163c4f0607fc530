//! Output buffer assembly for one sub-range.
//!
//! Every sample of every output channel in the sub-range is written exactly
//! once, whatever the mode: pass-through copy, de-interleaved synthesis,
//! or silence. In-place channels in pass-through mode are the one
//! exception, since input and output already hold the same samples.

use alloc::vec;
use alloc::vec::Vec;

use crate::engine::SynthEngine;
use crate::error::KernelError;
use crate::scheduler::SubRange;

/// Host buffer handle for one channel.
#[derive(Debug)]
pub enum ChannelPair<'a> {
    /// Input and output share storage.
    InPlace(&'a mut [f32]),
    /// Separate input and output buffers.
    InputOutput(&'a [f32], &'a mut [f32]),
    /// Output only (instrument with no input bus).
    OutputOnly(&'a mut [f32]),
}

/// Borrowed view of one channel handed out by [`AudioIo::channel_mut`].
#[derive(Debug)]
pub struct ChannelIo<'b> {
    /// Input samples when the channel has a separate input.
    pub input: Option<&'b [f32]>,
    /// Output samples.
    pub output: &'b mut [f32],
}

/// Host audio buffers as seen by the assembler.
pub trait AudioIo {
    /// Number of output channels.
    fn channel_count(&self) -> usize;

    /// Output buffer length of `channel` in frames.
    fn channel_len(&self, channel: usize) -> usize;

    /// True when `channel`'s input and output are the same storage.
    fn is_in_place(&self, channel: usize) -> bool;

    /// Mutable access to `channel`. Returns `None` if out of range.
    fn channel_mut(&mut self, channel: usize) -> Option<ChannelIo<'_>>;
}

impl AudioIo for [ChannelPair<'_>] {
    fn channel_count(&self) -> usize {
        self.len()
    }

    fn channel_len(&self, channel: usize) -> usize {
        match self.get(channel) {
            Some(ChannelPair::InPlace(buf) | ChannelPair::OutputOnly(buf)) => buf.len(),
            Some(ChannelPair::InputOutput(_, output)) => output.len(),
            None => 0,
        }
    }

    fn is_in_place(&self, channel: usize) -> bool {
        matches!(self.get(channel), Some(ChannelPair::InPlace(_)))
    }

    fn channel_mut(&mut self, channel: usize) -> Option<ChannelIo<'_>> {
        Some(match self.get_mut(channel)? {
            ChannelPair::InPlace(buf) | ChannelPair::OutputOnly(buf) => ChannelIo {
                input: None,
                output: &mut **buf,
            },
            ChannelPair::InputOutput(input, output) => ChannelIo {
                input: Some(*input),
                output: &mut **output,
            },
        })
    }
}

/// Output mode for a sub-range, fixed for a whole quantum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Copy input to output (bypass or mute).
    PassThrough,
    /// Decode from the engine.
    #[default]
    Synthesis,
    /// Write zeros without touching the engine (engine not prepared).
    Silence,
}

/// What [`RenderBufferAssembler::render_sub_range`] wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRangeOutcome {
    /// Input copied to output.
    PassedThrough,
    /// Engine audio written; `frames` short of the range were zero-padded.
    Synthesized {
        /// Frames the engine actually produced.
        frames: usize,
    },
    /// Decode failed; the range is silence.
    Underrun,
    /// Silence by request.
    Silenced,
}

/// Owns the interleaved decode scratch buffer and writes host outputs.
///
/// The scratch buffer is sized once in [`allocate`](Self::allocate) and
/// reused for every sub-range, so rendering never allocates.
#[derive(Debug, Default)]
pub struct RenderBufferAssembler {
    scratch: Vec<f32>,
    channel_count: usize,
    maximum_frames: u32,
}

impl RenderBufferAssembler {
    /// Create an unallocated assembler.
    pub const fn new() -> Self {
        Self {
            scratch: Vec::new(),
            channel_count: 0,
            maximum_frames: 0,
        }
    }

    /// Size the scratch buffer for `maximum_frames` × `channel_count`.
    pub fn allocate(&mut self, maximum_frames: u32, channel_count: usize) -> Result<(), KernelError> {
        if channel_count == 0 {
            return Err(KernelError::InvalidChannelCount(channel_count));
        }
        if maximum_frames == 0 {
            return Err(KernelError::InvalidMaximumFrames(maximum_frames));
        }
        self.scratch = vec![0.0; maximum_frames as usize * channel_count];
        self.channel_count = channel_count;
        self.maximum_frames = maximum_frames;
        Ok(())
    }

    /// Release the scratch buffer.
    pub fn deallocate(&mut self) {
        self.scratch = Vec::new();
        self.channel_count = 0;
        self.maximum_frames = 0;
    }

    /// True between `allocate` and `deallocate`.
    pub fn is_allocated(&self) -> bool {
        !self.scratch.is_empty()
    }

    /// Allocated channel count.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Allocated frame capacity.
    pub fn maximum_frames(&self) -> u32 {
        self.maximum_frames
    }

    /// Write `range` of every output channel according to `mode`.
    pub fn render_sub_range<E, A>(
        &mut self,
        range: SubRange,
        mode: RenderMode,
        engine: &mut E,
        io: &mut A,
    ) -> SubRangeOutcome
    where
        E: SynthEngine + ?Sized,
        A: AudioIo + ?Sized,
    {
        match mode {
            RenderMode::PassThrough => {
                pass_through(range, io);
                SubRangeOutcome::PassedThrough
            }
            RenderMode::Silence => {
                write_silence(range, io);
                SubRangeOutcome::Silenced
            }
            RenderMode::Synthesis => self.synthesize(range, engine, io),
        }
    }

    fn synthesize<E, A>(&mut self, range: SubRange, engine: &mut E, io: &mut A) -> SubRangeOutcome
    where
        E: SynthEngine + ?Sized,
        A: AudioIo + ?Sized,
    {
        let channels = self.channel_count.max(1);
        let len = range.len as usize;
        let Some(interleaved) = self.scratch.get_mut(..len * channels) else {
            write_silence(range, io);
            return SubRangeOutcome::Underrun;
        };

        let frames = match engine.decode(interleaved, channels) {
            Ok(frames) => frames.min(len),
            Err(_) => {
                write_silence(range, io);
                return SubRangeOutcome::Underrun;
            }
        };
        interleaved[frames * channels..].fill(0.0);

        let start = range.start as usize;
        for ch in 0..io.channel_count() {
            let Some(view) = io.channel_mut(ch) else {
                continue;
            };
            let Some(out) = view.output.get_mut(start..start + len) else {
                continue;
            };
            if ch < channels {
                for (dst, frame) in out.iter_mut().zip(interleaved.chunks_exact(channels)) {
                    *dst = frame[ch];
                }
            } else {
                out.fill(0.0);
            }
        }
        SubRangeOutcome::Synthesized { frames }
    }
}

fn pass_through<A: AudioIo + ?Sized>(range: SubRange, io: &mut A) {
    let start = range.start as usize;
    let end = range.end() as usize;
    for ch in 0..io.channel_count() {
        if io.is_in_place(ch) {
            continue;
        }
        let Some(view) = io.channel_mut(ch) else {
            continue;
        };
        let Some(out) = view.output.get_mut(start..end) else {
            continue;
        };
        match view.input {
            Some(input) => {
                let available = input.len().saturating_sub(start).min(out.len());
                out[..available].copy_from_slice(&input[start..start + available]);
                out[available..].fill(0.0);
            }
            None => out.fill(0.0),
        }
    }
}

fn write_silence<A: AudioIo + ?Sized>(range: SubRange, io: &mut A) {
    let start = range.start as usize;
    let end = range.end() as usize;
    for ch in 0..io.channel_count() {
        if let Some(view) = io.channel_mut(ch)
            && let Some(out) = view.output.get_mut(start..end)
        {
            out.fill(0.0);
        }
    }
}
