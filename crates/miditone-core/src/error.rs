//! Error types for the render kernel.
//!
//! None of these ever cross the render boundary as a panic: lifecycle
//! misuse surfaces as [`KernelError`], a rejected render call as
//! [`RenderError`], and engine command results as [`EngineError`].

/// Lifecycle and configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Channel count must be at least 1.
    InvalidChannelCount(usize),
    /// Maximum frames per quantum must be at least 1.
    InvalidMaximumFrames(u32),
    /// Render resources must be deallocated before reconfiguring.
    ResourcesAllocated,
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidChannelCount(n) => write!(f, "invalid channel count {n}"),
            Self::InvalidMaximumFrames(n) => write!(f, "invalid maximum frames to render {n}"),
            Self::ResourcesAllocated => write!(f, "render resources are already allocated"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KernelError {}

/// Definite failure status returned to the host from a render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    /// `render` was called outside an allocate/deallocate bracket.
    NotAllocated,
    /// The quantum exceeds the configured maximum.
    TooManyFrames {
        /// Frames the host asked for.
        requested: u32,
        /// Configured maximum.
        maximum: u32,
    },
    /// The quantum or buffers do not match the allocated channel layout.
    ChannelMismatch {
        /// Allocated channel count.
        expected: usize,
        /// Channel count supplied by the host.
        actual: usize,
    },
    /// A host buffer is shorter than the quantum.
    BufferTooSmall {
        /// Offending channel.
        channel: usize,
        /// Buffer length in frames.
        len: usize,
        /// Frames required.
        required: usize,
    },
}

impl core::fmt::Display for RenderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotAllocated => write!(f, "render resources not allocated"),
            Self::TooManyFrames { requested, maximum } => {
                write!(f, "quantum of {requested} frames exceeds maximum {maximum}")
            }
            Self::ChannelMismatch { expected, actual } => {
                write!(f, "expected {expected} channels, got {actual}")
            }
            Self::BufferTooSmall {
                channel,
                len,
                required,
            } => write!(
                f,
                "channel {channel} buffer holds {len} frames, {required} required"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RenderError {}

/// Result of a command sent to the synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The engine has no sound bank loaded.
    NotPrepared,
    /// The engine refused the command (e.g. unknown instrument code).
    Rejected,
    /// No audio is available for the requested frames.
    Underrun,
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotPrepared => write!(f, "engine not prepared"),
            Self::Rejected => write!(f, "engine rejected the command"),
            Self::Underrun => write!(f, "engine produced no audio"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EngineError {}
