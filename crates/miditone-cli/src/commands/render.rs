//! Score rendering command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use miditone_core::{DEFAULT_MAXIMUM_FRAMES, KernelConfig, SynthKernel};
use miditone_synth::{BUILTIN_ASSET, FontSynth, Runtime};

use crate::host::render_offline;
use crate::score::Score;
use crate::wav;

#[derive(Args)]
pub struct RenderArgs {
    /// Score file (TOML)
    #[arg(value_name = "SCORE")]
    score: PathBuf,

    /// Output WAV file
    #[arg(short, long, value_name = "OUT")]
    output: PathBuf,

    /// Sound bank (TOML); overrides the score's bank
    #[arg(long, value_name = "PATH")]
    bank: Option<PathBuf>,

    /// Input WAV fed to the input bus (audible when muted or bypassed)
    #[arg(long, value_name = "IN")]
    input: Option<PathBuf>,

    /// Override instrument code (-1 = none, 0-127 program, 128-255 drum kit)
    #[arg(long, allow_hyphen_values = true)]
    instrument: Option<i32>,

    /// Transposition in semitones
    #[arg(long, allow_hyphen_values = true)]
    transpose: Option<i32>,

    /// Mute synthesis (input passes through)
    #[arg(long)]
    mute: bool,

    /// Bypass synthesis (input passes through)
    #[arg(long)]
    bypass: bool,

    /// Frames per render quantum; overrides the score
    #[arg(long)]
    block_size: Option<u32>,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let mut score = Score::load(&args.score)
        .with_context(|| format!("loading score '{}'", args.score.display()))?;
    if let Some(block_size) = args.block_size {
        score.block_size = block_size;
    }
    if let Some(instrument) = args.instrument {
        score.control.instrument = Some(instrument);
    }
    if let Some(transpose) = args.transpose {
        score.control.transposition = Some(transpose);
    }
    score.control.muted |= args.mute;
    score.control.bypassed |= args.bypass;
    score.validate()?;

    let asset = match (&args.bank, &score.bank) {
        (Some(path), _) => path.to_string_lossy().into_owned(),
        (None, Some(path)) => path.clone(),
        (None, None) => BUILTIN_ASSET.to_owned(),
    };

    let runtime = Runtime::acquire(score.sample_rate as f32)?;
    let mut kernel = SynthKernel::new(FontSynth::new(runtime));
    kernel.allocate_render_resources(KernelConfig {
        maximum_frames: DEFAULT_MAXIMUM_FRAMES,
        channel_count: usize::from(score.channels),
    })?;
    kernel
        .prepare(&asset)
        .with_context(|| format!("loading sound bank '{asset}'"))?;

    let params = kernel.parameters();
    if let Some(instrument) = score.control.instrument {
        params.set_override_instrument(instrument);
    }
    if let Some(transposition) = score.control.transposition {
        params.set_transposition(transposition);
    }
    params.set_muted(score.control.muted);
    params.set_bypassed(score.control.bypassed);

    let input = match &args.input {
        Some(path) => {
            let (channels, rate) = wav::read_channels(path, usize::from(score.channels))?;
            if rate != score.sample_rate {
                tracing::warn!(
                    input_rate = rate,
                    score_rate = score.sample_rate,
                    "input sample rate differs from score, not resampling"
                );
            }
            Some(channels)
        }
        None => None,
    };

    let timeline = score.timeline()?;
    let total_frames = score.total_frames();
    tracing::info!(
        events = timeline.len(),
        frames = total_frames,
        block_size = score.block_size,
        "rendering score"
    );

    let (output, summary) = render_offline(
        &mut kernel,
        &timeline,
        total_frames,
        score.block_size,
        input.as_deref(),
    )?;
    kernel.deallocate_render_resources();

    wav::write_channels(&args.output, &output, score.sample_rate)?;

    let diagnostics = kernel.diagnostics().snapshot();
    println!(
        "Rendered {} frames ({:.2} s) in {} quanta to {}",
        summary.frames,
        summary.frames as f64 / f64::from(score.sample_rate),
        summary.quanta,
        args.output.display()
    );
    if diagnostics.clamped_events > 0 || diagnostics.deferred_events > 0 {
        println!(
            "  {} clamped, {} deferred events",
            diagnostics.clamped_events, diagnostics.deferred_events
        );
    }
    if summary.dropped_messages > 0 {
        println!("  {} malformed MIDI messages dropped", summary.dropped_messages);
    }
    if summary.engine_failures > 0 || summary.underruns > 0 {
        println!(
            "  {} engine command failures, {} underruns",
            summary.engine_failures, summary.underruns
        );
    }
    Ok(())
}
