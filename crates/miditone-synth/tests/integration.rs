//! Integration tests for miditone-synth.
//!
//! Runs `FontSynth` behind the core render kernel and checks that the
//! drum-channel rule, the instrument override, transposition and sound
//! bank loading behave as a host would observe them.

use std::io::Write;

use miditone_core::{
    ChannelPair, EventRecord, KernelConfig, MidiMessage, ParamAddress, RenderMode, RenderQuantum,
    SynthKernel,
};
use miditone_synth::{BUILTIN_ASSET, BankError, FontSynth, Runtime};
use tempfile::NamedTempFile;

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK: u32 = 256;

fn kernel() -> SynthKernel<FontSynth> {
    let runtime = Runtime::acquire(SAMPLE_RATE).unwrap();
    let mut kernel = SynthKernel::new(FontSynth::new(runtime));
    kernel
        .allocate_render_resources(KernelConfig::default())
        .unwrap();
    kernel.prepare(BUILTIN_ASSET).unwrap();
    kernel
}

fn render(kernel: &mut SynthKernel<FontSynth>, events: &[EventRecord]) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0f32; BLOCK as usize];
    let mut right = vec![0.0f32; BLOCK as usize];
    {
        let mut io = [
            ChannelPair::OutputOnly(&mut left),
            ChannelPair::OutputOnly(&mut right),
        ];
        kernel
            .render(&RenderQuantum::new(BLOCK, 2), events, &mut io[..], None)
            .unwrap();
    }
    (left, right)
}

fn energy(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s * s).sum()
}

// ============================================================================
// Drum channel and override
// ============================================================================

#[test]
fn note_on_channel_nine_plays_drums() {
    let mut kernel = kernel();
    let (left, _) = render(
        &mut kernel,
        &[EventRecord::midi(0, MidiMessage::note_on(9, 36, 120))],
    );
    assert!(energy(&left) > 0.0);
    assert!(kernel.engine().channel(9).unwrap().is_drum);
}

#[test]
fn program_change_on_drum_channel_keeps_drum_mode() {
    let mut kernel = kernel();
    render(
        &mut kernel,
        &[
            EventRecord::midi(0, MidiMessage::program_change(9, 25)),
            EventRecord::midi(10, MidiMessage::note_on(9, 36, 100)),
        ],
    );
    let drums = kernel.engine().channel(9).unwrap();
    assert!(drums.is_drum);
    assert_eq!(drums.kit, 25);
}

#[test]
fn override_instrument_wins_over_program_changes() {
    let mut kernel = kernel();
    kernel.parameters().set_override_instrument(48);
    render(
        &mut kernel,
        &[EventRecord::midi(0, MidiMessage::program_change(0, 80))],
    );
    assert_eq!(kernel.engine().channel(0).unwrap().program, 48);

    kernel.parameters().set_override_instrument(-1);
    render(
        &mut kernel,
        &[EventRecord::midi(0, MidiMessage::program_change(0, 80))],
    );
    assert_eq!(kernel.engine().channel(0).unwrap().program, 80);
}

#[test]
fn drum_override_puts_every_channel_on_a_kit() {
    let mut kernel = kernel();
    kernel.parameters().set_override_instrument(128 + 25);
    render(&mut kernel, &[]);
    for channel in 0..16 {
        let state = kernel.engine().channel(channel).unwrap();
        assert!(state.is_drum && state.kit == 25, "channel {channel}");
    }
}

#[test]
fn override_set_before_prepare_applies_after_it() {
    let runtime = Runtime::acquire(SAMPLE_RATE).unwrap();
    let mut kernel = SynthKernel::new(FontSynth::new(runtime));
    kernel
        .allocate_render_resources(KernelConfig::default())
        .unwrap();
    kernel.parameters().set_override_instrument(32);
    render(&mut kernel, &[]);
    kernel.prepare(BUILTIN_ASSET).unwrap();
    render(&mut kernel, &[]);
    assert_eq!(kernel.engine().channel(0).unwrap().program, 32);
}

// ============================================================================
// Transposition and parameters
// ============================================================================

#[test]
fn control_path_transposition_reaches_engine() {
    let mut kernel = kernel();
    kernel.parameters().set_transposition(-7);
    render(&mut kernel, &[]);
    assert_eq!(kernel.engine().transposition(), -7);
}

#[test]
fn in_stream_transposition_applies_before_later_notes() {
    let mut kernel = kernel();
    render(
        &mut kernel,
        &[
            EventRecord::parameter(0, ParamAddress::Transposition, 12.0),
            EventRecord::midi(64, MidiMessage::note_on(0, 60, 100)),
        ],
    );
    assert_eq!(kernel.engine().transposition(), 12);
    assert_eq!(kernel.parameters().transposition(), 12);
}

#[test]
fn bypass_passes_input_through_unchanged() {
    let mut kernel = kernel();
    kernel.parameters().set_bypassed(true);
    let input: Vec<f32> = (0..BLOCK).map(|i| i as f32 / BLOCK as f32).collect();
    let mut left = vec![0.0f32; BLOCK as usize];
    let mut right = vec![0.0f32; BLOCK as usize];
    let report = {
        let mut io = [
            ChannelPair::InputOutput(&input, &mut left),
            ChannelPair::InputOutput(&input, &mut right),
        ];
        kernel
            .render(
                &RenderQuantum::new(BLOCK, 2),
                &[EventRecord::midi(0, MidiMessage::note_on(0, 60, 100))],
                &mut io[..],
                None,
            )
            .unwrap()
    };
    assert_eq!(report.mode, RenderMode::PassThrough);
    assert_eq!(left, input);
    assert_eq!(right, input);
    // MIDI is still consumed while bypassed.
    assert_eq!(kernel.engine().active_voices(), 1);
}

// ============================================================================
// Sound banks
// ============================================================================

#[test]
fn prepare_loads_bank_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
name = "Test Bank"

[[patches]]
program = 0
name = "Beep"
waveform = "square"
sustain = 1.0
"#
    )
    .unwrap();

    let runtime = Runtime::acquire(SAMPLE_RATE).unwrap();
    let mut kernel = SynthKernel::new(FontSynth::new(runtime));
    kernel
        .allocate_render_resources(KernelConfig::default())
        .unwrap();
    kernel.prepare(file.path().to_str().unwrap()).unwrap();
    assert_eq!(kernel.engine().bank().unwrap().name, "Test Bank");

    let (left, _) = render(
        &mut kernel,
        &[EventRecord::midi(0, MidiMessage::note_on(0, 69, 127))],
    );
    assert!(energy(&left) > 0.0);
}

#[test]
fn failed_prepare_leaves_kernel_silent() {
    let runtime = Runtime::acquire(SAMPLE_RATE).unwrap();
    let mut kernel = SynthKernel::new(FontSynth::new(runtime));
    kernel
        .allocate_render_resources(KernelConfig::default())
        .unwrap();

    let err = kernel.prepare("/nonexistent/bank.toml").unwrap_err();
    assert!(matches!(err, BankError::ReadFile { .. }));
    assert!(!kernel.is_prepared());

    let (left, right) = render(
        &mut kernel,
        &[EventRecord::midi(0, MidiMessage::note_on(0, 60, 100))],
    );
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
}

#[test]
fn invalid_bank_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "name = \"Empty\"").unwrap();

    let runtime = Runtime::acquire(SAMPLE_RATE).unwrap();
    let mut kernel = SynthKernel::new(FontSynth::new(runtime));
    let err = kernel.prepare(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, BankError::NoPatches(_)));
}

// ============================================================================
// Offsets
// ============================================================================

#[test]
fn note_starts_at_its_offset() {
    let mut kernel = kernel();
    let (left, _) = render(
        &mut kernel,
        &[EventRecord::midi(100, MidiMessage::note_on(0, 60, 127))],
    );
    assert!(left[..100].iter().all(|&s| s == 0.0));
    assert!(energy(&left[100..]) > 0.0);
}

#[test]
fn reset_silences_sounding_notes() {
    let mut kernel = kernel();
    render(
        &mut kernel,
        &[EventRecord::midi(0, MidiMessage::note_on(0, 60, 127))],
    );
    kernel.reset();
    let (left, right) = render(&mut kernel, &[]);
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
}
