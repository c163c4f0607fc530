//! Integration tests for miditone-cli.
//!
//! Runs the built `miditone` binary against scores and banks written to a
//! temporary directory and inspects its output files.

use std::path::Path;
use std::process::Command;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tempfile::TempDir;

/// Helper to get the path to the `miditone` binary built by cargo.
fn miditone_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_miditone"))
}

const SCORE: &str = r#"
sample_rate = 48000
block_size = 256
tail_seconds = 0.25

[[events]]
type = "note_on"
time = 0.0
channel = 0
note = 60
velocity = 110

[[events]]
type = "note_on"
time = 0.1
channel = 9
note = 36

[[events]]
type = "note_off"
time = 0.5
channel = 0
note = 60
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn read_wav(path: &Path) -> (WavSpec, Vec<f32>) {
    let reader = WavReader::open(path).unwrap();
    let spec = reader.spec();
    let samples = reader.into_samples::<f32>().map(Result::unwrap).collect();
    (spec, samples)
}

// ---------------------------------------------------------------------------
// `miditone render`
// ---------------------------------------------------------------------------

#[test]
fn render_writes_float_wav_of_score_length() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "song.toml", SCORE);
    let out = dir.path().join("song.wav");

    let output = miditone_bin()
        .args(["render", score.to_str().unwrap(), "-o", out.to_str().unwrap()])
        .output()
        .expect("failed to run miditone render");
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let (spec, samples) = read_wav(&out);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.bits_per_sample, 32);
    assert_eq!(spec.sample_format, SampleFormat::Float);
    // 0.5 s of events plus 0.25 s tail.
    assert_eq!(samples.len(), 36000 * 2);
    assert!(samples.iter().any(|&s| s != 0.0));
    assert!(samples.iter().all(|s| s.is_finite()));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Rendered 36000 frames"));
}

#[test]
fn render_bypass_passes_input_through() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "song.toml", SCORE);
    let input = dir.path().join("in.wav");
    let out = dir.path().join("out.wav");

    let spec = WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&input, spec).unwrap();
    let expected: Vec<f32> = (0..36000 * 2).map(|i| ((i % 100) as f32 - 50.0) / 100.0).collect();
    for &s in &expected {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();

    let output = miditone_bin()
        .args([
            "render",
            score.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--input",
            input.to_str().unwrap(),
            "--bypass",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let (_, samples) = read_wav(&out);
    assert_eq!(samples, expected);
}

#[test]
fn render_mute_without_input_is_silent() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "song.toml", SCORE);
    let out = dir.path().join("out.wav");

    let output = miditone_bin()
        .args(["render", score.to_str().unwrap(), "-o", out.to_str().unwrap(), "--mute"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let (_, samples) = read_wav(&out);
    assert!(samples.iter().all(|&s| s == 0.0));
}

#[test]
fn render_accepts_negative_transposition_and_custom_block() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "song.toml", SCORE);
    let out = dir.path().join("out.wav");

    let output = miditone_bin()
        .args([
            "render",
            score.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--transpose",
            "-12",
            "--instrument",
            "32",
            "--block-size",
            "100",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("in 360 quanta"));
}

#[test]
fn render_rejects_missing_bank() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "song.toml", SCORE);
    let out = dir.path().join("out.wav");

    let output = miditone_bin()
        .args([
            "render",
            score.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--bank",
            dir.path().join("missing.toml").to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loading sound bank"));
    assert!(!out.exists());
}

// ---------------------------------------------------------------------------
// `miditone bank`
// ---------------------------------------------------------------------------

#[test]
fn bank_lists_builtin_patches_and_kits() {
    let output = miditone_bin().arg("bank").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Bank: Builtin"));
    for name in ["Piano", "Organ", "Strings", "Standard", "Electronic"] {
        assert!(stdout.contains(name), "listing should contain '{name}'");
    }
}

#[test]
fn bank_toml_export_loads_back() {
    let output = miditone_bin().args(["bank", "--toml"]).output().unwrap();
    assert!(output.status.success());

    let dir = TempDir::new().unwrap();
    let path = write(&dir, "bank.toml", &String::from_utf8_lossy(&output.stdout));
    let output = miditone_bin()
        .args(["bank", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn bank_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bad.toml",
        "name = \"Bad\"\n[[patches]]\nprogram = 200\nname = \"x\"\n",
    );
    let output = miditone_bin()
        .args(["bank", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of range"));
}

// ---------------------------------------------------------------------------
// `miditone score`
// ---------------------------------------------------------------------------

#[test]
fn score_prints_summary() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "song.toml", SCORE);
    let output = miditone_bin()
        .args(["score", score.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 events"));
    assert!(stdout.contains("note_on"));
    assert!(stdout.contains("36000 frames"));
}

#[test]
fn score_rejects_oversized_block() {
    let dir = TempDir::new().unwrap();
    let score = write(&dir, "bad.toml", "block_size = 5000\n");
    let output = miditone_bin()
        .args(["score", score.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("block size 5000"));
}
