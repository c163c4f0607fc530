//! Score validation command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::score::Score;

#[derive(Args)]
pub struct ScoreArgs {
    /// Score file (TOML)
    #[arg(value_name = "SCORE")]
    score: PathBuf,
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let score = Score::load(&args.score)
        .with_context(|| format!("loading score '{}'", args.score.display()))?;

    let total_frames = score.total_frames();
    let quanta = total_frames.div_ceil(u64::from(score.block_size));

    println!("Score: {}", args.score.display());
    println!(
        "  {} Hz, {} channels, block size {}",
        score.sample_rate, score.channels, score.block_size
    );
    println!(
        "  {:.2} s ({} frames, {} quanta), tail {:.2} s",
        total_frames as f64 / f64::from(score.sample_rate),
        total_frames,
        quanta,
        score.tail_seconds
    );
    println!(
        "  bank: {}",
        score.bank.as_deref().unwrap_or("builtin")
    );

    let control = &score.control;
    match control.instrument {
        Some(code) => println!("  instrument override: {code}"),
        None => println!("  instrument override: none"),
    }
    println!(
        "  transposition: {}  muted: {}  bypassed: {}",
        control.transposition.unwrap_or(0),
        control.muted,
        control.bypassed
    );

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for event in &score.events {
        *counts.entry(event.type_name()).or_default() += 1;
    }
    println!("  {} events", score.events.len());
    for (name, count) in counts {
        println!("    {name:<18} {count}");
    }
    Ok(())
}
