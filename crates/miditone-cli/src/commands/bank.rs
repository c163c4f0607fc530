//! Sound bank inspection command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use miditone_synth::SoundBank;

#[derive(Args)]
pub struct BankArgs {
    /// Bank file to validate (built-in bank when omitted)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Print the bank as TOML instead of a listing
    #[arg(long)]
    toml: bool,
}

pub fn run(args: BankArgs) -> Result<()> {
    let bank = match &args.path {
        Some(path) => SoundBank::load(path)
            .with_context(|| format!("loading sound bank '{}'", path.display()))?,
        None => SoundBank::builtin(),
    };

    if args.toml {
        print!("{}", bank.to_toml()?);
        return Ok(());
    }

    println!("Bank: {}", bank.name);
    println!();
    println!("Patches:");
    let mut patches: Vec<_> = bank.patches.iter().collect();
    patches.sort_by_key(|p| p.program);
    for patch in patches {
        println!(
            "  {:>3}  {:<14} {:<9} A {:>6.1} ms  D {:>6.1} ms  S {:.2}  R {:>6.1} ms",
            patch.program,
            patch.name,
            format!("{:?}", patch.waveform).to_lowercase(),
            patch.attack_ms,
            patch.decay_ms,
            patch.sustain,
            patch.release_ms,
        );
    }

    if !bank.kits.is_empty() {
        println!();
        println!("Kits:");
        for kit in &bank.kits {
            let notes: usize = kit.pieces.iter().map(|p| p.notes.len()).sum();
            println!(
                "  {:>3}  {:<14} {} pieces, {} notes",
                kit.kit,
                kit.name,
                kit.pieces.len(),
                notes
            );
        }
    }
    Ok(())
}
