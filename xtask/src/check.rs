use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step;

/// Cortex-M4F/M7 with hardware float, the class of MCU the sink targets.
const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking broadcast sink builds...".cyan().bold());
    println!();

    let start = Instant::now();

    step::cargo(
        "Checking sink core (no_std, defmt)",
        &[
            "check",
            "-p",
            "bluetooth",
            "--target",
            EMBEDDED_TARGET,
            "--features",
            "defmt",
        ],
        true,
    )?;

    step::cargo(
        "Checking platform crate (no_std)",
        &[
            "check",
            "-p",
            "platform",
            "--target",
            EMBEDDED_TARGET,
            "--no-default-features",
        ],
        true,
    )?;

    step::cargo(
        "Checking sink emulator (host)",
        &["check", "-p", "sink-emulator"],
        true,
    )?;

    // Clippy and formatting are reported, not enforced.
    step::cargo(
        "Running clippy lints",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        false,
    )?;
    if step::cargo("Checking code formatting", &["fmt", "--all", "--check"], false)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
        println!();
    }

    step::finished("All checks", start);
    Ok(())
}
