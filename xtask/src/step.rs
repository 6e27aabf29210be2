use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// Run `cargo <args>` and report it as one step.
///
/// A failing step prints the captured stderr. It aborts the task only when
/// `required` is set; otherwise it is reported as a warning.
pub fn cargo(label: &str, args: &[&str], required: bool) -> Result<Option<Output>> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if !output.status.success() {
        if required {
            eprintln!("{}", format!("  ✗ {label} failed").red().bold());
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
            anyhow::bail!("{label} failed");
        }
        eprintln!("{}", format!("  ⚠ {label} reported problems").yellow().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        println!();
        return Ok(None);
    }

    println!(
        "{}",
        format!(
            "  ✓ {label} passed in {:.2}s",
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(Some(output))
}

pub fn finished(what: &str, start: Instant) {
    println!(
        "{}",
        format!(
            "✓ {what} completed in {:.2}s",
            start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();
}
