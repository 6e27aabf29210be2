use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;

pub fn run(assistant: bool, extra: &[String]) -> Result<()> {
    println!();
    println!("{}", "📻 Starting sink emulator...".cyan().bold());
    println!();

    let mut cmd = Command::new("cargo");
    cmd.args(["run", "-p", "sink-emulator", "--"]);
    if assistant {
        cmd.arg("--assistant");
    }
    cmd.args(extra);

    let status = cmd.status().context("Failed to run sink-emulator")?;
    if !status.success() {
        anyhow::bail!("sink-emulator exited with {status}");
    }
    Ok(())
}
