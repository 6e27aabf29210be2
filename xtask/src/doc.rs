use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step;

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let start = Instant::now();

    // The sink core is documented with its tracing backend so the host
    // rustdoc build resolves the logging macros.
    let mut args = vec![
        "doc",
        "--workspace",
        "--no-deps",
        "--features",
        "bluetooth/std,bluetooth/tracing",
    ];
    if open {
        args.push("--open");
    }
    step::cargo("Documentation", &args, true)?;

    if !open {
        println!(
            "   {}",
            "Open target/doc/bluetooth/index.html in your browser".dimmed()
        );
        println!("   {}", "Or run 'cargo run -p xtask -- doc --open'".dimmed());
        println!();
    }

    step::finished("Documentation", start);
    Ok(())
}
