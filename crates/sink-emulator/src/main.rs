// Desktop tooling crate: unwrap/expect acceptable outside the sink core.
#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(missing_docs)]

//! Broadcast sink emulator.
//!
//! Runs the sink core against a simulated radio that plays a stereo LC3
//! broadcaster and, with `--assistant`, a Broadcast Assistant handing that
//! broadcaster over through PAST. Phase transitions and the joined BIS
//! bitfield are logged at `info`.
//!
//! ```text
//! cargo run -p sink-emulator -- --channel left --cycles 2
//! RUST_LOG=bluetooth=debug cargo run -p sink-emulator -- --assistant --encrypted
//! ```

mod host;
mod radio;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bluetooth::{BroadcastSink, CycleOutcome, SinkConfig};
use clap::Parser;
use platform::{AudioLocation, BroadcastCode, BroadcastId};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::host::SimHost;
use crate::radio::{Broadcaster, Radio};

const BROADCAST_NAME: &str = "Emulated Broadcast";
const BROADCAST_ID: u32 = 0x00C0_FFEE;
const BROADCAST_CODE: BroadcastCode = *b"emulated-code\0\0\0";
/// Consecutive restarts tolerated before giving up.
const MAX_RESTARTS: u32 = 3;

#[derive(Parser, Debug)]
#[command(name = "sink-emulator")]
#[command(about = "LE Audio broadcast sink on a simulated radio", long_about = None)]
#[command(version)]
struct Args {
    /// Only sync to broadcasts whose name contains this text (case-insensitive).
    /// Overrides TARGET_BROADCAST_NAME from the build
    #[arg(long)]
    name: Option<String>,

    /// Audio location to sync to: left, right, stereo, mono or a bitmask
    /// (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_channel)]
    channel: Option<AudioLocation>,

    /// Maximum number of BIS to join. Overrides BROADCAST_SNK_STREAM_COUNT
    #[arg(long)]
    streams: Option<u8>,

    /// Broadcasts to receive before exiting
    #[arg(long, default_value_t = 1)]
    cycles: u32,

    /// Have a Broadcast Assistant hand the broadcast over through PAST
    #[arg(long)]
    assistant: bool,

    /// Encrypt the broadcast; only an assistant can deliver the code
    #[arg(long)]
    encrypted: bool,

    /// Seconds each broadcast stays on the air after the sink joins
    #[arg(long, default_value_t = 2)]
    lifetime: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_channel(text: &str) -> Result<AudioLocation, String> {
    match text.to_ascii_lowercase().as_str() {
        "left" => Ok(AudioLocation::FRONT_LEFT),
        "right" => Ok(AudioLocation::FRONT_RIGHT),
        "stereo" => Ok(AudioLocation::FRONT_LEFT | AudioLocation::FRONT_RIGHT),
        "mono" => Ok(AudioLocation::MONO),
        other => AudioLocation::parse(other).ok_or_else(|| format!("unknown channel `{text}`")),
    }
}

/// Build-time defaults, then the command line on top. The scan modes always
/// follow `--assistant` since the radio only plays an assistant on request.
fn sink_config(args: &Args) -> Result<SinkConfig> {
    let mut config = SinkConfig::from_build_env()?;
    if let Some(name) = &args.name {
        config = config.with_target_name(name)?;
    }
    if args.channel.is_some() {
        config = config.with_target_channel(args.channel);
    }
    if let Some(streams) = args.streams {
        config = config.with_stream_count(streams);
    }
    let config = config
        .with_scan_modes(!args.assistant, args.assistant)
        .with_timeouts(
            embassy_time::Duration::from_secs(5),
            embassy_time::Duration::from_secs(10),
        );
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let config = sink_config(&args).context("invalid sink configuration")?;
    let broadcast_id = BroadcastId::new(BROADCAST_ID).context("broadcast id out of range")?;
    let mut broadcaster = Broadcaster::stereo(
        BROADCAST_NAME,
        broadcast_id,
        Duration::from_secs(args.lifetime),
    );
    if args.encrypted {
        broadcaster.code = Some(BROADCAST_CODE);
    }

    let (commands, radio_rx) = mpsc::unbounded_channel();
    let sink = Arc::new(BroadcastSink::new(SimHost::new(commands), config)?);
    sink.init()?;
    tokio::spawn(Radio::new(Arc::clone(&sink), radio_rx, broadcaster, args.assistant).run());

    info!(
        name = sink.config().target_broadcast_name.as_str(),
        channel = ?sink.config().target_channel.map(|c| c.bits()),
        streams = sink.config().stream_count,
        assistant = args.assistant,
        encrypted = args.encrypted,
        "sink running"
    );

    let cycles = async {
        let mut received = 0u32;
        let mut restarts = 0u32;
        while received < args.cycles {
            match sink.run_cycle().await? {
                CycleOutcome::Completed => {
                    received = received.saturating_add(1);
                    restarts = 0;
                    info!(received, total = args.cycles, "broadcast received");
                }
                CycleOutcome::Restart(reason) => {
                    restarts = restarts.saturating_add(1);
                    warn!(%reason, restarts, "cycle restarted");
                    if restarts >= MAX_RESTARTS {
                        bail!("giving up after {restarts} restarts, last: {reason}");
                    }
                }
            }
        }
        Ok(())
    };

    tokio::select! {
        result = cycles => result,
        never = sink.pa_watchdog() => match never {},
    }
}
