//! `proxima-cli` – Proxima command line interface.
//!
//! - `proxima replay <frames.jsonl>` runs recorded radar frames through the
//!   obstacle pipeline and prints every encoded transfer as hex.
//! - `proxima decode <hex>` decodes a `ProximitySensor` payload.
//! - `proxima config` prints the effective configuration; `--init` writes
//!   the defaults to `~/.proxima/config.toml`.
//!
//! Ctrl-C stops a paced replay after the current frame.

mod config;
mod replay;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use proxima_codec::{DsdlMessage, ProximitySensorMessage};
use proxima_runtime::TelemetryConfig;
use tracing::warn;

#[derive(Parser)]
#[command(name = "proxima")]
#[command(about = "Radar obstacle pipeline", version)]
struct Cli {
    /// Path to the TOML config file (default: ~/.proxima/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay JSON-lines frames through the pipeline
    Replay {
        /// Recording with one JSON array of points per line
        frames: PathBuf,
        /// Pause between frames, in milliseconds
        #[arg(long)]
        period_ms: Option<u64>,
    },

    /// Decode a ProximitySensor payload given as hex
    Decode {
        /// Payload bytes, e.g. "540aa000..."
        hex: String,
        /// The payload omits the obstacle count
        #[arg(long)]
        tail_array: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(config::config_path);
    let _telemetry = proxima_runtime::init_tracing(&telemetry_for(&path));

    let result = match cli.command {
        Commands::Replay { frames, period_ms } => run_replay(&path, &frames, period_ms),
        Commands::Decode { hex, tail_array } => run_decode(&hex, tail_array),
        Commands::Config { init } => run_config(&path, init),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Node identity for telemetry; an unreadable config is reported later by
/// the command itself.
fn telemetry_for(config_path: &Path) -> TelemetryConfig {
    let node = TelemetryConfig::new("proxima");
    match config::load_effective(config_path) {
        Ok(cfg) => node
            .with_sensor(cfg.effective_pipeline().sensor)
            .with_hardware_uid(cfg.hardware_uid),
        Err(_) => node,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run_replay(config_path: &Path, frames_path: &Path, period_ms: Option<u64>) -> Result<(), String> {
    let cfg = config::load_effective(config_path)?;
    let pipeline = cfg.effective_pipeline();

    let file = std::fs::File::open(frames_path)
        .map_err(|e| format!("Failed to open {}: {}", frames_path.display(), e))?;
    let frames = replay::parse_frames(std::io::BufReader::new(file))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; replay cannot be interrupted");
    }

    println!(
        "  Replaying {} frame(s) from {} as {}",
        frames.len(),
        frames_path.display().to_string().bold(),
        pipeline.sensor.to_string().bold()
    );
    let stats = replay::run(frames, pipeline, period_ms.map(Duration::from_millis), shutdown);

    println!();
    println!(
        "  {} frames, {} published, {} empty, {} dropped, {} records truncated, {} transport failures",
        stats.frames,
        stats.published.to_string().green(),
        stats.empty,
        stats.dropped.to_string().red(),
        stats.truncated_records,
        stats.transport_failures
    );
    Ok(())
}

fn run_decode(input: &str, tail_array: bool) -> Result<(), String> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).map_err(|e| format!("Invalid hex: {}", e))?;
    let message = ProximitySensorMessage::decode(&bytes, bytes.len(), tail_array)
        .map_err(|e| format!("Failed to decode payload: {}", e))?;

    println!("  sensor    {}", message.sensor_id.to_string().bold());
    println!("  obstacles {}", message.obstacles.len());
    for (i, obstacle) in message.obstacles.iter().enumerate() {
        println!(
            "  {:>3}  yaw {:>8.3}°  pitch {:>8.3}°  distance {:>9.3} m",
            i, obstacle.yaw_deg, obstacle.pitch_deg, obstacle.distance_m
        );
    }
    Ok(())
}

fn run_config(path: &Path, init: bool) -> Result<(), String> {
    if init {
        if path.exists() {
            println!("  Config already exists at {}", path.display().to_string().bold());
        } else {
            config::save_to(&config::Config::default(), path)?;
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
        }
    }

    let cfg = config::load_effective(path)?;
    let effective = config::Config {
        pipeline: cfg.effective_pipeline(),
        ..cfg
    };
    println!("{}", config::to_toml(&effective)?);
    Ok(())
}
