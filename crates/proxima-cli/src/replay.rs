//! Frame replay – feeds recorded frames through the pipeline.
//!
//! Input is JSON lines: one frame per line, each frame an array of points
//! (`{"x": .., "y": .., "z": .., "snr_db": ..}`).  Blank lines and lines
//! starting with `#` are skipped.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use proxima_middleware::{BusTransport, EventBus, Topic};
use proxima_runtime::{FrameOutcome, ObstaclePipeline, PipelineConfig, PipelineStats};
use proxima_types::{EventPayload, Point};
use tracing::info;

/// Parse every frame of a JSON-lines recording.
pub fn parse_frames(reader: impl BufRead) -> Result<Vec<Vec<Point>>, String> {
    let mut frames = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Failed to read line {}: {}", index + 1, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let frame: Vec<Point> = serde_json::from_str(trimmed)
            .map_err(|e| format!("Invalid frame on line {}: {}", index + 1, e))?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Run `frames` through a pipeline built from `config`, printing each
/// published transfer.  Stops early once `shutdown` is raised.
pub fn run(
    frames: Vec<Vec<Point>>,
    config: PipelineConfig,
    period: Option<Duration>,
    shutdown: Arc<AtomicBool>,
) -> PipelineStats {
    let bus = EventBus::default();
    let mut transfers = bus.subscribe_to(Topic::Obstacles);
    let transport = BusTransport::new(bus, "proxima-cli::replay");
    let mut pipeline = ObstaclePipeline::new(config, transport);

    info!(frames = frames.len(), "replay started");
    for mut frame in frames {
        if shutdown.load(Ordering::SeqCst) {
            println!("{}", "  Replay interrupted.".yellow());
            break;
        }

        match pipeline.process_frame(&mut frame) {
            FrameOutcome::Published(report) => {
                let truncated = if report.truncated > 0 {
                    format!(" (+{} truncated)", report.truncated).yellow().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  frame {:>4}  id {:>2}  {:>2} record(s){}",
                    report.frame, report.transfer.transfer_id, report.records, truncated
                );
            }
            FrameOutcome::Empty { frame, summary } => {
                let line = format!("  frame {frame:>4}  no obstacles ({} noise)", summary.noise);
                println!("{}", line.dimmed());
            }
            FrameOutcome::Dropped { frame, error } => {
                println!("  frame {frame:>4}  {} {}", "dropped:".red(), error);
            }
        }

        for event in transfers.drain() {
            if let EventPayload::Transfer(transfer) = event.payload {
                println!("              {}", hex::encode(&transfer.payload).cyan());
            }
        }

        if let Some(period) = period {
            std::thread::sleep(period);
        }
    }

    let stats = pipeline.stats();
    info!(
        frames = stats.frames,
        published = stats.published,
        dropped = stats.dropped,
        "replay finished"
    );
    stats
}
