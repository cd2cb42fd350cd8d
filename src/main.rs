use anyhow::{bail, Context, Result};
use segment_canvas::room::{RoomConfig, RoomService, ServerMessage};
use segment_canvas::segment::palette::SegmentPalette;
use segment_canvas::settings::{EngineSettings, ImageSize};
use std::io::{BufRead, BufReader};
use std::sync::mpsc;

const REPLAY_CLIENT: u64 = 0;

struct Args {
    events: String,
    settings: String,
    size: Option<ImageSize>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut events = None;
    let mut settings = String::from("settings.json");
    let mut width = None;
    let mut height = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => settings = args.next().context("--settings needs a path")?,
            "--width" => {
                width = Some(args.next().context("--width needs a value")?.parse::<u32>()?)
            }
            "--height" => {
                height = Some(args.next().context("--height needs a value")?.parse::<u32>()?)
            }
            _ if events.is_none() => events = Some(arg),
            other => bail!("unexpected argument {other}"),
        }
    }
    let size = match (width, height) {
        (Some(width), Some(height)) => Some(ImageSize { width, height }),
        (None, None) => None,
        _ => bail!("--width and --height must be given together"),
    };
    Ok(Args {
        events: events.context(
            "usage: segment_canvas <events.jsonl> [--settings settings.json] [--width W --height H]",
        )?,
        settings,
        size,
    })
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let settings = EngineSettings::load(&args.settings)?;
    segment_canvas::logging::init(settings.debug_logging, settings.log_file.clone());

    let size = match args.size.or_else(|| settings.rooms().next().map(|(_, size)| size)) {
        Some(size) if size.width > 0 && size.height > 0 => size,
        _ => bail!("no image size configured"),
    };
    let service = RoomService::spawn(
        "0",
        RoomConfig {
            size,
            track_short_log: settings.track_short_log,
            channel_capacity: settings.room_channel_capacity,
            max_brush_size: settings.max_brush_size,
        },
    )?;
    let (tx, rx) = mpsc::channel();
    service.join(REPLAY_CLIENT, tx)?;

    let file = std::fs::File::open(&args.events)
        .with_context(|| format!("failed to open {}", args.events))?;
    let mut submitted = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        service.submit_json(REPLAY_CLIENT, line)?;
        submitted += 1;
    }

    let summary = service.summary()?;
    let rejected = rx
        .try_iter()
        .filter(|message| matches!(message, ServerMessage::Rejected { .. }))
        .count();
    tracing::info!(submitted, rejected, "replay finished");

    let palette = SegmentPalette::new(settings.color_seed);
    println!(
        "{}x{} image, {} strokes applied, {} rejected, next segment {}",
        summary.width, summary.height, summary.history_len, rejected, summary.next_segment_index
    );
    if let Some(len) = summary.short_log_len {
        println!("short log keeps {len} of {} entries", summary.history_len);
    }
    for segment in summary.stats.segments() {
        let pixels = summary.stats.pixel_count(segment);
        let (cx, cy) = summary.stats.centroid(segment).unwrap_or_default();
        let color = palette.color(segment);
        println!(
            "segment {segment:>5}  pixels {pixels:>8}  centroid ({cx:.1}, {cy:.1})  color #{:02x}{:02x}{:02x}",
            color.0, color.1, color.2
        );
    }
    Ok(())
}
