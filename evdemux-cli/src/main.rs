//! evdemux CLI application.
//!
//! Splits a DVS row recording into one fixed-width stream file per event
//! category.

use anyhow::{Context, Result};
use clap::Parser;
use evdemux_core::{
    DirectorySink, EventCategory, FrameGeometry, RowFile, RowSource, TranscodeConfig, Transcoder,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Event stream demultiplexer for DVS row recordings.
///
/// Reads a row file and writes special.bin, polarity.bin, frame.bin and
/// imu6.bin into the output directory.
#[derive(Parser, Debug)]
#[command(name = "evdemux")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input row file path
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory for the stream files
    #[arg(value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Candidate sensor row widths for frame packets, tried in order.
    ///
    /// A frame's declared size minus its 36-byte sub-header is tested against
    /// each width; the first one dividing it evenly fixes the frame record
    /// width (two bytes per pixel).
    ///
    /// Examples:
    /// - "128,240,346" (default: DVS128, DAVIS240, DAVIS346)
    /// - "346,240,128" (prefer the largest sensor on ties)
    #[arg(short, long, default_value = "128,240,346")]
    frame_widths: String,

    /// Exit with an error if any row was rejected
    #[arg(long)]
    strict: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let frame_geometry = FrameGeometry::from_str(&args.frame_widths)
        .context("Invalid frame widths. Use comma-separated pixel counts: 128,240,346")?;
    let config = TranscodeConfig::default().with_frame_geometry(frame_geometry);

    let start_time = Instant::now();

    let source = RowFile::open(&args.input)
        .with_context(|| format!("Failed to read row file {:?}", args.input))?;
    let row_count = source.row_count();

    let mut sink = DirectorySink::create(&args.output)
        .with_context(|| format!("Failed to create output directory {:?}", args.output))?;

    // Setup progress bar
    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(row_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!(
            "{:?}",
            args.input.file_name().unwrap_or_default()
        ));
        pb
    };

    let mut transcoder = Transcoder::with_config(config);
    for index in 0..row_count {
        let row = source
            .row(index)
            .with_context(|| format!("Failed to read row {}", index))?;
        transcoder
            .process_row(row, &mut sink)
            .with_context(|| format!("Failed to write events of row {}", index))?;
        progress.inc(1);
    }

    let widths = EventCategory::ALL.map(|category| transcoder.established_width(category));
    let stats = transcoder
        .finish(&mut sink)
        .context("Failed to finalize stream files")?;

    let total_duration = start_time.elapsed();

    progress.finish_with_message(format!(
        "Done! {} events from {} rows in {:.2}s",
        stats.total_events(),
        stats.total_rows,
        total_duration.as_secs_f64()
    ));

    if !args.quiet {
        // Print summary
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", args.input);
        eprintln!("  Output:       {:?}", args.output);
        eprintln!("{}", stats);
        for (category, width) in EventCategory::ALL.into_iter().zip(widths) {
            if let Some(width) = width {
                eprintln!("  {:<13} {} bytes/event", format!("{} width:", category), width);
            }
        }
        eprintln!("  Duration:     {:.3}s", total_duration.as_secs_f64());
    }

    if args.strict && !stats.is_clean() {
        anyhow::bail!("{} rows were rejected", stats.rejected_rows());
    }

    Ok(())
}
