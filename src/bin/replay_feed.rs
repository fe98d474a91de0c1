//! CLI tool for replaying fixed-width feed files into depth snapshots.
//!
//! Each input file is an independent stream. Streams are replayed in
//! parallel; a stream that faults is reported and skipped, the rest are
//! exported as one file per instrument and session.
//!
//! # Usage
//!
//! ```bash
//! # Replay one file for two instruments
//! cargo run --release --bin replay_feed -- \
//!     --input data/S122607-v2.txt \
//!     --output out/ \
//!     --instrument AAPL --instrument MSFT
//!
//! # Replay a directory of sessions with a saved configuration
//! cargo run --release --bin replay_feed -- \
//!     --input data/sessions/ \
//!     --output out/ \
//!     --config replay.json \
//!     --format jsonl
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ahash::AHashSet;
use itch_depth_reconstructor::{
    replay_streams, EngineConfig, FileSource, LineSource, ReplayError, Result, StreamReport,
};

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Jsonl,
}

/// Command-line arguments
struct Args {
    /// Input feed file or directory of feed files
    input: PathBuf,
    /// Output directory for snapshot files
    output: PathBuf,
    /// Instruments given on the command line
    instruments: Vec<String>,
    /// Snapshot depth override
    levels: Option<usize>,
    /// Saved engine configuration
    config: Option<PathBuf>,
    format: Format,
    /// Log progress every this many lines
    progress: Option<u64>,
}

fn parse_args() -> std::result::Result<Args, String> {
    let args: Vec<String> = env::args().collect();

    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut instruments = Vec::new();
    let mut levels = None;
    let mut config = None;
    let mut format = Format::Csv;
    let mut progress = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                i += 1;
                let value = args.get(i).ok_or("--input requires a path")?;
                input = Some(PathBuf::from(value));
            }
            "--output" | "-o" => {
                i += 1;
                let value = args.get(i).ok_or("--output requires a path")?;
                output = Some(PathBuf::from(value));
            }
            "--instrument" | "-s" => {
                i += 1;
                let value = args.get(i).ok_or("--instrument requires a token")?;
                instruments.push(value.clone());
            }
            "--levels" | "-l" => {
                i += 1;
                let value = args.get(i).ok_or("--levels requires a number")?;
                let n = value
                    .parse::<usize>()
                    .map_err(|_| format!("Invalid --levels value: {value}"))?;
                levels = Some(n);
            }
            "--config" | "-c" => {
                i += 1;
                let value = args.get(i).ok_or("--config requires a path")?;
                config = Some(PathBuf::from(value));
            }
            "--format" | "-f" => {
                i += 1;
                format = match args.get(i).map(String::as_str) {
                    Some("csv") => Format::Csv,
                    Some("jsonl") => Format::Jsonl,
                    Some(other) => return Err(format!("Unknown format: {other}")),
                    None => return Err("--format requires csv or jsonl".to_string()),
                };
            }
            "--progress" | "-p" => {
                i += 1;
                let value = args.get(i).ok_or("--progress requires a line count")?;
                let n = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --progress value: {value}"))?;
                progress = Some(n);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                // Positional arguments
                if input.is_none() {
                    input = Some(PathBuf::from(arg));
                } else if output.is_none() {
                    output = Some(PathBuf::from(arg));
                } else {
                    return Err(format!("Unknown argument: {arg}"));
                }
            }
        }
        i += 1;
    }

    let input = input.ok_or("Input path is required")?;
    let output = output.ok_or("Output directory is required")?;

    Ok(Args {
        input,
        output,
        instruments,
        levels,
        config,
        format,
        progress,
    })
}

fn print_help() {
    eprintln!(
        r#"
Replay Feed Files into Depth Snapshots

Replays fixed-width Add/Execute/Cancel feed files and writes one snapshot
row per book-changing event, per tracked instrument.

USAGE:
    replay_feed [OPTIONS] --input <PATH> --output <DIR> --instrument <TOKEN>...
    replay_feed <INPUT> <OUTPUT> --instrument <TOKEN>...

OPTIONS:
    -i, --input <PATH>        Feed file, or directory of .txt/.zst feed files
    -o, --output <DIR>        Output directory for snapshot files
    -s, --instrument <TOKEN>  Instrument to track (repeatable)
    -l, --levels <N>          Snapshot depth per side (default 10, max 50)
    -c, --config <FILE>       JSON engine configuration; flags override it
    -f, --format <FMT>        csv (default) or jsonl
    -p, --progress <LINES>    Log progress every LINES lines
    -h, --help                Print this help message

EXAMPLES:
    replay_feed -i data/S122607-v2.txt -o out/ -s AAPL -s MSFT
    replay_feed -i data/sessions/ -o out/ -c replay.json -f jsonl

NOTES:
    - Each file is an independent stream; files replay in parallel
    - A malformed record or level underflow halts only its own stream
    - Output files are named <instrument>_<session>.<csv|jsonl>
    - Inputs sharing a session (S1.txt, S1.txt.zst) are skipped after the first
    - Exit status is non-zero if any stream failed
"#
    );
}

/// Build the engine configuration from an optional file plus flags.
fn build_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load_json(path)?,
        None => EngineConfig::default(),
    };
    if let Some(levels) = args.levels {
        config.levels = levels;
    }
    if let Some(every) = args.progress {
        config = config.with_progress(every);
    }
    config = config.with_instruments(args.instruments.iter().cloned());
    config.validate()?;
    Ok(config)
}

/// Find feed files in a path (file or directory)
fn find_feed_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        let entries = fs::read_dir(path).map_err(|e| {
            ReplayError::Io(format!("Failed to read directory {}: {e}", path.display()))
        })?;
        for entry in entries {
            let entry =
                entry.map_err(|e| ReplayError::Io(format!("Failed to read entry: {e}")))?;
            let path = entry.path();
            let is_feed = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "txt" || e == "zst");
            if path.is_file() && is_feed {
                files.push(path);
            }
        }
    } else {
        return Err(ReplayError::Io(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    files.sort();
    Ok(files)
}

/// Keep the first source per session label; later ones would export over
/// its files.
fn split_session_collisions(sources: Vec<FileSource>) -> (Vec<FileSource>, Vec<FileSource>) {
    let mut seen = AHashSet::with_capacity(sources.len());
    sources
        .into_iter()
        .partition(|source| seen.insert(source.metadata().label().to_string()))
}

fn export(report: &StreamReport, output: &Path, format: Format) -> Result<Vec<PathBuf>> {
    let session = report.metadata.label();
    match format {
        Format::Csv => report.recorder.export_csv(output, session),
        Format::Jsonl => report.recorder.export_jsonl(output, session),
    }
}

/// Format duration as human-readable string
fn format_duration(secs: f64) -> String {
    if secs >= 60.0 {
        format!("{:.1} min", secs / 60.0)
    } else {
        format!("{secs:.1}s")
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let files = match find_feed_files(&args.input) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error finding files: {e}");
            std::process::exit(1);
        }
    };

    if files.is_empty() {
        eprintln!("No feed files found in {}", args.input.display());
        std::process::exit(0);
    }

    log::info!(
        "replaying {} file(s), {} instrument(s), {} levels",
        files.len(),
        config.tracked_instruments.len(),
        config.levels
    );

    let mut errors = 0usize;
    let mut sources = Vec::with_capacity(files.len());
    for file in &files {
        match FileSource::new(file) {
            Ok(source) => sources.push(source),
            Err(e) => {
                log::error!("{}: {e}", file.display());
                errors += 1;
            }
        }
    }

    let (sources, collisions) = split_session_collisions(sources);
    for source in &collisions {
        log::error!(
            "{}: session {} already taken by another input, skipped",
            source.path().display(),
            source.metadata().label()
        );
        errors += 1;
    }

    let start_time = Instant::now();
    let reports = match replay_streams(&config, sources) {
        Ok(reports) => reports,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let mut files_written = 0usize;
    let mut rows_written = 0usize;
    for report in &reports {
        let label = report.metadata.label();
        if let Some(fault) = &report.fault {
            log::error!("{label}: stream skipped: {fault}");
            errors += 1;
            continue;
        }

        match export(report, &args.output, args.format) {
            Ok(paths) => {
                files_written += paths.len();
                rows_written += report.recorder.total_rows();
                log::info!(
                    "{label}: {} rows across {} instrument(s)",
                    report.recorder.total_rows(),
                    paths.len()
                );
            }
            Err(e) => {
                log::error!("{label}: export failed: {e}");
                errors += 1;
            }
        }
    }

    let total_lines: u64 = reports.iter().map(|r| r.stats.lines).sum();
    let elapsed = start_time.elapsed().as_secs_f64();

    println!("\n{}", "=".repeat(60));
    println!("Replay Complete!");
    println!("  Streams: {}", reports.len());
    println!("  Errors: {errors}");
    println!("  Lines processed: {total_lines}");
    println!("  Rows written: {rows_written}");
    println!("  Files written: {files_written}");
    println!("  Output directory: {}", args.output.display());
    println!("  Total time: {}", format_duration(elapsed));
    if elapsed > 0.0 {
        println!("  Throughput: {:.0} lines/s", total_lines as f64 / elapsed);
    }

    if errors > 0 {
        std::process::exit(1);
    }
}
