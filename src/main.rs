//! progress-transcode CLI
//!
//! Re-encodes the first video stream of a file with a progress bar burned
//! into the bottom of every frame.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use progress_transcode::{transcode, Config, Error};

#[derive(Parser)]
#[command(name = "progress-transcode")]
#[command(about = "Transcode a video with a progress bar burned in")]
#[command(version)]
struct Cli {
    /// Input media file
    input: PathBuf,

    /// Output media file (container guessed from the extension)
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output container format (e.g. matroska, mp4, avi)
    #[arg(short, long)]
    format: Option<String>,

    /// FFmpeg encoder name (default: encoder for the source codec)
    #[arg(short, long)]
    encoder: Option<String>,

    /// Progress bar height in pixels
    #[arg(long)]
    bar_height: Option<u32>,

    /// Print FFmpeg's description of the input
    #[arg(long)]
    dump: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Exit status for a command line clap refused: 0 for help and version, 1 otherwise
fn usage_exit_code(error: &clap::Error) -> u8 {
    if error.use_stderr() {
        1
    } else {
        0
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(&e));
        }
    };

    let level = if cli.verbose { "debug" } else { "info" };
    let directive = format!("progress_transcode={}", level);
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e
                .downcast_ref::<Error>()
                .is_some_and(|e| e.is_codec_error())
            {
                eprintln!("Hint: pick another encoder with --encoder, e.g. --encoder mpeg4");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(format) = &cli.format {
        config = config.with_output_format(format.clone());
    }
    if let Some(encoder) = &cli.encoder {
        config = config.with_encoder(encoder.clone());
    }
    if let Some(height) = cli.bar_height {
        config = config.with_bar_height(height);
    }
    if cli.dump {
        config.input.dump_format = true;
    }

    let stats = transcode(&cli.input, &cli.output, &config).with_context(|| {
        format!(
            "transcoding {} to {}",
            cli.input.display(),
            cli.output.display()
        )
    })?;

    println!(
        "{} -> {}: {} frames, {} packets written",
        cli.input.display(),
        cli.output.display(),
        stats.frames_overlaid,
        stats.packets_written
    );
    if stats.timestamp_fixups > 0 {
        println!("  {} timestamps adjusted", stats.timestamp_fixups);
    }

    Ok(())
}
