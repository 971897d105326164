//! Command-line front end for meshfit
//!
//! `meshfit` decimates a textured mesh (`--downsample`) or rescales it so its
//! smallest bounding box extent matches a real-world size; `meshfit-view`
//! opens a mesh in the viewer.

pub mod args;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

pub use args::{Args, BboxArg, ViewArgs};
pub use commands::{downsample, resize, view, DownsampleSummary, ResizeSummary};
pub use config::{Config, SimplifyConfig, ViewConfig};
pub use error::{CliError, EXIT_INPUT_ERROR, EXIT_PROCESSING_ERROR};
pub use logging::{init_logger, resolve_log_level, LogLevel};

use clap::Parser;
use std::io::Write;
use std::process::ExitCode;

/// Entry point of the `meshfit` binary
pub fn run() -> ExitCode {
    let args = Args::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    ExitCode::from(run_with(&args, &mut out))
}

/// Run one invocation, writing the report to `out`; returns the exit code.
pub fn run_with(args: &Args, out: &mut dyn Write) -> u8 {
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return fail(out, &e),
    };
    let level = resolve_log_level(args.log_level, std::env::var("RUST_LOG").ok(), config.log_level);
    init_logger(&level);

    let outcome = if args.downsample {
        downsample(args, &config, out).map(|summary| {
            log::info!(
                "decimated {} -> {} faces (target {})",
                summary.input_faces,
                summary.output_faces,
                summary.target_faces
            );
        })
    } else {
        resize(args, &config, out).map(|summary| {
            log::info!("resized by a factor of {}", summary.scale);
        })
    };

    match outcome {
        Ok(()) => 0,
        Err(e) => fail(out, &e),
    }
}

/// Entry point of the `meshfit-view` binary
pub fn run_view() -> ExitCode {
    let args = ViewArgs::parse();
    let level = resolve_log_level(args.log_level, std::env::var("RUST_LOG").ok(), None);
    init_logger(&level);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match view(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(fail(&mut out, &e)),
    }
}

fn fail(out: &mut dyn Write, error: &CliError) -> u8 {
    log::debug!("{:?}", error);
    if let Err(e) = writeln!(out, "❌ Failed: {}", error) {
        log::debug!("report output failed: {}", e);
    }
    error.exit_code()
}
