//! Shared building blocks of `cprog`: the chunked copy engine, progress rendering and path
//! resolution.
//!
//! # Overview
//!
//! A copy goes through three steps:
//!
//! 1. [`path::resolve`] turns the command-line source and destination into file paths, refusing
//!    directory sources and existing files inside a destination directory.
//! 2. [`copy::Engine`] streams the source into the destination one chunk at a time. After every
//!    chunk the [`copy::Session`] decides whether a throughput sample (every 250ms) or an ETA refresh
//!    (every second) is due and the [`progress::Renderer`] draws a new line.
//! 3. The permission bits of the source are copied to the destination.
//!
//! All of it runs on the calling thread with blocking I/O.
//!
//! # Example
//!
//! ```rust,no_run
//! use common::{clock, copy, palette, path, progress, terminal};
//!
//! # fn example() -> anyhow::Result<()> {
//! let resolved = path::resolve("big.iso".as_ref(), "/mnt/backup".as_ref())?;
//! let style = palette::Style::for_mode(palette::DisplayMode::Unicode);
//! let renderer = progress::Renderer::new(&style, terminal::detect_bar_width());
//! let clock = clock::MonotonicClock::start();
//! let mut engine = copy::Engine::new(
//!     copy::Settings::default(),
//!     &clock,
//!     renderer,
//!     std::io::stdout().lock(),
//! );
//! let summary = engine.copy_file(&resolved.src, &resolved.dst)?;
//! assert!(summary.bytes_copied > 0);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod copy;
pub mod palette;
pub mod path;
pub mod preserve;
pub mod progress;
pub mod terminal;

#[cfg(test)]
mod testutils;

pub use config::{ChunkConfig, OutputConfig};

fn verbosity_filter(output: &OutputConfig) -> tracing_subscriber::EnvFilter {
    if output.quiet {
        return tracing_subscriber::EnvFilter::new("off");
    }
    let level = match output.verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
}

/// Sets up logging and runs `func`.
///
/// Errors are printed to stderr as a single line (unless quiet) and turned into `None` so the
/// caller only has to pick an exit code.
pub fn run<Func, T>(output: OutputConfig, func: Func) -> Option<T>
where
    Func: FnOnce() -> anyhow::Result<T>,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(verbosity_filter(&output))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("cannot set up logging: {error}");
    }
    match func() {
        Ok(value) => Some(value),
        Err(error) => {
            if !output.quiet {
                eprintln!("cprog: {:#}", &error);
            }
            None
        }
    }
}
