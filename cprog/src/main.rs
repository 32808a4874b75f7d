use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tracing::instrument;

use common::{clock, copy, palette, path, progress, terminal};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cprog",
    version,
    about = "Copy a file with a live progress bar, throughput and ETA",
    long_about = "`cprog` copies a single file while drawing a progress bar with the current throughput and the estimated time remaining.

The file is streamed in large fixed-size chunks: 8MiB by default, 64MiB with -n (better for network mounts, which are also detected automatically on Linux). If the destination is an existing directory, the file is copied into it under its own name; that file must not exist yet.

EXAMPLES:
    # Copy into a directory
    cprog big.iso /mnt/backup/

    # Copy to a network share using large chunks
    cprog big.iso /mnt/nas/big.iso -n

    # Terminal without UTF-8 or ANSI color support
    cprog big.iso copy.iso -old

EXIT CODES:
    0 - Copy finished
    1 - Usage error or the copy failed"
)]
struct Args {
    // Copy options
    /// Use 64MiB chunks, tuned for network-mounted destinations (also accepted as -net)
    #[arg(short = 'n', long = "net", help_heading = "Copy options")]
    network: bool,

    /// Use this chunk size instead of picking one, e.g. "512KiB" or "16MiB"
    #[arg(long, value_name = "SIZE", help_heading = "Copy options")]
    chunk_size: Option<bytesize::ByteSize>,

    // Progress & output
    /// Shade characters and no colors, for terminals without UTF-8 or ANSI support (also accepted as -old)
    #[arg(long = "old", help_heading = "Progress & output")]
    old: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // ARGUMENTS
    /// File to copy
    #[arg()]
    src: std::path::PathBuf,

    /// Destination file, or an existing directory to copy into
    #[arg()]
    dst: std::path::PathBuf,
}

/// Single-dash words understood for compatibility, with their long-option spelling.
const LEGACY_FLAGS: &[(&str, &str)] = &[("-old", "--old"), ("-net", "--net")];

/// Rewrites legacy single-dash words so clap does not read them as bundled short flags.
///
/// Everything after a `--` separator is left alone so files can still be named `-old`.
fn normalize_legacy_flags<I>(args: I) -> Vec<std::ffi::OsString>
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    let mut after_separator = false;
    args.into_iter()
        .map(|arg| {
            if after_separator {
                return arg;
            }
            if arg == "--" {
                after_separator = true;
                return arg;
            }
            LEGACY_FLAGS
                .iter()
                .find(|(legacy, _)| arg == *legacy)
                .map_or(arg, |(_, long)| std::ffi::OsString::from(long))
        })
        .collect()
}

#[instrument]
fn run_copy(args: Args) -> Result<copy::Summary> {
    let resolved = path::resolve(&args.src, &args.dst)?;
    let chunk_config = common::ChunkConfig {
        chunk_size: args.chunk_size.map(|size| size.as_u64()),
        network: args.network,
    };
    let settings = chunk_config.settings_for(&resolved.src, &resolved.dst)?;
    let mode = if args.old {
        palette::DisplayMode::Legacy
    } else {
        palette::DisplayMode::Unicode
    };
    let style = palette::Style::for_mode(mode);
    let renderer = progress::Renderer::new(&style, terminal::detect_bar_width());
    let mut out = std::io::stdout().lock();
    if let Err(error) = writeln!(
        out,
        "Copying {} -> {}",
        resolved.src.display(),
        resolved.dst.display()
    ) {
        tracing::debug!("failed writing banner: {}", &error);
    }
    let clock = clock::MonotonicClock::start();
    let mut engine = copy::Engine::new(settings, &clock, renderer, out);
    let summary = engine.copy_file(&resolved.src, &resolved.dst)?;
    Ok(summary)
}

fn main() -> Result<()> {
    let args = match Args::try_parse_from(normalize_legacy_flags(std::env::args_os())) {
        Ok(args) => args,
        Err(error) => {
            // --help and --version go to stdout and are not failures
            let code = i32::from(error.use_stderr());
            if let Err(print_error) = error.print() {
                eprintln!("{print_error}");
            }
            std::process::exit(code);
        }
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    let func = {
        let args = args.clone();
        || run_copy(args)
    };
    if common::run(output, func).is_none() {
        std::process::exit(1);
    }
    Ok(())
}
