//! CLI mode for ripvgm - command-line interface for downloading soundtrack albums.

mod progress;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use console::style;

use crate::{AppConfig, Coordinator, DownloadProgress, FetchMode};

pub use progress::{BarProgress, print_album_report, print_summary};

/// Options gathered from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Album URLs, names, or files listing them.
    pub inputs: Vec<String>,
    /// `-F`: prefer lossless assets.
    pub prefer_flac: bool,
    /// `-Pe` or `-Pa`, whichever came last.
    pub mode: Option<FetchMode>,
    /// `-o`: root folder for album folders.
    pub output_dir: Option<PathBuf>,
    /// `-c`: explicit config file.
    pub config_file: Option<PathBuf>,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Download(CliArgs),
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns a message for unknown flags or flags missing their value.
pub fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-F" | "--prefer-flac" => parsed.prefer_flac = true,
            "-Pe" | "--perpendicular" => parsed.mode = Some(FetchMode::Sequential),
            "-Pa" | "--parallel" => parsed.mode = Some(FetchMode::FanOut),
            "-o" | "--output" => {
                let dir = args.next().ok_or("--output requires a directory")?;
                parsed.output_dir = Some(PathBuf::from(dir));
            }
            "-c" | "--config" => {
                let file = args.next().ok_or("--config requires a file")?;
                parsed.config_file = Some(PathBuf::from(file));
            }
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown option: {flag}"));
            }
            _ => parsed.inputs.push(arg),
        }
    }

    if parsed.inputs.is_empty() {
        return Err("at least one album is required".to_string());
    }
    Ok(Command::Download(parsed))
}

/// Prints usage information to stderr.
pub fn print_usage() {
    eprintln!("Usage: ripvgm [OPTIONS] <album>...");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <album>               Album URL, album name, or a file listing either");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -F, --prefer-flac     Download FLAC when the track offers it");
    eprintln!("  -Pe, --perpendicular  Fetch the tracks of an album one at a time");
    eprintln!("  -Pa, --parallel       Fetch all tracks of an album at once (default)");
    eprintln!("  -o, --output <DIR>    Folder album folders are created in (default: .)");
    eprintln!("  -c, --config <FILE>   Read settings from FILE");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG              Log filter (default: warn)");
}

/// Loads the config file and applies command-line overrides on top of it.
///
/// # Errors
///
/// Returns [`crate::Error::Config`] if the config file is unreadable or invalid.
pub fn resolve_config(args: &CliArgs) -> crate::Result<AppConfig> {
    let mut config = AppConfig::load(args.config_file.as_deref())?;
    if args.prefer_flac {
        config.download.prefer_flac = true;
    }
    if let Some(mode) = args.mode {
        config.download.mode = mode;
    }
    if let Some(dir) = &args.output_dir {
        config.paths.output_dir.clone_from(dir);
    }
    Ok(config)
}

/// Downloads every album named by `args`.
///
/// # Errors
///
/// Returns the first error that stops the run.
pub async fn run_download(args: &CliArgs) -> crate::Result<()> {
    let config = resolve_config(args)?;
    log::debug!("Using config {config:?}");

    let bars = Arc::new(BarProgress::new());
    let sink: Arc<dyn DownloadProgress> = bars.clone();
    let coordinator = Coordinator::new(config.download, &config.paths.output_dir, sink)?;

    let summary = coordinator
        .run(&args.inputs, |report| print_album_report(&bars, report))
        .await?;

    print_summary(&summary.stats);
    Ok(())
}

/// Entry point for the `ripvgm` binary; returns the process exit code.
pub async fn run() -> i32 {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(Command::Help) => {
            print_usage();
            return 0;
        }
        Ok(Command::Download(args)) => args,
        Err(message) => {
            eprintln!("{} {message}", style("error:").red().bold());
            eprintln!();
            print_usage();
            return 2;
        }
    };

    match run_download(&args).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            1
        }
    }
}
