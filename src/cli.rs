use clap::Parser;
use std::path::PathBuf;

use crate::config::ViewParams;
use crate::error::ConfigError;

/// Collapsible tree view of the paths in a URL list
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// CSV or text file with one URL per row
    #[arg(value_name = "FILE")]
    pub file_path: Option<PathBuf>,

    /// Deepest level shown (0-10, default 8)
    #[arg(short = 'd', long = "depth", value_name = "N")]
    pub depth: Option<u32>,

    /// Distance between sibling nodes (0-50, default 20)
    #[arg(short = 's', long = "spacing", value_name = "PX")]
    pub spacing: Option<f32>,

    /// Load view parameters from a JSON file; --depth/--spacing override it
    #[arg(short = 'p', long = "params", value_name = "JSON")]
    pub params: Option<PathBuf>,

    /// Print the tree as JSON and exit
    #[arg(long = "dump")]
    pub dump: bool,

    /// Reload the file whenever it changes on disk
    #[arg(short = 'w', long = "watch")]
    pub watch: bool,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Write log output to this file instead of stderr
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Parameter file (if any) with command-line overrides on top
    pub fn view_params(&self) -> Result<ViewParams, ConfigError> {
        let base = match &self.params {
            Some(path) => ViewParams::load(path)?,
            None => ViewParams::default(),
        };
        Ok(base.with_overrides(self.depth, self.spacing))
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Install the global logger.
///
/// With `--log` output goes to that file at the verbosity level. Otherwise it
/// goes to stderr (respecting `RUST_LOG`) when `console` is set, and nowhere
/// when it is not.
pub fn init_logging(args: &Args, console: bool) -> std::io::Result<()> {
    if let Some(log_path) = &args.log_file {
        let file = std::fs::File::create(log_path)?;
        env_logger::Builder::new()
            .filter_level(args.log_level())
            .filter_module("egui", log::LevelFilter::Info)
            .filter_module("eframe", log::LevelFilter::Info)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        log::info!(
            "Logging to file: {} (level: {:?})",
            log_path.display(),
            args.log_level()
        );
    } else if console {
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("egui", log::LevelFilter::Info)
            .filter_module("eframe", log::LevelFilter::Info)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}
