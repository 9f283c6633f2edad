use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};

pub mod commands;

use self::commands::{AddArgs, ListArgs, RemoveArgs, SearchArgs, ShowArgs, TuiArgs};

const LOG_FILE_NAME: &str = "flatnotes.log";

#[derive(Parser, Debug)]
#[command(
    name = "flatnotes",
    version,
    about = "Plain-text notes kept in a single flat file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over FLATNOTES_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over FLATNOTES_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log filter, either a level (trace, debug, info, warn, error) or RUST_LOG-style directives
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive interface (default)
    Tui(TuiArgs),
    /// Print note titles in file order
    List(ListArgs),
    /// Print the body of one note
    Show(ShowArgs),
    /// Add a note to a notes file
    Add(AddArgs),
    /// Remove a note from a notes file
    Remove(RemoveArgs),
    /// Search titles and bodies, case-insensitively
    Search(SearchArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli
        .command
        .unwrap_or(Commands::Tui(TuiArgs { file: None }));
    let log_target = match command {
        Commands::Tui(_) => LogTarget::File(paths.log_dir.join(LOG_FILE_NAME)),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, &log_target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = Arc::new(loader.load_or_init()?);
    tracing::debug!(config = %paths.config_file.display(), "configuration loaded");

    match command {
        Commands::Tui(args) => commands::run_tui(config, args),
        Commands::List(args) => commands::list_notes(&config, args),
        Commands::Show(args) => commands::show_note(&config, args),
        Commands::Add(args) => commands::add_note(&config, args),
        Commands::Remove(args) => commands::remove_note(&config, args),
        Commands::Search(args) => commands::search_notes(&config, args),
    }
}

enum LogTarget {
    Stderr,
    /// The interface owns the terminal, so its logs go to a file.
    File(PathBuf),
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            LogTarget::File(path) => {
                let file = open_log_file(path)?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
        }
        Ok(())
    })
    .map(|_| ())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
