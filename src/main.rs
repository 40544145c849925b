use clap::{ArgAction, Parser, Subcommand};
use smartmp3mgr::commands;
use smartmp3mgr::config::Config;
use smartmp3mgr::progress::{NoProgress, ProgressFactory, TerminalProgress};
use smartmp3mgr::tracks::FileTagReader;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smartmp3mgr")]
#[command(about = "Find and catalog MP3 files by the content of their audio", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file. Defaults to <config dir>/smartmp3mgr/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More logging; repeat for more detail. RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Never draw a progress bar.
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content hash of each file (directories are expanded)
    Sum {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Record every MP3 under a directory in the catalog
    Record {
        #[arg(long)]
        directory: PathBuf,
        /// Path to the SQLite catalog
        #[arg(long = "dbPath", alias = "db-path")]
        db_path: Option<PathBuf>,
        /// Re-read files that are already in the catalog
        #[arg(long)]
        reparse: bool,
        /// Number of files processed in parallel
        #[arg(long)]
        dop: Option<usize>,
    },
    /// List MP3s under a directory whose audio is not in the catalog yet
    FindNew {
        #[arg(long)]
        directory: PathBuf,
        /// Path to the SQLite catalog
        #[arg(long = "dbPath", alias = "db-path")]
        db_path: Option<PathBuf>,
        /// Ignore cached fingerprints and hash every file again
        #[arg(long)]
        rehash: bool,
        /// Number of files processed in parallel
        #[arg(long)]
        dop: Option<usize>,
        /// Print the folders containing new songs instead of the songs
        #[arg(long = "fo", alias = "folders-only")]
        folders_only: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("smartmp3mgr: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> smartmp3mgr::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Sum { paths } => commands::sum(&mut out, &paths)?,
        Commands::Record {
            directory,
            db_path,
            reparse,
            dop,
        } => {
            let config = Config::parse(cli.config.as_deref())?;
            let options = config.record_options(directory, db_path, reparse, dop);
            let progress = progress_for(&config, cli.no_progress);
            commands::record(&mut out, options, &FileTagReader, progress)?;
        }
        Commands::FindNew {
            directory,
            db_path,
            rehash,
            dop,
            folders_only,
        } => {
            let config = Config::parse(cli.config.as_deref())?;
            let options = config.find_new_options(directory, db_path, rehash, dop, folders_only);
            let progress = progress_for(&config, cli.no_progress);
            commands::find_new(&mut out, options, progress)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn progress_for(config: &Config, no_progress: bool) -> &'static dyn ProgressFactory {
    if config.progress && !no_progress {
        &TerminalProgress
    } else {
        &NoProgress
    }
}
