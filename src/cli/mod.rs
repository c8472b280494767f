//! Command-line interface for media-retag
//!
//! Provides `write`, `rename` and `tidy` subcommands plus shell completions.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cache;
mod common;
mod rename;
mod tidy;
mod write;

/// Reconcile duplicated photo/video metadata tags and derive canonical filenames
#[derive(Parser)]
#[command(name = "media-retag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile tags and write the minimal set of changes
    Write(write::WriteArgs),

    /// Rename files from their stored tags
    Rename(rename::RenameArgs),

    /// Write tags, then move one supplier account's files into artist folders
    Tidy(tidy::TidyArgs),

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Write(args) => write::run(args),
        Commands::Rename(args) => rename::run(args),
        Commands::Tidy(args) => tidy::run(args),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "media-retag", &mut std::io::stdout());
            Ok(())
        }
    }
}
