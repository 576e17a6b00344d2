use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shutterbox")]
#[command(author, version, about = "Photo library sync and derivative rendering")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize the configured roots into the catalogue
    Sync {
        /// Remove records of files that no longer exist (full sync)
        #[arg(long)]
        cleanup: bool,

        /// Reprocess every file, even unchanged ones
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration file
    Validate,

    /// Render the configured derivatives of one image
    Render {
        /// Image id
        #[arg(long)]
        image: String,
    },

    /// List recent sync runs
    Runs {
        /// Number of runs to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}
