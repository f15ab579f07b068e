use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Analyzer provider override (gemini, ollama)
    #[arg(long)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze an SRT file and list suspected spelling errors
    Check {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Analyze an SRT file and fix flagged errors interactively
    Review {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Corrected output file (default: corrected_<input name>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Video the subtitles belong to, shown with seek positions
        #[arg(long)]
        video: Option<PathBuf>,
    },

    /// Parse and rewrite an SRT file in canonical form
    Format {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Manage the analyzer API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum KeyAction {
    /// Store an API key
    Set {
        /// The API key value
        value: String,
    },

    /// Delete the stored API key
    Remove,

    /// Show whether an API key is available
    Status,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Destination file
        #[arg(short, long, default_value = "srtfix.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
