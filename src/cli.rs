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

    /// Skip backend availability checks
    #[arg(long)]
    pub skip_checks: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate translated subtitles for a single video file
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Target language code (defaults to the configured one)
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Translation method: GoogleTrans or Argos
        #[arg(short, long)]
        method: Option<String>,

        /// Output directory for subtitle files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Generate translated subtitles for every video in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Target language code (defaults to the configured one)
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Translation method: GoogleTrans or Argos
        #[arg(short, long)]
        method: Option<String>,

        /// Output directory for subtitle files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of videos processed at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Extract audio from video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Transcribe audio to an SRT file
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: PathBuf,

        /// Source language hint
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate an SRT file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output translated file
        #[arg(short, long)]
        output: PathBuf,

        /// Target language code (defaults to the configured one)
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Translation method: GoogleTrans or Argos
        #[arg(short, long)]
        method: Option<String>,
    },

    /// Manage local translation packages
    Packages {
        #[command(subcommand)]
        action: PackagesAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum PackagesAction {
    /// List installed translation packages
    List,

    /// Install the configured language pairs that are missing
    Install,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Destination file
        #[arg(short, long, default_value = "subflow.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
