use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Language to translate into (overrides pipeline.target_language)
    #[arg(short, long, global = true)]
    pub target_lang: Option<String>,

    /// Eligible source track languages, comma-separated (overrides pipeline.source_languages)
    #[arg(short, long, global = true)]
    pub source_langs: Option<String>,

    /// Maximum cues per backend call
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Delay between batches in milliseconds
    #[arg(long, global = true)]
    pub batch_interval_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate the embedded subtitles of a single media file
    Process {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for subtitle files (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Translate all media files found below a directory
    Batch {
        /// Input directory, scanned recursively
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory for subtitle files (defaults to each file's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List the text subtitle tracks of a media file
    Tracks {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "subtrans.toml")]
        output: PathBuf,
    },
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(target) = &self.target_lang {
            config.pipeline.target_language = target.trim().to_string();
        }
        if let Some(sources) = &self.source_langs {
            config.pipeline.source_languages = sources
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(batch_size) = self.batch_size {
            config.pipeline.batch_size = batch_size;
        }
        if let Some(interval) = self.batch_interval_ms {
            config.pipeline.batch_interval_ms = interval;
        }
    }
}
