//! Command-line argument parsing for Bandcamp Fetcher
//!
//! This module defines the CLI structure using clap derive macros: the
//! `download` command with its per-run overrides and `config` management.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::SessionConfig;

/// Bandcamp Fetcher - Download albums and discographies from Bandcamp
#[derive(Parser, Debug)]
#[command(
    name = "bandcamp_fetcher",
    version,
    about = "Download albums and discographies from Bandcamp",
    long_about = "Downloads every track and cover art of Bandcamp albums, optionally expanding artist pages into their full discography.
Features concurrent downloads, automatic retries with exponential cooldown, size probing, MP3 tagging and clean cancellation with Ctrl-C."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging and detailed download messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download albums, tracks or discographies
    Download(DownloadArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the download command
#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Album, track or artist page URLs
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Read URLs from a file, one per line ("-" reads standard input)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Download the whole discography of each artist
    #[arg(short, long)]
    pub discography: bool,

    /// Download albums one after the other
    #[arg(long)]
    pub one_album_at_a_time: bool,

    /// Skip size probing (progress is counted in files)
    #[arg(long)]
    pub no_file_sizes: bool,

    /// Attempts per file
    #[arg(long, value_name = "N")]
    pub max_tries: Option<u32>,

    /// Album folder template, e.g. "~/Music/{artist}/{year} - {album}"
    #[arg(short, long, value_name = "TEMPLATE")]
    pub location: Option<String>,

    /// Track file name template, e.g. "{tracknum} {title}.mp3"
    #[arg(long, value_name = "TEMPLATE")]
    pub filename_format: Option<String>,

    /// Do not write album and track metadata
    #[arg(long)]
    pub no_tags: bool,

    /// Keep the cover art file in the album folder
    #[arg(long)]
    pub cover_in_folder: bool,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Target path (defaults to the user config location)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    ///
    /// `None` when no verbosity flag was given, leaving the choice to the
    /// configuration file.
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl DownloadArgs {
    /// Checks the argument combination
    pub fn validate(&self) -> Result<(), String> {
        if self.urls.is_empty() && self.input.is_none() {
            return Err("Provide at least one URL or --input FILE".to_string());
        }

        if self.max_tries == Some(0) {
            return Err("--max-tries must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Applies the command-line overrides on top of the file configuration
    pub fn apply_overrides(&self, mut config: SessionConfig) -> SessionConfig {
        if self.discography {
            config.download_artist_discography = true;
        }
        if self.one_album_at_a_time {
            config.download_one_album_at_a_time = true;
        }
        if self.no_file_sizes {
            config.retrieve_file_sizes = false;
        }
        if let Some(max_tries) = self.max_tries {
            config.download_max_tries = max_tries;
        }
        if let Some(location) = &self.location {
            config.downloads_location = location.clone();
        }
        if let Some(format) = &self.filename_format {
            config.filename_format = format.clone();
        }
        if self.no_tags {
            config.tag_tracks = false;
        }
        if self.cover_in_folder {
            config.save_cover_art_in_folder = true;
        }
        config
    }
}
