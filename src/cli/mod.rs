//! Command-line interface components
//!
//! This module contains CLI-specific code for the Bandcamp Fetcher
//! application: argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, DownloadArgs, GlobalArgs};
pub use commands::{handle_config, handle_download};
pub use progress::{DisplayReport, ProgressConfig, ProgressDisplay};
