//! Bandcamp Fetcher Library
//!
//! Downloads albums and whole discographies from Bandcamp pages: resolves
//! artist pages into releases, probes file sizes, downloads tracks and cover
//! art concurrently with retries, tags the results and supports cooperative
//! cancellation at any point.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
