//! Bandcamp Fetcher CLI application
//!
//! Command-line interface for downloading albums and discographies from
//! Bandcamp with concurrent transfers, retries and progress display.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use bandcamp_fetcher::app::events::EVENT_LOG_TARGET;
use bandcamp_fetcher::cli::{handle_config, handle_download, Cli, Commands};
use bandcamp_fetcher::config::{AppConfig, LoggingConfig};
use bandcamp_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let app_config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &app_config.logging);

    info!("Bandcamp Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, &cli.global, &app_config).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args, &cli.global, &app_config).await
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the config file level
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let log_level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| logging.level.clone());

    let mut filter = EnvFilter::from_default_env();
    match format!("bandcamp_fetcher={}", log_level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level {:?}: {}", log_level, e),
    }
    // Session log entries are already printed by the progress display
    if !cli.global.very_verbose {
        if let Ok(directive) = format!("{}=off", EVENT_LOG_TARGET).parse() {
            filter = filter.add_directive(directive);
        }
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
