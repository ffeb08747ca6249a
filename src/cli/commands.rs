//! Command handlers for the CLI
//!
//! Each handler receives the parsed arguments plus the loaded [`AppConfig`]
//! and returns an application [`Result`]; `main` turns errors into exit
//! code 1.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::app::{
    AlbumOutcome, Collaborators, Coordinator, EventSender, SessionSummary, SignalHandler,
    WebClient,
};
use crate::cli::args::{ConfigAction, ConfigArgs, DownloadArgs, GlobalArgs};
use crate::cli::progress::{ProgressConfig, ProgressDisplay};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the download command
pub async fn handle_download(
    args: DownloadArgs,
    global: &GlobalArgs,
    app_config: &AppConfig,
) -> Result<()> {
    args.validate().map_err(AppError::Input)?;

    let input = collect_input(&args).await?;

    let (session_config, client_config) = app_config.to_runtime_config();
    let session_config = args.apply_overrides(session_config);
    session_config.validate()?;
    info!(
        "Downloading to {} with up to {} tries per file",
        session_config.downloads_location, session_config.download_max_tries
    );

    let client = Arc::new(WebClient::with_config(&client_config)?);

    let (events, rx) = EventSender::channel();
    let display = ProgressDisplay::new(ProgressConfig {
        enable_progress_bars: !global.quiet,
        enable_colors: app_config.logging.colored_output,
        show_verbose: global.verbose || global.very_verbose,
        play_sound: !global.quiet,
    })
    .spawn(rx);

    let coordinator = Coordinator::new(session_config, Collaborators::web(client), events);
    let signals = SignalHandler::new(coordinator.cancel_handle()).setup();

    let result = coordinator.run(&input).await;

    signals.abort();
    // Closing the last sender ends the display task
    drop(coordinator);
    let report = match display.await {
        Ok(report) => report,
        Err(e) => {
            warn!("Progress display task failed: {}", e);
            Default::default()
        }
    };

    let summary = result?;
    print_summary(&summary, global.quiet);
    if report.errors > 0 {
        info!(
            "{} errors and {} warnings reported",
            report.errors, report.warnings
        );
    }

    if summary.cancelled || summary.is_success() {
        Ok(())
    } else {
        Err(AppError::generic(format!(
            "{} of {} albums were not fully downloaded",
            summary.albums.len() - summary.complete_count(),
            summary.albums.len()
        )))
    }
}

/// Joins positional URLs and the contents of `--input`
async fn collect_input(args: &DownloadArgs) -> Result<String> {
    let mut input = args.urls.join("\n");

    if let Some(path) = &args.input {
        let content = read_input_file(path).await?;
        if !input.is_empty() {
            input.push('\n');
        }
        input.push_str(&content);
    }

    Ok(input)
}

async fn read_input_file(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        tokio::io::stdin().read_to_string(&mut content).await?;
        return Ok(content);
    }

    tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Input(format!("cannot read URL list {}: {}", path.display(), e))
    })
}

fn print_summary(summary: &SessionSummary, quiet: bool) {
    if quiet {
        return;
    }

    println!();
    for album in &summary.albums {
        match album.outcome {
            AlbumOutcome::Complete => {}
            AlbumOutcome::Partial { downloaded, total } => println!(
                "  Partial: \"{}\" by {} ({} of {} files)",
                album.title, album.artist, downloaded, total
            ),
            AlbumOutcome::NotAttempted => println!(
                "  Not attempted: \"{}\" by {}",
                album.title, album.artist
            ),
        }
    }
    println!("{}", summary.summary());
}

/// Handle the config command
pub async fn handle_config(
    args: ConfigArgs,
    global: &GlobalArgs,
    app_config: &AppConfig,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let target = path.or_else(|| global.config.clone());
            let written = AppConfig::write_default_config(target, force).await?;
            println!("Created configuration file: {}", written.display());
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", app_config.to_toml_string()?);
            Ok(())
        }
    }
}
