//! Terminal presentation of session events
//!
//! [`ProgressDisplay`] is a pure consumer of the pipeline's event channel. On
//! a terminal it draws an indicatif bar (bytes when every size is known,
//! files otherwise) and prints coloured log lines above it; elsewhere it
//! falls back to plain lines and a periodic percentage.

use std::time::{Duration, Instant};

use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::session::summary::format_rate;
use crate::app::{EventReceiver, LogKind, ProgressMode, ProgressSnapshot, SessionEvent};

const TEXT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Draw a progress bar (only on terminals)
    pub enable_progress_bars: bool,
    /// Colour log lines (only on terminals)
    pub enable_colors: bool,
    /// Print verbose log entries
    pub show_verbose: bool,
    /// Ring the terminal bell when the run ends
    pub play_sound: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            enable_colors: true,
            show_verbose: false,
            play_sound: true,
        }
    }
}

/// Counts of problems reported during the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayReport {
    pub warnings: usize,
    pub errors: usize,
}

/// Renders session events until the channel closes
pub struct ProgressDisplay {
    config: ProgressConfig,
    is_terminal: bool,
    bar: Option<ProgressBar>,
    mode: ProgressMode,
    last_text_report: Option<Instant>,
    report: DisplayReport,
}

impl ProgressDisplay {
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        Self::with_terminal(config, is_terminal)
    }

    fn with_terminal(config: ProgressConfig, is_terminal: bool) -> Self {
        Self {
            config,
            is_terminal,
            bar: None,
            mode: ProgressMode::Units,
            last_text_report: None,
            report: DisplayReport::default(),
        }
    }

    /// Consumes events on a background task
    pub fn spawn(mut self, mut events: EventReceiver) -> JoinHandle<DisplayReport> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle_event(event);
            }
            self.finish_bar();
            self.report
        })
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Log { kind, message } => self.log(kind, &message),
            SessionEvent::ProgressStarted {
                total_units,
                total_expected_bytes,
                mode,
            } => self.start(total_units, total_expected_bytes, mode),
            SessionEvent::Progress(snapshot) => self.update(&snapshot),
            SessionEvent::ControlStateChanged { downloading } => {
                debug!("Downloading: {}", downloading);
                if !downloading {
                    self.finish_bar();
                }
            }
            SessionEvent::PlaySound => {
                if self.config.play_sound && self.is_terminal {
                    eprint!("\x07");
                }
            }
        }
    }

    fn start(&mut self, total_units: usize, total_expected_bytes: u64, mode: ProgressMode) {
        self.mode = mode;
        if !(self.config.enable_progress_bars && self.is_terminal) {
            eprintln!("Downloading {} files...", total_units);
            self.last_text_report = Some(Instant::now());
            return;
        }

        let (length, template) = match mode {
            ProgressMode::Bytes => (
                total_expected_bytes,
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ),
            ProgressMode::Units => (
                total_units as u64,
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}",
            ),
        };

        let bar = ProgressBar::new(length);
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        self.bar = Some(bar);
    }

    fn update(&mut self, snapshot: &ProgressSnapshot) {
        let position = match self.mode {
            ProgressMode::Bytes => snapshot.total_received_bytes,
            ProgressMode::Units => snapshot.downloaded_unit_count as u64,
        };

        if let Some(bar) = &self.bar {
            bar.set_position(position);
            bar.set_message(format_rate(snapshot.bytes_per_second));
            return;
        }

        if let Some(last) = self.last_text_report {
            if last.elapsed() >= TEXT_REPORT_INTERVAL {
                eprintln!(
                    "Progress: {:.1}% ({})",
                    snapshot.fraction() * 100.0,
                    format_rate(snapshot.bytes_per_second)
                );
                self.last_text_report = Some(Instant::now());
            }
        }
    }

    fn log(&mut self, kind: LogKind, message: &str) {
        match kind {
            LogKind::Warning => self.report.warnings += 1,
            LogKind::Error => self.report.errors += 1,
            _ => {}
        }
        if !should_show(kind, self.config.show_verbose) {
            return;
        }

        let colored = self.config.enable_colors && self.is_terminal;
        let line = format_log_line(kind, message, colored);
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

/// Whether a log entry is printed at the current verbosity
pub fn should_show(kind: LogKind, verbose: bool) -> bool {
    kind != LogKind::VerboseInfo || verbose
}

/// Renders one log line, coloured by severity
pub fn format_log_line(kind: LogKind, message: &str, colored: bool) -> String {
    if !colored {
        let prefix = match kind {
            LogKind::Warning => "Warning: ",
            LogKind::Error => "Error: ",
            _ => "",
        };
        return format!("{}{}", prefix, message);
    }

    match kind {
        LogKind::Info => message.to_string(),
        LogKind::VerboseInfo => message.dark_grey().to_string(),
        LogKind::IntermediateSuccess => message.green().to_string(),
        LogKind::Success => message.green().bold().to_string(),
        LogKind::Warning => message.yellow().to_string(),
        LogKind::Error => message.red().to_string(),
    }
}
