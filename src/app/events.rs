//! Outbound event channel
//!
//! The download pipeline never talks to a user interface directly. It publishes
//! [`SessionEvent`]s on an unbounded channel; whoever holds the receiver (the
//! CLI progress display, a test) consumes them. Every log entry is mirrored to
//! `tracing` as well, so the channel can be discarded without losing logs.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::progress::{ProgressMode, ProgressSnapshot};

/// `tracing` target of mirrored log entries
///
/// Frontends that print events themselves can filter this target out.
pub const EVENT_LOG_TARGET: &str = "bandcamp_fetcher::events";

/// Severity/category of a user-facing log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Info,
    VerboseInfo,
    IntermediateSuccess,
    Success,
    Warning,
    Error,
}

/// Event published by the download pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A log entry for the user
    Log { kind: LogKind, message: String },
    /// Progress maximum is known; transfers are about to start
    ProgressStarted {
        total_units: usize,
        total_expected_bytes: u64,
        mode: ProgressMode,
    },
    /// Aggregate progress after a unit reported bytes or completed
    Progress(ProgressSnapshot),
    /// Downloads started (`true`) or stopped (`false`)
    ControlStateChanged { downloading: bool },
    /// Request a notification sound
    PlaySound,
}

/// Receiving half of the event channel
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Cloneable publishing handle for session events
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSender {
    /// Creates a connected sender/receiver pair
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Sender that only mirrors logs to `tracing`
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Publishes an event; a dropped receiver is not an error
    pub fn send(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("Event receiver dropped, event discarded");
            }
        }
    }

    /// Publishes a log entry and mirrors it to `tracing`
    pub fn log(&self, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            LogKind::Error => error!(target: EVENT_LOG_TARGET, "{}", message),
            LogKind::Warning => warn!(target: EVENT_LOG_TARGET, "{}", message),
            LogKind::VerboseInfo => debug!(target: EVENT_LOG_TARGET, "{}", message),
            LogKind::Info | LogKind::IntermediateSuccess | LogKind::Success => {
                info!(target: EVENT_LOG_TARGET, "{}", message)
            }
        }
        self.send(SessionEvent::Log { kind, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogKind::Info, message);
    }

    pub fn verbose(&self, message: impl Into<String>) {
        self.log(LogKind::VerboseInfo, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogKind::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogKind::Error, message);
    }
}
