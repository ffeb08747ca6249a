//! Aggregate transfer progress
//!
//! [`ProgressAggregator`] owns the session's download units. Fetch tasks never
//! touch unit fields directly: they report `(url, bytes so far)` and completion
//! through the aggregator, which updates the unit and recomputes the totals
//! inside one critical section, then publishes a [`ProgressSnapshot`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::events::{EventSender, SessionEvent};
use crate::app::models::DownloadUnit;
use crate::constants::progress::THROUGHPUT_INTERVAL;

/// How overall completion is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressMode {
    /// Every unit has a known size: completion is bytes received / expected
    Bytes,
    /// At least one size is unknown: completion is units downloaded / total
    Units,
}

/// Point-in-time view of the session's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_received_bytes: u64,
    pub total_expected_bytes: u64,
    pub downloaded_unit_count: usize,
    pub total_unit_count: usize,
    /// Last computed throughput; 0 until a second sample is available
    pub bytes_per_second: f64,
    pub mode: ProgressMode,
    pub timestamp: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Completion ratio in `[0, 1]` according to the progress mode
    pub fn fraction(&self) -> f64 {
        let (done, total) = match self.mode {
            ProgressMode::Bytes => (self.total_received_bytes as f64, self.total_expected_bytes as f64),
            ProgressMode::Units => (self.downloaded_unit_count as f64, self.total_unit_count as f64),
        };
        if total <= 0.0 {
            0.0
        } else {
            (done / total).clamp(0.0, 1.0)
        }
    }
}

/// Throughput computed from byte totals sampled at least `interval` apart
///
/// The first sample only establishes the baseline.
#[derive(Debug, Clone)]
pub struct ThroughputSampler {
    interval: Duration,
    baseline: Option<(Instant, u64)>,
    bytes_per_second: f64,
}

impl ThroughputSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            baseline: None,
            bytes_per_second: 0.0,
        }
    }

    /// Feeds a new total and returns the current throughput
    pub fn sample(&mut self, now: Instant, total_bytes: u64) -> f64 {
        match self.baseline {
            None => self.baseline = Some((now, total_bytes)),
            Some((at, bytes)) => {
                let elapsed = now.saturating_duration_since(at);
                if elapsed >= self.interval && !elapsed.is_zero() {
                    self.bytes_per_second =
                        total_bytes.saturating_sub(bytes) as f64 / elapsed.as_secs_f64();
                    self.baseline = Some((now, total_bytes));
                }
            }
        }
        self.bytes_per_second
    }

    pub fn bytes_per_second(&self) -> f64 {
        self.bytes_per_second
    }
}

struct ProgressState {
    units: Vec<DownloadUnit>,
    index: HashMap<String, usize>,
    sampler: ThroughputSampler,
}

impl ProgressState {
    fn unit_mut(&mut self, url: &str) -> Option<&mut DownloadUnit> {
        let index = *self.index.get(url)?;
        self.units.get_mut(index)
    }

    fn unit(&self, url: &str) -> Option<&DownloadUnit> {
        self.index.get(url).and_then(|&index| self.units.get(index))
    }

    fn snapshot(&self, mode: ProgressMode, bytes_per_second: f64) -> ProgressSnapshot {
        ProgressSnapshot {
            total_received_bytes: self.units.iter().map(|u| u.bytes_received).sum(),
            total_expected_bytes: self.units.iter().map(|u| u.expected_size).sum(),
            downloaded_unit_count: self.units.iter().filter(|u| u.downloaded).count(),
            total_unit_count: self.units.len(),
            bytes_per_second,
            mode,
            timestamp: Utc::now(),
        }
    }
}

/// Thread-safe owner of the session's download units
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
    mode: ProgressMode,
    events: EventSender,
}

impl ProgressAggregator {
    /// Takes ownership of the planned units
    ///
    /// Units must have unique URLs; later duplicates are ignored for lookups.
    pub fn new(units: Vec<DownloadUnit>, events: EventSender) -> Self {
        let mut index = HashMap::with_capacity(units.len());
        for (position, unit) in units.iter().enumerate() {
            index.entry(unit.url.clone()).or_insert(position);
        }

        let mode = if !units.is_empty() && units.iter().all(DownloadUnit::is_sized) {
            ProgressMode::Bytes
        } else {
            ProgressMode::Units
        };

        Self {
            state: Mutex::new(ProgressState {
                units,
                index,
                sampler: ThroughputSampler::new(THROUGHPUT_INTERVAL),
            }),
            mode,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Records the bytes received so far for a unit's current attempt
    ///
    /// The stored value never decreases and never exceeds a known expected
    /// size. Returns the resulting snapshot, or `None` for unknown or already
    /// downloaded units.
    pub fn record(&self, url: &str, bytes_received: u64) -> Option<ProgressSnapshot> {
        self.record_at(url, bytes_received, Instant::now())
    }

    fn record_at(&self, url: &str, bytes_received: u64, now: Instant) -> Option<ProgressSnapshot> {
        let snapshot = {
            let mut state = self.lock();
            let Some(unit) = state.unit_mut(url) else {
                debug!("Progress reported for unknown unit {}", url);
                return None;
            };
            if unit.downloaded {
                return None;
            }
            let bounded = clamp_to_expected(bytes_received, unit.expected_size);
            unit.bytes_received = unit.bytes_received.max(bounded);

            let total: u64 = state.units.iter().map(|u| u.bytes_received).sum();
            let bytes_per_second = state.sampler.sample(now, total);
            state.snapshot(self.mode, bytes_per_second)
        };

        self.events.send(SessionEvent::Progress(snapshot.clone()));
        Some(snapshot)
    }

    /// Marks a unit downloaded with its final byte count
    ///
    /// Returns `false` if the unit is unknown or was already marked, so the
    /// flag is only ever set once.
    pub fn mark_downloaded(&self, url: &str, final_bytes: u64) -> bool {
        let snapshot = {
            let mut state = self.lock();
            let Some(unit) = state.unit_mut(url) else {
                return false;
            };
            if unit.downloaded {
                return false;
            }
            let bounded = clamp_to_expected(final_bytes, unit.expected_size);
            unit.bytes_received = unit.bytes_received.max(bounded);
            unit.downloaded = true;

            let bytes_per_second = state.sampler.bytes_per_second();
            state.snapshot(self.mode, bytes_per_second)
        };

        self.events.send(SessionEvent::Progress(snapshot));
        true
    }

    pub fn is_downloaded(&self, url: &str) -> bool {
        self.lock().unit(url).is_some_and(|u| u.downloaded)
    }

    /// Probed size of a unit, 0 when unknown
    pub fn expected_size(&self, url: &str) -> u64 {
        self.lock().unit(url).map_or(0, |u| u.expected_size)
    }

    /// Current aggregate view
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        state.snapshot(self.mode, state.sampler.bytes_per_second())
    }

    /// Copy of every unit's current state
    pub fn units(&self) -> Vec<DownloadUnit> {
        self.lock().units.clone()
    }
}

fn clamp_to_expected(bytes: u64, expected_size: u64) -> u64 {
    if expected_size > 0 {
        bytes.min(expected_size)
    } else {
        bytes
    }
}
