//! Ingestion monitor
//!
//! The polling decision is a pure function of the current state and the last
//! observed status (`transition`). `IngestionMonitor` wraps it with a poll
//! schedule that a tick-driven front end advances by calling `poll_if_due`.
//!
//! States:
//! - `Idle`: nothing started from here. One priming fetch adopts a job that is
//!   already running on the server.
//! - `Polling`: re-fetch every `poll_interval` until the job completes or fails.
//! - `Complete` / `Failed`: no further requests until the next `start`.

use std::time::Duration;

use tokio::time::Instant;

use crate::cache::ResourceKey;
use crate::error::{ApiError, ApiResult};
use crate::queries::DriveQueries;
use crate::state::IngestionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Idle,
    Polling,
    Complete,
    Failed,
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MonitorState::Complete | MonitorState::Failed)
    }
}

/// Next state and the delay until the next poll (`None` stops polling)
pub fn transition(
    state: MonitorState,
    status: &IngestionStatus,
    poll_interval: Duration,
) -> (MonitorState, Option<Duration>) {
    // Only an explicit start leaves a terminal state
    if state.is_terminal() {
        return (state, None);
    }

    if status.is_failed() {
        (MonitorState::Failed, None)
    } else if status.is_complete() {
        (MonitorState::Complete, None)
    } else if state == MonitorState::Polling || status.is_ingesting {
        (MonitorState::Polling, Some(poll_interval))
    } else {
        (MonitorState::Idle, None)
    }
}

/// What the front end renders for the ingestion panel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorSnapshot {
    pub state: MonitorState,
    pub status: Option<IngestionStatus>,
    /// Last failed status request; cleared by the next successful one
    pub fetch_error: Option<ApiError>,
}

impl MonitorSnapshot {
    pub fn progress_percent(&self) -> Option<f64> {
        self.status.as_ref().and_then(IngestionStatus::progress_percent)
    }

    /// Error text reported by the server for a failed job
    pub fn job_error(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.error.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(String),
    /// The server already had a job running; we follow that one
    AlreadyRunning(String),
}

pub struct IngestionMonitor {
    queries: DriveQueries,
    poll_interval: Duration,
    next_poll_at: Option<Instant>,
    observed: bool,
    snapshot: MonitorSnapshot,
}

impl IngestionMonitor {
    pub fn new(queries: DriveQueries) -> Self {
        let poll_interval = queries.cache().policy().ingestion_poll;
        Self {
            queries,
            poll_interval,
            next_poll_at: Some(Instant::now()),
            observed: true,
            snapshot: MonitorSnapshot::default(),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.snapshot.state
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.clone()
    }

    pub fn next_poll_at(&self) -> Option<Instant> {
        self.next_poll_at
    }

    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// Polling only runs while someone is looking at the progress
    pub fn set_observed(&mut self, observed: bool) {
        if observed == self.observed {
            return;
        }
        self.observed = observed;
        tracing::debug!(observed, "ingestion monitor visibility changed");

        // Coming back to an Idle monitor that never saw a status: prime again
        let unprimed = self.snapshot.state == MonitorState::Idle && self.snapshot.status.is_none();
        if observed && unprimed && self.next_poll_at.is_none() {
            self.next_poll_at = Some(Instant::now());
        }
    }

    /// Ask the server to ingest the drive and start following the job.
    ///
    /// A server refusal because a job is already running still switches to
    /// polling. Transport failures leave the state untouched.
    pub async fn start(&mut self) -> ApiResult<StartOutcome> {
        let outcome = match self.queries.client().start_ingestion().await {
            Ok(response) => StartOutcome::Started(response.message),
            Err(ApiError::Status { status: 400, detail }) => StartOutcome::AlreadyRunning(detail),
            Err(err) => {
                tracing::warn!(error = %err, "failed to start ingestion");
                return Err(err);
            }
        };

        // Whatever terminal snapshot is cached belongs to the previous job
        self.queries.cache().invalidate(&ResourceKey::IngestionStatus);
        self.next_poll_at = Some(Instant::now());
        self.snapshot.state = MonitorState::Polling;
        self.snapshot.fetch_error = None;
        tracing::info!(?outcome, "ingestion started");
        Ok(outcome)
    }

    /// Fetch the status if a poll is due at `now` and the monitor is observed.
    /// Returns the new state when a request was made.
    pub async fn poll_if_due(&mut self, now: Instant) -> Option<MonitorState> {
        if !self.observed {
            return None;
        }
        match self.next_poll_at {
            Some(due) if due <= now => {}
            _ => return None,
        }

        let previous = self.state();
        match self.queries.ingestion_status().await {
            Ok(status) => {
                let (next, delay) = transition(previous, &status, self.poll_interval);
                self.next_poll_at = delay.map(|d| now + d);
                if next != previous {
                    tracing::info!(from = ?previous, to = ?next, "ingestion monitor transition");
                }
                self.snapshot = MonitorSnapshot {
                    state: next,
                    status: Some(status),
                    fetch_error: None,
                };
                Some(next)
            }
            Err(err) => {
                // Retry on the next natural poll; an unprimed Idle monitor waits
                // for the next interaction instead
                self.next_poll_at = match previous {
                    MonitorState::Polling => Some(now + self.poll_interval),
                    _ => None,
                };
                self.snapshot.fetch_error = Some(err);
                Some(previous)
            }
        }
    }
}
