//! Global backoff window driven by rate-limit signals.

use std::time::Duration;

use tokio::time::Instant;

/// Shortest wait honored after a rate-limit signal, whatever the server says
pub const MIN_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest wait honored; larger server values are capped to this
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Clamp a server-provided retry-after into the honored range
pub fn clamp_retry_after(retry_after: Duration) -> Duration {
    retry_after.clamp(MIN_RETRY_AFTER, MAX_RETRY_AFTER)
}

/// "Resume-not-before" timestamp for the dispatch loop.
///
/// The timestamp only ever moves forward: a new signal extends the window to
/// `now + retry_after` when that is later, and is ignored otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackoffState {
    resume_at: Option<Instant>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rate-limit signal received at `now` and return the resulting
    /// resume timestamp.
    pub fn extend(&mut self, now: Instant, retry_after: Duration) -> Instant {
        let wait = clamp_retry_after(retry_after);
        let candidate = now.checked_add(wait).unwrap_or(now);
        let resume_at = match self.resume_at {
            Some(current) if current > candidate => current,
            _ => candidate,
        };
        self.resume_at = Some(resume_at);
        resume_at
    }

    pub fn resume_at(&self) -> Option<Instant> {
        self.resume_at
    }

    /// Whether a send at `now` would fall inside the window
    pub fn is_active(&self, now: Instant) -> bool {
        self.resume_at.is_some_and(|at| now < at)
    }

    /// Time left in the window, zero once it has elapsed
    pub fn remaining(&self, now: Instant) -> Duration {
        self.resume_at
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or_default()
    }
}
