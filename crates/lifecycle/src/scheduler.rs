// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Time-based transition scheduling.
//!
//! One scheduler loop per process drives all time-based firings. The job
//! table is an in-memory derived cache keyed by `(poll_id, kind)` and is
//! never persisted: the polls table's `status`, `open_time`, and
//! `close_time` columns are the sole durable representation of scheduling
//! intent, and `restore_from_store` reconstructs the table from them at
//! startup.
//!
//! ## Invariants
//!
//! - At most one `open` job and one `close` job exist per poll; scheduling
//!   a replacement implicitly cancels the prior job of the same kind
//! - A job fires at most once; firing removes it from the table
//! - A failed fire is logged and not rescheduled; the poll stays in its
//!   prior status until the next restore pass or a manual action

use crate::error::LifecycleError;
use crate::service::{LifecycleService, TransitionReason};
use chrono::{DateTime, Utc};
use pollwarden_domain::PollStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// The kind of transition a scheduled job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Fire `open` at the poll's open time.
    Open,
    /// Fire `close` at the poll's close time.
    Close,
}

impl JobKind {
    /// Returns the lowercase name of this job kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in the in-memory job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    /// The poll the job fires for.
    pub poll_id: i64,
    /// The transition kind.
    pub kind: JobKind,
    /// The absolute instant the job is due.
    pub fire_at: DateTime<Utc>,
}

/// Summary of a `restore_from_store` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Open jobs scheduled for the future.
    pub scheduled_open: usize,
    /// Close jobs scheduled for the future.
    pub scheduled_close: usize,
    /// Overdue open transitions fired immediately.
    pub fired_open: usize,
    /// Overdue close transitions fired immediately.
    pub fired_close: usize,
    /// Immediate firings that failed (logged, not retried).
    pub failures: usize,
}

/// The scheduler: owner of the job table and the only component permitted
/// to fire time-based transitions.
pub struct SchedulerService {
    jobs: Mutex<HashMap<(i64, JobKind), DateTime<Utc>>>,
}

impl SchedulerService {
    /// Creates a scheduler with an empty job table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule (or replace) the `open` job for a poll.
    pub async fn schedule_open(&self, poll_id: i64, at: DateTime<Utc>) {
        self.schedule(poll_id, JobKind::Open, at).await;
    }

    /// Schedule (or replace) the `close` job for a poll.
    pub async fn schedule_close(&self, poll_id: i64, at: DateTime<Utc>) {
        self.schedule(poll_id, JobKind::Close, at).await;
    }

    async fn schedule(&self, poll_id: i64, kind: JobKind, at: DateTime<Utc>) {
        let mut jobs = self.jobs.lock().await;
        let replaced = jobs.insert((poll_id, kind), at).is_some();
        info!(poll_id, kind = %kind, fire_at = %at, replaced, "scheduled job");
    }

    /// Cancel a job if present; no-op if absent.
    pub async fn cancel(&self, poll_id: i64, kind: JobKind) {
        let mut jobs = self.jobs.lock().await;
        if jobs.remove(&(poll_id, kind)).is_some() {
            info!(poll_id, kind = %kind, "cancelled job");
        }
    }

    /// Cancel both jobs for a poll (administrative delete).
    pub async fn cancel_all(&self, poll_id: i64) {
        self.cancel(poll_id, JobKind::Open).await;
        self.cancel(poll_id, JobKind::Close).await;
    }

    /// The fire time of a job, if one is scheduled.
    pub async fn job_fire_time(&self, poll_id: i64, kind: JobKind) -> Option<DateTime<Utc>> {
        self.jobs.lock().await.get(&(poll_id, kind)).copied()
    }

    /// Number of jobs currently in the table.
    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Remove and return every job due at or before `now`.
    async fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        let mut jobs = self.jobs.lock().await;
        let due_keys: Vec<(i64, JobKind)> = jobs
            .iter()
            .filter(|(_, fire_at)| **fire_at <= now)
            .map(|(key, _)| *key)
            .collect();
        due_keys
            .into_iter()
            .filter_map(|key| {
                jobs.remove(&key).map(|fire_at| ScheduledJob {
                    poll_id: key.0,
                    kind: key.1,
                    fire_at,
                })
            })
            .collect()
    }

    /// Rebuild the job table from the store and fire overdue transitions.
    ///
    /// Run once at process start, before the scheduler loop and before any
    /// external trigger is accepted. Every `scheduled` poll yields an open
    /// job from its `open_time`; every `active` poll yields a close job
    /// from its `close_time`. A job already in the past fires immediately
    /// and synchronously, which is what prevents lost transitions when the
    /// process was down across a scheduled time. Each overdue poll fires
    /// independently; one failure never blocks the rest.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store cannot be read; individual fire
    /// failures are logged and counted, not propagated.
    pub async fn restore_from_store(
        &self,
        lifecycle: &LifecycleService,
    ) -> Result<RestoreSummary, LifecycleError> {
        let now = Utc::now();
        let scheduled = lifecycle.list_polls_by_status(PollStatus::Scheduled).await?;
        let active = lifecycle.list_polls_by_status(PollStatus::Active).await?;

        let mut summary = RestoreSummary::default();

        for poll in scheduled {
            if poll.open_time <= now {
                info!(poll_id = poll.poll_id, open_time = %poll.open_time, "firing overdue open on restore");
                match lifecycle
                    .open_poll(poll.poll_id, TransitionReason::Scheduled)
                    .await
                {
                    Ok(_) => summary.fired_open += 1,
                    Err(e) => {
                        summary.failures += 1;
                        error!(poll_id = poll.poll_id, error = %e, "overdue open failed on restore");
                    }
                }
            } else {
                self.schedule_open(poll.poll_id, poll.open_time).await;
                summary.scheduled_open += 1;
            }
        }

        for poll in active {
            if poll.close_time <= now {
                info!(poll_id = poll.poll_id, close_time = %poll.close_time, "firing overdue close on restore");
                match lifecycle
                    .close_poll(poll.poll_id, TransitionReason::Scheduled)
                    .await
                {
                    Ok(_) => summary.fired_close += 1,
                    Err(e) => {
                        summary.failures += 1;
                        error!(poll_id = poll.poll_id, error = %e, "overdue close failed on restore");
                    }
                }
            } else {
                self.schedule_close(poll.poll_id, poll.close_time).await;
                summary.scheduled_close += 1;
            }
        }

        info!(
            scheduled_open = summary.scheduled_open,
            scheduled_close = summary.scheduled_close,
            fired_open = summary.fired_open,
            fired_close = summary.fired_close,
            failures = summary.failures,
            "job table restored from store"
        );
        Ok(summary)
    }

    /// Fire every due job once. Exposed for the loop and for tests that
    /// drive time explicitly.
    pub async fn tick(&self, lifecycle: &LifecycleService, now: DateTime<Utc>) -> usize {
        let due = self.take_due(now).await;
        let fired = due.len();
        for job in due {
            Self::fire(lifecycle, job).await;
        }
        fired
    }

    async fn fire(lifecycle: &LifecycleService, job: ScheduledJob) {
        info!(poll_id = job.poll_id, kind = %job.kind, fire_at = %job.fire_at, "firing scheduled job");
        let result = match job.kind {
            JobKind::Open => lifecycle
                .open_poll(job.poll_id, TransitionReason::Scheduled)
                .await
                .map(|_| ()),
            JobKind::Close => lifecycle
                .close_poll(job.poll_id, TransitionReason::Scheduled)
                .await
                .map(|_| ()),
        };
        if let Err(e) = result {
            if e.is_precondition() {
                // A manual transition won the race; idempotent no-op from
                // the scheduler's perspective.
                warn!(poll_id = job.poll_id, kind = %job.kind, error = %e, "scheduled job found poll already transitioned");
            } else {
                // Not rescheduled: the poll stays in its prior status and
                // is corrected by the next restore pass or manual action.
                error!(poll_id = job.poll_id, kind = %job.kind, error = %e, "scheduled job failed");
            }
        }
    }

    /// Drive the scheduler loop forever. Spawn as a background task after
    /// `restore_from_store` has run.
    pub async fn run(
        self: Arc<Self>,
        lifecycle: Arc<LifecycleService>,
        tick_interval: std::time::Duration,
    ) {
        info!(tick_ms = tick_interval.as_millis(), "scheduler loop started");
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.tick(&lifecycle, Utc::now()).await;
        }
    }
}

impl Default for SchedulerService {
    fn default() -> Self {
        Self::new()
    }
}
