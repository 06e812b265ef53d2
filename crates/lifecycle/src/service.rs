// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The lifecycle service: the only code path permitted to change
//! `Poll.status`.
//!
//! Every operation follows the same sequence: acquire the per-poll
//! permit, re-read the current status from the store, check the state
//! machine predicate (failing fast with no partial mutation), commit the
//! mutation, then, after releasing the permit, reschedule jobs, notify
//! the messaging gateway under a bounded timeout, and invalidate the
//! cache. Gateway and cache failures after the commit are reported on the
//! outcome but never roll the transition back.
//!
//! ## Invariants
//!
//! - Operations on the same poll are mutually exclusive from validation
//!   through store commit
//! - Manual transitions cancel the now-redundant scheduler job of the
//!   same kind
//! - Votes are accepted only while the poll is active

use crate::error::{GatewayError, LifecycleError};
use crate::gateway::{CacheLayer, MessagingGateway, OptionTally, PollResults};
use crate::scheduler::{JobKind, SchedulerService};
use chrono::{DateTime, Duration, Utc};
use pollwarden_domain::{
    Ballot, DomainError, EditField, LifecycleOp, Poll, PollEdit, PollOption, PollStatus,
    RejectedEdit, validate_ballot, validate_close_in_future, validate_edit, validate_max_choices,
    validate_name, validate_options, validate_transition, validate_window,
};
use pollwarden_persistence::{NewPollRecord, Persistence};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

/// Why a transition was requested. Carried for logging and auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    /// Fired by the scheduler at the poll's scheduled time.
    Scheduled,
    /// Requested directly by an administrator (or a bulk worker acting
    /// for one).
    Manual,
}

impl TransitionReason {
    /// Returns the lowercase name of this reason.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for poll creation.
#[derive(Debug, Clone)]
pub struct NewPollRequest {
    /// The poll title.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Absolute open instant.
    pub open_time: DateTime<Utc>,
    /// Absolute close instant.
    pub close_time: DateTime<Utc>,
    /// Declared IANA timezone.
    pub timezone: String,
    /// Whether votes are hidden while active.
    pub anonymous: bool,
    /// Whether multiple selections are allowed.
    pub multiple_choice: bool,
    /// Maximum selections per ballot.
    pub max_choices: u8,
    /// Ordered option list.
    pub options: Vec<PollOption>,
    /// Create the poll already active and announce it immediately.
    pub open_immediately: bool,
}

/// How a reopen determines the new close time.
///
/// A closed enum instead of two optional fields: the "new close time or
/// extend by duration, mutually exclusive" rule becomes structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReopenSchedule {
    /// Keep the stored close time (must still be in the future).
    KeepCloseTime,
    /// Close at the given instant.
    NewCloseTime(DateTime<Utc>),
    /// Close at `now + duration`.
    ExtendBy(Duration),
}

/// Input for reopening a closed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReopenRequest {
    /// How to determine the new close time.
    pub schedule: ReopenSchedule,
    /// Delete all existing votes before reopening.
    pub reset_votes: bool,
}

/// Outcome of a successful transition.
///
/// `notification_error` carries an external-notification failure that
/// occurred after the internal commit; the transition itself stands.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The poll after the transition.
    pub poll: Poll,
    /// A gateway or cache failure message, if any step failed.
    pub notification_error: Option<String>,
}

/// Outcome of an edit.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// The poll after the accepted fields were applied.
    pub poll: Poll,
    /// The fields that were applied.
    pub applied: Vec<EditField>,
    /// Proposed fields that were discarded, with reasons.
    pub rejected: Vec<RejectedEdit>,
    /// A gateway failure message, if the content refresh failed.
    pub notification_error: Option<String>,
}

/// Configuration for the lifecycle service.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    /// Bound on every gateway call so a slow external platform cannot
    /// stall the scheduler loop.
    pub gateway_timeout: std::time::Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// The lifecycle service. See the module docs for the operation sequence.
pub struct LifecycleService {
    persistence: Arc<Mutex<Persistence>>,
    scheduler: Arc<SchedulerService>,
    gateway: Arc<dyn MessagingGateway>,
    cache: Arc<dyn CacheLayer>,
    config: LifecycleConfig,
    poll_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl LifecycleService {
    /// Creates a lifecycle service over the given collaborators.
    #[must_use]
    pub fn new(
        persistence: Arc<Mutex<Persistence>>,
        scheduler: Arc<SchedulerService>,
        gateway: Arc<dyn MessagingGateway>,
        cache: Arc<dyn CacheLayer>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            persistence,
            scheduler,
            gateway,
            cache,
            config,
            poll_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the mutual-exclusion permit for one poll.
    ///
    /// Held from precondition re-read through store commit; released
    /// before gateway and cache calls.
    async fn poll_permit(&self, poll_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.poll_locks.lock().await;
            Arc::clone(
                locks
                    .entry(poll_id)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    async fn read_poll(&self, poll_id: i64) -> Result<Poll, LifecycleError> {
        let mut store = self.persistence.lock().await;
        store
            .get_poll(poll_id)?
            .ok_or(LifecycleError::PollNotFound(poll_id))
    }

    async fn with_gateway_timeout<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let timeout = self.config.gateway_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::TimedOut {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Best-effort cache invalidation: failures are swallowed and logged.
    async fn invalidate_cache(&self, poll_id: i64) {
        if let Err(e) = self
            .with_gateway_timeout(self.cache.invalidate(poll_id))
            .await
        {
            warn!(poll_id, error = %e, "cache invalidation failed");
        }
    }

    // --- reads ---

    /// Fetch a poll.
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist, or a store
    /// error.
    pub async fn get_poll(&self, poll_id: i64) -> Result<Poll, LifecycleError> {
        self.read_poll(poll_id).await
    }

    /// List every poll.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_polls(&self) -> Result<Vec<Poll>, LifecycleError> {
        let mut store = self.persistence.lock().await;
        Ok(store.list_polls()?)
    }

    /// List polls in one status.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    pub async fn list_polls_by_status(
        &self,
        status: PollStatus,
    ) -> Result<Vec<Poll>, LifecycleError> {
        let mut store = self.persistence.lock().await;
        Ok(store.list_polls_by_status(status)?)
    }

    /// Aggregate results for a poll, with zero-vote options filled in.
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist, or a store
    /// error.
    pub async fn poll_results(&self, poll_id: i64) -> Result<PollResults, LifecycleError> {
        let poll = self.read_poll(poll_id).await?;
        let counts = {
            let mut store = self.persistence.lock().await;
            store.count_votes_by_option(poll_id)?
        };
        Ok(build_results(&poll, &counts))
    }

    // --- create ---

    /// Create a poll.
    ///
    /// The poll is created `scheduled` with an open job. When
    /// `open_immediately` is set it is created `active`, announced, and
    /// given a close job.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if any field violates domain invariants, or a
    /// store error.
    pub async fn create_poll(
        &self,
        request: NewPollRequest,
    ) -> Result<TransitionOutcome, LifecycleError> {
        validate_name(&request.name).map_err(LifecycleError::Validation)?;
        validate_options(&request.options).map_err(LifecycleError::Validation)?;
        validate_max_choices(request.max_choices, request.options.len())
            .map_err(LifecycleError::Validation)?;
        validate_window(request.open_time, request.close_time)
            .map_err(LifecycleError::Validation)?;
        pollwarden_domain::parse_timezone(&request.timezone)
            .map_err(LifecycleError::Validation)?;

        let status = if request.open_immediately {
            PollStatus::Active
        } else {
            PollStatus::Scheduled
        };

        let record = NewPollRecord {
            name: request.name,
            description: request.description,
            status,
            open_time: request.open_time,
            close_time: request.close_time,
            timezone: request.timezone,
            anonymous: request.anonymous,
            multiple_choice: request.multiple_choice,
            max_choices: request.max_choices,
            options: request.options,
            created_at: Utc::now(),
        };

        let poll_id = {
            let mut store = self.persistence.lock().await;
            store.create_poll(&record)?
        };
        info!(poll_id, status = %status, "created poll");

        let mut notification_error = None;
        if status == PollStatus::Active {
            self.scheduler
                .schedule_close(poll_id, record.close_time)
                .await;
            notification_error = self.announce_and_store_ref(poll_id).await;
        } else {
            self.scheduler
                .schedule_open(poll_id, record.open_time)
                .await;
        }

        let poll = self.read_poll(poll_id).await?;
        Ok(TransitionOutcome {
            poll,
            notification_error,
        })
    }

    // --- open ---

    /// Open a scheduled poll: set it active, schedule its close job, and
    /// announce it externally.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the poll is currently `scheduled`,
    /// `PollNotFound`, or a store error.
    pub async fn open_poll(
        &self,
        poll_id: i64,
        reason: TransitionReason,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let close_time = {
            let _permit = self.poll_permit(poll_id).await;
            let poll = self.read_poll(poll_id).await?;
            validate_transition(poll.status, LifecycleOp::Open)
                .map_err(|e| precondition(poll_id, reason, &e))?;

            let mut store = self.persistence.lock().await;
            store.update_poll_status(poll_id, PollStatus::Active)?;
            poll.close_time
        };
        info!(poll_id, reason = %reason, "poll opened");

        // A manual open makes any pending open job redundant.
        self.scheduler.cancel(poll_id, JobKind::Open).await;
        self.scheduler.schedule_close(poll_id, close_time).await;

        let notification_error = self.announce_and_store_ref(poll_id).await;
        self.invalidate_cache(poll_id).await;

        let poll = self.read_poll(poll_id).await?;
        Ok(TransitionOutcome {
            poll,
            notification_error,
        })
    }

    // --- close ---

    /// Close an active poll: cancel its close job and reveal results
    /// externally, unconditionally (anonymous polls included).
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the poll is currently `active`,
    /// `PollNotFound`, or a store error.
    pub async fn close_poll(
        &self,
        poll_id: i64,
        reason: TransitionReason,
    ) -> Result<TransitionOutcome, LifecycleError> {
        {
            let _permit = self.poll_permit(poll_id).await;
            let poll = self.read_poll(poll_id).await?;
            validate_transition(poll.status, LifecycleOp::Close)
                .map_err(|e| precondition(poll_id, reason, &e))?;

            let mut store = self.persistence.lock().await;
            store.update_poll_status(poll_id, PollStatus::Closed)?;
        }
        info!(poll_id, reason = %reason, "poll closed");

        self.scheduler.cancel(poll_id, JobKind::Close).await;

        let poll = self.read_poll(poll_id).await?;
        let counts = {
            let mut store = self.persistence.lock().await;
            store.count_votes_by_option(poll_id)?
        };
        let results = build_results(&poll, &counts);

        let notification_error = match &poll.message_ref {
            Some(message_ref) => self
                .with_gateway_timeout(self.gateway.reveal_results(&poll, &results, message_ref))
                .await
                .err()
                .map(|e| {
                    warn!(poll_id, error = %e, "result reveal failed; external message is stale");
                    e.to_string()
                }),
            None => None,
        };
        self.invalidate_cache(poll_id).await;

        Ok(TransitionOutcome {
            poll,
            notification_error,
        })
    }

    // --- reopen ---

    /// Reopen a closed poll with a new close schedule, optionally
    /// resetting votes.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the poll is currently `closed`
    /// (never valid for an active poll), `Validation` if the resulting
    /// close time is not in the future, `PollNotFound`, or a store error.
    pub async fn reopen_poll(
        &self,
        poll_id: i64,
        request: ReopenRequest,
        reason: TransitionReason,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let new_close_time = {
            let _permit = self.poll_permit(poll_id).await;
            let poll = self.read_poll(poll_id).await?;
            validate_transition(poll.status, LifecycleOp::Reopen)
                .map_err(|e| precondition(poll_id, reason, &e))?;

            let now = Utc::now();
            let new_close_time = match request.schedule {
                ReopenSchedule::KeepCloseTime => poll.close_time,
                ReopenSchedule::NewCloseTime(at) => at,
                ReopenSchedule::ExtendBy(duration) => now + duration,
            };
            validate_close_in_future(new_close_time, now).map_err(LifecycleError::Validation)?;

            let mut store = self.persistence.lock().await;
            if request.reset_votes {
                let removed = store.delete_votes_for_poll(poll_id)?;
                info!(poll_id, removed, "votes reset on reopen");
            }
            store.update_poll_status_and_close_time(
                poll_id,
                PollStatus::Active,
                new_close_time,
            )?;
            new_close_time
        };
        info!(poll_id, reason = %reason, close_time = %new_close_time, "poll reopened");

        self.scheduler.schedule_close(poll_id, new_close_time).await;

        let poll = self.read_poll(poll_id).await?;
        let notification_error = match &poll.message_ref {
            Some(message_ref) => self
                .with_gateway_timeout(self.gateway.refresh(&poll, message_ref))
                .await
                .err()
                .map(|e| {
                    warn!(poll_id, error = %e, "reopen refresh failed; external message is stale");
                    e.to_string()
                }),
            None => None,
        };
        self.invalidate_cache(poll_id).await;

        Ok(TransitionOutcome {
            poll,
            notification_error,
        })
    }

    // --- edit ---

    /// Apply a partial field map to a poll.
    ///
    /// Fields not permitted for the current status are discarded and
    /// reported in the outcome, never applied. A changed close time
    /// replaces the close job; any voter-visible change triggers a
    /// content refresh.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the accepted fields produce an invalid
    /// window or a close time in the past, `PollNotFound`, or a store
    /// error.
    pub async fn edit_poll(
        &self,
        poll_id: i64,
        proposed: PollEdit,
    ) -> Result<EditOutcome, LifecycleError> {
        let (decision, status_after) = {
            let _permit = self.poll_permit(poll_id).await;
            let poll = self.read_poll(poll_id).await?;
            let decision = validate_edit(&poll, &proposed);

            if !decision.accepted.is_empty() {
                let effective_open = decision.accepted.open_time.unwrap_or(poll.open_time);
                let effective_close = decision.accepted.close_time.unwrap_or(poll.close_time);
                validate_window(effective_open, effective_close)
                    .map_err(LifecycleError::Validation)?;
                if decision.accepted.close_time.is_some() {
                    validate_close_in_future(effective_close, Utc::now())
                        .map_err(LifecycleError::Validation)?;
                }

                let mut store = self.persistence.lock().await;
                store.apply_poll_edit(poll_id, &decision.accepted)?;
            }
            (decision, poll.status)
        };

        let applied = decision.accepted.proposed_fields();
        if !applied.is_empty() {
            info!(poll_id, fields = ?applied, "poll edited");
        }

        // Reschedule whichever job the changed times drive.
        match status_after {
            PollStatus::Scheduled => {
                if let Some(open_time) = decision.accepted.open_time {
                    self.scheduler.schedule_open(poll_id, open_time).await;
                }
            }
            PollStatus::Active => {
                if let Some(close_time) = decision.accepted.close_time {
                    self.scheduler.schedule_close(poll_id, close_time).await;
                }
            }
            PollStatus::Closed => {}
        }

        let poll = self.read_poll(poll_id).await?;
        let notification_error = if decision.voter_visible_changes().is_empty() {
            None
        } else {
            match &poll.message_ref {
                Some(message_ref) => self
                    .with_gateway_timeout(self.gateway.refresh(&poll, message_ref))
                    .await
                    .err()
                    .map(|e| {
                        warn!(poll_id, error = %e, "edit refresh failed; external message is stale");
                        e.to_string()
                    }),
                None => None,
            }
        };
        if !applied.is_empty() {
            self.invalidate_cache(poll_id).await;
        }

        Ok(EditOutcome {
            poll,
            applied,
            rejected: decision.rejected,
            notification_error,
        })
    }

    // --- delete ---

    /// Delete a poll, cancelling its pending scheduler jobs first.
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist, or a store
    /// error.
    pub async fn delete_poll(&self, poll_id: i64) -> Result<(), LifecycleError> {
        self.scheduler.cancel_all(poll_id).await;
        {
            let _permit = self.poll_permit(poll_id).await;
            let mut store = self.persistence.lock().await;
            store.delete_poll(poll_id)?;
        }
        info!(poll_id, "poll deleted");
        self.invalidate_cache(poll_id).await;
        Ok(())
    }

    // --- votes ---

    /// Record one voter's ballot.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` unless the poll is active, `Validation` for
    /// a malformed selection, `DuplicateVote` if the voter already voted,
    /// `PollNotFound`, or a store error.
    pub async fn cast_vote(&self, poll_id: i64, ballot: Ballot) -> Result<(), LifecycleError> {
        let _permit = self.poll_permit(poll_id).await;
        let poll = self.read_poll(poll_id).await?;
        if poll.status != PollStatus::Active {
            return Err(LifecycleError::Precondition(
                DomainError::InvalidStatusTransition {
                    from: poll.status.as_str().to_string(),
                    operation: String::from("vote"),
                    reason: String::from("votes are accepted only while the poll is active"),
                },
            ));
        }
        validate_ballot(&poll, &ballot).map_err(LifecycleError::Validation)?;

        let mut store = self.persistence.lock().await;
        if store.has_voted(poll_id, &ballot.voter_id)? {
            return Err(LifecycleError::DuplicateVote {
                poll_id,
                voter_id: ballot.voter_id,
            });
        }
        store.insert_ballot(poll_id, &ballot, Utc::now())?;
        Ok(())
    }

    // --- helpers ---

    /// Announce a poll and store the returned message reference. Returns
    /// the failure message when the gateway call failed.
    async fn announce_and_store_ref(&self, poll_id: i64) -> Option<String> {
        let poll = match self.read_poll(poll_id).await {
            Ok(poll) => poll,
            Err(e) => return Some(e.to_string()),
        };
        match self.with_gateway_timeout(self.gateway.announce(&poll)).await {
            Ok(message_ref) => {
                let mut store = self.persistence.lock().await;
                if let Err(e) = store.set_message_ref(poll_id, &message_ref) {
                    warn!(poll_id, error = %e, "failed to store message reference");
                    return Some(e.to_string());
                }
                None
            }
            Err(e) => {
                warn!(poll_id, error = %e, "announcement failed; poll is active without an external message");
                Some(e.to_string())
            }
        }
    }
}

/// Logs and wraps a precondition failure.
fn precondition(poll_id: i64, reason: TransitionReason, err: &DomainError) -> LifecycleError {
    warn!(poll_id, reason = %reason, error = %err, "transition precondition failed");
    LifecycleError::Precondition(err.clone())
}

/// Builds aggregate results from per-option counts, filling zero-vote
/// options.
fn build_results(poll: &Poll, counts: &[(i32, i64)]) -> PollResults {
    let by_index: HashMap<i32, i64> = counts.iter().copied().collect();
    let tallies: Vec<OptionTally> = poll
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| OptionTally {
            label: option.label.clone(),
            marker: option.marker.clone(),
            votes: i32::try_from(index)
                .ok()
                .and_then(|i| by_index.get(&i).copied())
                .unwrap_or(0),
        })
        .collect();
    let total_votes = tallies.iter().map(|t| t.votes).sum();
    PollResults {
        poll_id: poll.poll_id,
        total_votes,
        tallies,
    }
}
