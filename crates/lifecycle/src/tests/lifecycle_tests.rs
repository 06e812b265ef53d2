// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tests for the lifecycle service: transition preconditions, per-poll
//! mutual exclusion, edit rules, vote gating, and non-fatal notification
//! failures.

use super::helpers::{TestHarness, poll_request};
use crate::error::LifecycleError;
use crate::scheduler::JobKind;
use crate::service::{ReopenRequest, ReopenSchedule, TransitionReason};
use chrono::{Duration, Utc};
use pollwarden_domain::{Ballot, EditField, PollEdit, PollOption, PollStatus};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_create_scheduled_poll_schedules_open_job() {
    let harness = TestHarness::new();
    let outcome = harness
        .lifecycle
        .create_poll(poll_request("Scheduled", 600, 4200, false))
        .await
        .unwrap();

    assert_eq!(outcome.poll.status, PollStatus::Scheduled);
    assert!(outcome.poll.message_ref.is_none());
    assert_eq!(harness.gateway.announce_count(), 0);
    assert!(
        harness
            .scheduler
            .job_fire_time(outcome.poll.poll_id, JobKind::Open)
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_create_immediate_poll_announces_and_schedules_close() {
    let harness = TestHarness::new();
    let outcome = harness
        .lifecycle
        .create_poll(poll_request("Immediate", 0, 3600, true))
        .await
        .unwrap();

    assert_eq!(outcome.poll.status, PollStatus::Active);
    assert_eq!(
        outcome.poll.message_ref,
        Some(format!("msg-{}", outcome.poll.poll_id))
    );
    assert_eq!(harness.gateway.announce_count(), 1);
    assert!(
        harness
            .scheduler
            .job_fire_time(outcome.poll.poll_id, JobKind::Close)
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_create_poll_validation_failures() {
    let harness = TestHarness::new();

    let mut one_option = poll_request("Bad options", 0, 3600, false);
    one_option.options.truncate(1);
    assert!(matches!(
        harness.lifecycle.create_poll(one_option).await,
        Err(LifecycleError::Validation(_))
    ));

    let inverted = poll_request("Inverted", 3600, 0, false);
    assert!(matches!(
        harness.lifecycle.create_poll(inverted).await,
        Err(LifecycleError::Validation(_))
    ));

    let mut bad_tz = poll_request("Bad tz", 0, 3600, false);
    bad_tz.timezone = String::from("Mars/Olympus");
    assert!(matches!(
        harness.lifecycle.create_poll(bad_tz).await,
        Err(LifecycleError::Validation(_))
    ));
}

#[tokio::test]
async fn test_open_requires_scheduled() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Already open").await;

    let result = harness
        .lifecycle
        .open_poll(poll_id, TransitionReason::Manual)
        .await;
    assert!(matches!(result, Err(LifecycleError::Precondition(_))));
}

#[tokio::test]
async fn test_close_requires_active() {
    let harness = TestHarness::new();
    let outcome = harness
        .lifecycle
        .create_poll(poll_request("Not open yet", 600, 4200, false))
        .await
        .unwrap();

    let result = harness
        .lifecycle
        .close_poll(outcome.poll.poll_id, TransitionReason::Manual)
        .await;
    assert!(matches!(result, Err(LifecycleError::Precondition(_))));
}

#[tokio::test]
async fn test_reopen_of_active_poll_always_precondition_fails() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Active").await;

    let result = harness
        .lifecycle
        .reopen_poll(
            poll_id,
            ReopenRequest {
                schedule: ReopenSchedule::ExtendBy(Duration::hours(1)),
                reset_votes: false,
            },
            TransitionReason::Manual,
        )
        .await;
    assert!(matches!(result, Err(LifecycleError::Precondition(_))));

    // Status is untouched.
    let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
    assert_eq!(poll.status, PollStatus::Active);
}

#[tokio::test]
async fn test_close_reveals_results_and_cancels_job() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Closing").await;
    assert!(
        harness
            .scheduler
            .job_fire_time(poll_id, JobKind::Close)
            .await
            .is_some()
    );

    let outcome = harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    assert_eq!(outcome.poll.status, PollStatus::Closed);
    assert!(outcome.notification_error.is_none());
    assert_eq!(harness.gateway.reveal_count(), 1);
    assert!(
        harness
            .scheduler
            .job_fire_time(poll_id, JobKind::Close)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_concurrent_duplicate_closes_exactly_one_succeeds() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Raced").await;

    let first = harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual);
    let second = harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Scheduled);
    let (a, b) = tokio::join!(first, second);

    let successes = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(successes, 1, "exactly one close must win");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(LifecycleError::Precondition(_))));
    assert_eq!(harness.gateway.reveal_count(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicate_reopens_exactly_one_succeeds() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Raced reopen").await;
    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    let request = ReopenRequest {
        schedule: ReopenSchedule::ExtendBy(Duration::hours(2)),
        reset_votes: false,
    };
    let first = harness
        .lifecycle
        .reopen_poll(poll_id, request, TransitionReason::Manual);
    let second = harness
        .lifecycle
        .reopen_poll(poll_id, request, TransitionReason::Manual);
    let (a, b) = tokio::join!(first, second);

    let successes = usize::from(a.is_ok()) + usize::from(b.is_ok());
    assert_eq!(successes, 1, "exactly one reopen must win");
}

#[tokio::test]
async fn test_reopen_extends_and_optionally_resets_votes() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Reopen me").await;
    harness
        .lifecycle
        .cast_vote(
            poll_id,
            Ballot {
                voter_id: String::from("v1"),
                option_indices: vec![0],
            },
        )
        .await
        .unwrap();
    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    let before = Utc::now();
    let outcome = harness
        .lifecycle
        .reopen_poll(
            poll_id,
            ReopenRequest {
                schedule: ReopenSchedule::ExtendBy(Duration::hours(24)),
                reset_votes: true,
            },
            TransitionReason::Manual,
        )
        .await
        .unwrap();

    assert_eq!(outcome.poll.status, PollStatus::Active);
    // New close time is now + 24h, within tolerance.
    let expected = before + Duration::hours(24);
    let delta = (outcome.poll.close_time - expected).num_seconds().abs();
    assert!(delta < 5, "close time off by {delta}s");

    let job = harness
        .scheduler
        .job_fire_time(poll_id, JobKind::Close)
        .await
        .unwrap();
    assert_eq!(job, outcome.poll.close_time);

    // Votes were reset, and the live message refreshed.
    let results = harness.lifecycle.poll_results(poll_id).await.unwrap();
    assert_eq!(results.total_votes, 0);
    assert_eq!(harness.gateway.refresh_count(), 1);
}

#[tokio::test]
async fn test_reopen_rejects_past_close_time() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Past close").await;
    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    let result = harness
        .lifecycle
        .reopen_poll(
            poll_id,
            ReopenRequest {
                schedule: ReopenSchedule::NewCloseTime(Utc::now() - Duration::hours(1)),
                reset_votes: false,
            },
            TransitionReason::Manual,
        )
        .await;
    assert!(matches!(result, Err(LifecycleError::Validation(_))));

    // No partial mutation: still closed.
    let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
    assert_eq!(poll.status, PollStatus::Closed);
}

#[tokio::test]
async fn test_option_append_preserves_existing_votes() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Options").await;
    for (voter, index) in [("v1", 0), ("v2", 0), ("v3", 1)] {
        harness
            .lifecycle
            .cast_vote(
                poll_id,
                Ballot {
                    voter_id: voter.to_string(),
                    option_indices: vec![index],
                },
            )
            .await
            .unwrap();
    }

    // Appending a new option succeeds.
    let outcome = harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                options: Some(vec![
                    PollOption::new("Yes", "✅"),
                    PollOption::new("No", "❌"),
                    PollOption::new("Maybe", "🤷"),
                ]),
                ..PollEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.applied, vec![EditField::Options]);
    assert!(outcome.rejected.is_empty());
    assert_eq!(outcome.poll.options.len(), 3);

    // Existing tallies are unaffected by the append.
    let results = harness.lifecycle.poll_results(poll_id).await.unwrap();
    assert_eq!(results.tallies[0].votes, 2);
    assert_eq!(results.tallies[1].votes, 1);
    assert_eq!(results.tallies[2].votes, 0);

    // Mutating an existing option is rejected.
    let outcome = harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                options: Some(vec![
                    PollOption::new("Yes", "✅"),
                    PollOption::new("Changed", "❎"),
                    PollOption::new("Maybe", "🤷"),
                ]),
                ..PollEdit::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].field, EditField::Options);

    // Removing an existing option is rejected.
    let outcome = harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                options: Some(vec![
                    PollOption::new("Yes", "✅"),
                    PollOption::new("No", "❌"),
                ]),
                ..PollEdit::default()
            },
        )
        .await
        .unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
}

#[tokio::test]
async fn test_edit_close_time_reschedules_close_job() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Reschedule").await;

    let new_close = Utc::now() + Duration::hours(6);
    let outcome = harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                close_time: Some(new_close),
                ..PollEdit::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.applied, vec![EditField::CloseTime]);
    let job = harness
        .scheduler
        .job_fire_time(poll_id, JobKind::Close)
        .await
        .unwrap();
    assert_eq!(job, new_close);
    // Voter-visible change refreshed the message.
    assert_eq!(harness.gateway.refresh_count(), 1);
}

#[tokio::test]
async fn test_edit_rejects_past_close_time() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Past edit").await;

    let result = harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                close_time: Some(Utc::now() - Duration::minutes(10)),
                ..PollEdit::default()
            },
        )
        .await;
    assert!(matches!(result, Err(LifecycleError::Validation(_))));
}

#[tokio::test]
async fn test_edit_name_triggers_refresh_but_not_description_only_gating() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Refresh").await;

    harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                name: Some(String::from("Renamed")),
                ..PollEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(harness.gateway.refresh_count(), 1);

    harness
        .lifecycle
        .edit_poll(
            poll_id,
            PollEdit {
                description: Some(String::from("More context")),
                ..PollEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(harness.gateway.refresh_count(), 2);
}

#[tokio::test]
async fn test_vote_gating_by_status() {
    let harness = TestHarness::new();
    let outcome = harness
        .lifecycle
        .create_poll(poll_request("Gated", 600, 4200, false))
        .await
        .unwrap();
    let poll_id = outcome.poll.poll_id;
    let ballot = Ballot {
        voter_id: String::from("v1"),
        option_indices: vec![0],
    };

    // Scheduled: rejected.
    assert!(matches!(
        harness.lifecycle.cast_vote(poll_id, ballot.clone()).await,
        Err(LifecycleError::Precondition(_))
    ));

    harness
        .lifecycle
        .open_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();
    harness
        .lifecycle
        .cast_vote(poll_id, ballot.clone())
        .await
        .unwrap();

    // Duplicate voter: rejected.
    assert!(matches!(
        harness.lifecycle.cast_vote(poll_id, ballot.clone()).await,
        Err(LifecycleError::DuplicateVote { .. })
    ));

    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    // Closed: rejected.
    let late = Ballot {
        voter_id: String::from("v2"),
        option_indices: vec![1],
    };
    assert!(matches!(
        harness.lifecycle.cast_vote(poll_id, late).await,
        Err(LifecycleError::Precondition(_))
    ));
}

#[tokio::test]
async fn test_invalid_ballot_rejected_before_mutation() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Ballots").await;

    let out_of_range = Ballot {
        voter_id: String::from("v1"),
        option_indices: vec![9],
    };
    assert!(matches!(
        harness.lifecycle.cast_vote(poll_id, out_of_range).await,
        Err(LifecycleError::Validation(_))
    ));

    let results = harness.lifecycle.poll_results(poll_id).await.unwrap();
    assert_eq!(results.total_votes, 0);
}

#[tokio::test]
async fn test_notification_failure_does_not_roll_back_close() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Stale mirror").await;
    harness.gateway.fail_reveal.store(true, Ordering::SeqCst);

    let outcome = harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    // Internal state committed; the failure is surfaced, not propagated.
    assert_eq!(outcome.poll.status, PollStatus::Closed);
    assert!(outcome.notification_error.is_some());
    let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
    assert_eq!(poll.status, PollStatus::Closed);
}

#[tokio::test]
async fn test_announce_failure_leaves_poll_active_without_ref() {
    let harness = TestHarness::new();
    harness.gateway.fail_announce.store(true, Ordering::SeqCst);

    let outcome = harness
        .lifecycle
        .create_poll(poll_request("No announce", 0, 3600, true))
        .await
        .unwrap();

    assert_eq!(outcome.poll.status, PollStatus::Active);
    assert!(outcome.poll.message_ref.is_none());
    assert!(outcome.notification_error.is_some());
}

#[tokio::test]
async fn test_delete_cancels_pending_jobs() {
    let harness = TestHarness::new();
    let outcome = harness
        .lifecycle
        .create_poll(poll_request("Doomed", 600, 4200, false))
        .await
        .unwrap();
    let poll_id = outcome.poll.poll_id;
    assert_eq!(harness.scheduler.job_count().await, 1);

    harness.lifecycle.delete_poll(poll_id).await.unwrap();

    assert_eq!(harness.scheduler.job_count().await, 0);
    assert!(matches!(
        harness.lifecycle.get_poll(poll_id).await,
        Err(LifecycleError::PollNotFound(_))
    ));
}

#[tokio::test]
async fn test_cache_invalidated_on_transitions() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Cached").await;
    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    let invalidations = harness.cache.invalidations.lock().unwrap().clone();
    assert!(invalidations.contains(&poll_id));
}
