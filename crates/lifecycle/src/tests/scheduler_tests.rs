// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tests for the scheduler: replace-semantics scheduling, restart
//! recovery, and the tick path.

use super::helpers::TestHarness;
use crate::scheduler::JobKind;
use crate::service::{ReopenRequest, ReopenSchedule, TransitionReason};
use chrono::{Duration, Utc};
use pollwarden_domain::PollStatus;
use std::sync::Arc;

#[tokio::test]
async fn test_schedule_close_replaces_prior_job() {
    let harness = TestHarness::new();
    let t1 = Utc::now() + Duration::hours(1);
    let t2 = Utc::now() + Duration::hours(2);

    harness.scheduler.schedule_close(42, t1).await;
    harness.scheduler.schedule_close(42, t2).await;

    assert_eq!(harness.scheduler.job_count().await, 1);
    assert_eq!(
        harness.scheduler.job_fire_time(42, JobKind::Close).await,
        Some(t2)
    );
}

#[tokio::test]
async fn test_open_and_close_jobs_coexist_per_poll() {
    let harness = TestHarness::new();
    let at = Utc::now() + Duration::hours(1);

    harness.scheduler.schedule_open(7, at).await;
    harness.scheduler.schedule_close(7, at).await;

    assert_eq!(harness.scheduler.job_count().await, 2);
}

#[tokio::test]
async fn test_cancel_is_noop_when_absent() {
    let harness = TestHarness::new();
    harness.scheduler.cancel(99, JobKind::Open).await;
    assert_eq!(harness.scheduler.job_count().await, 0);
}

#[tokio::test]
async fn test_restore_fires_overdue_opens_exactly_once() {
    let harness = TestHarness::new();
    // Two polls whose open time passed while the "previous process" was
    // down, one still in the future.
    let overdue_a = harness
        .seed_poll("Overdue A", PollStatus::Scheduled, -120, 3600)
        .await;
    let overdue_b = harness
        .seed_poll("Overdue B", PollStatus::Scheduled, -60, 3600)
        .await;
    let future = harness
        .seed_poll("Future", PollStatus::Scheduled, 600, 4200)
        .await;

    let summary = harness
        .scheduler
        .restore_from_store(&harness.lifecycle)
        .await
        .unwrap();

    assert_eq!(summary.fired_open, 2);
    assert_eq!(summary.scheduled_open, 1);
    assert_eq!(summary.failures, 0);

    for poll_id in [overdue_a, overdue_b] {
        let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
        assert_eq!(poll.status, PollStatus::Active);
        // Each overdue poll now carries a close job.
        assert!(
            harness
                .scheduler
                .job_fire_time(poll_id, JobKind::Close)
                .await
                .is_some()
        );
    }
    // Exactly one announcement per opened poll.
    assert_eq!(harness.gateway.announce_count(), 2);

    let future_poll = harness.lifecycle.get_poll(future).await.unwrap();
    assert_eq!(future_poll.status, PollStatus::Scheduled);
    assert!(
        harness
            .scheduler
            .job_fire_time(future, JobKind::Open)
            .await
            .is_some()
    );
}

#[tokio::test]
async fn test_restore_fires_overdue_close_for_active_polls() {
    let harness = TestHarness::new();
    let overdue = harness
        .seed_poll("Expired", PollStatus::Active, -7200, -60)
        .await;
    let live = harness
        .seed_poll("Still live", PollStatus::Active, -3600, 3600)
        .await;

    let summary = harness
        .scheduler
        .restore_from_store(&harness.lifecycle)
        .await
        .unwrap();

    assert_eq!(summary.fired_close, 1);
    assert_eq!(summary.scheduled_close, 1);

    let closed = harness.lifecycle.get_poll(overdue).await.unwrap();
    assert_eq!(closed.status, PollStatus::Closed);
    let open = harness.lifecycle.get_poll(live).await.unwrap();
    assert_eq!(open.status, PollStatus::Active);
}

#[tokio::test]
async fn test_tick_fires_due_jobs_and_removes_them() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Due").await;
    // Replace the close job with one already due.
    harness
        .scheduler
        .schedule_close(poll_id, Utc::now() - Duration::seconds(1))
        .await;

    let fired = harness
        .scheduler
        .tick(&harness.lifecycle, Utc::now())
        .await;

    assert_eq!(fired, 1);
    assert_eq!(harness.scheduler.job_count().await, 0);
    let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
    assert_eq!(poll.status, PollStatus::Closed);
}

#[tokio::test]
async fn test_tick_does_not_fire_future_jobs() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Not yet").await;

    let fired = harness
        .scheduler
        .tick(&harness.lifecycle, Utc::now())
        .await;

    assert_eq!(fired, 0);
    let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
    assert_eq!(poll.status, PollStatus::Active);
}

#[tokio::test]
async fn test_stale_scheduled_close_after_manual_close_is_nonfatal() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Raced close").await;

    // Manual close wins; its cancel removes the close job, but simulate
    // the narrow window where a stale job still fires.
    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();
    harness
        .scheduler
        .schedule_close(poll_id, Utc::now() - Duration::seconds(1))
        .await;

    let fired = harness
        .scheduler
        .tick(&harness.lifecycle, Utc::now())
        .await;

    // The job fired, hit the precondition, and was dropped; the poll is
    // untouched and the table is clean.
    assert_eq!(fired, 1);
    assert_eq!(harness.scheduler.job_count().await, 0);
    let poll = harness.lifecycle.get_poll(poll_id).await.unwrap();
    assert_eq!(poll.status, PollStatus::Closed);
    assert_eq!(harness.gateway.reveal_count(), 1);
}

#[tokio::test]
async fn test_manual_close_cancels_scheduled_close_job() {
    let harness = TestHarness::new();
    let poll_id = harness.create_active_poll("Manual wins").await;
    assert!(
        harness
            .scheduler
            .job_fire_time(poll_id, JobKind::Close)
            .await
            .is_some()
    );

    harness
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();

    assert!(
        harness
            .scheduler
            .job_fire_time(poll_id, JobKind::Close)
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_round_trip_restart_close_reopen() {
    // Create a poll that opened one second ago, "restart" the process,
    // and walk it through close and reopen.
    let harness = TestHarness::new();
    harness
        .seed_poll("Round trip", PollStatus::Scheduled, -1, 3600)
        .await;

    // Restart: fresh services over the same store.
    let restarted = TestHarness::with_persistence(Arc::clone(&harness.persistence));
    let summary = restarted
        .scheduler
        .restore_from_store(&restarted.lifecycle)
        .await
        .unwrap();
    assert_eq!(summary.fired_open, 1);

    let polls = restarted
        .lifecycle
        .list_polls_by_status(PollStatus::Active)
        .await
        .unwrap();
    assert_eq!(polls.len(), 1);
    let poll_id = polls[0].poll_id;
    assert_eq!(restarted.gateway.announce_count(), 1);

    // Close: results revealed.
    let outcome = restarted
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await
        .unwrap();
    assert_eq!(outcome.poll.status, PollStatus::Closed);
    assert_eq!(restarted.gateway.reveal_count(), 1);

    // Reopen extended by 24 hours: active again with a close job at
    // now + 24h, within tolerance.
    let before = Utc::now();
    let outcome = restarted
        .lifecycle
        .reopen_poll(
            poll_id,
            ReopenRequest {
                schedule: ReopenSchedule::ExtendBy(Duration::hours(24)),
                reset_votes: false,
            },
            TransitionReason::Manual,
        )
        .await
        .unwrap();
    assert_eq!(outcome.poll.status, PollStatus::Active);

    let fire_at = restarted
        .scheduler
        .job_fire_time(poll_id, JobKind::Close)
        .await
        .unwrap();
    let delta = (fire_at - (before + Duration::hours(24))).num_seconds().abs();
    assert!(delta < 5, "close job off by {delta}s");
}

#[tokio::test]
async fn test_restore_with_empty_store_is_clean() {
    let harness = TestHarness::new();
    let summary = harness
        .scheduler
        .restore_from_store(&harness.lifecycle)
        .await
        .unwrap();
    assert_eq!(summary.fired_open + summary.fired_close, 0);
    assert_eq!(harness.scheduler.job_count().await, 0);
}
