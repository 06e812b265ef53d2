// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tests for poll storage round trips, edits, and deletion.

use super::test_poll_record;
use crate::{Persistence, PersistenceError};
use pollwarden_domain::{PollEdit, PollOption, PollStatus};

#[test]
fn test_create_and_get_poll_round_trip() {
    let mut persistence = Persistence::new_in_memory().expect("in-memory database");
    let record = test_poll_record("Round trip", PollStatus::Scheduled);

    let poll_id = persistence.create_poll(&record).unwrap();
    let poll = persistence.get_poll(poll_id).unwrap().expect("poll exists");

    assert_eq!(poll.poll_id, poll_id);
    assert_eq!(poll.name, "Round trip");
    assert_eq!(poll.status, PollStatus::Scheduled);
    assert_eq!(poll.timezone, "America/New_York");
    assert_eq!(poll.open_time, record.open_time);
    assert_eq!(poll.close_time, record.close_time);
    assert_eq!(poll.options.len(), 2);
    assert_eq!(poll.options[0].label, "Yes");
    assert_eq!(poll.options[1].label, "No");
    assert!(poll.message_ref.is_none());
}

#[test]
fn test_get_missing_poll_returns_none() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    assert!(persistence.get_poll(9999).unwrap().is_none());
}

#[test]
fn test_update_poll_status() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let poll_id = persistence
        .create_poll(&test_poll_record("Status", PollStatus::Scheduled))
        .unwrap();

    persistence
        .update_poll_status(poll_id, PollStatus::Active)
        .unwrap();

    let poll = persistence.get_poll(poll_id).unwrap().unwrap();
    assert_eq!(poll.status, PollStatus::Active);
}

#[test]
fn test_update_status_of_missing_poll_fails() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let result = persistence.update_poll_status(42, PollStatus::Active);
    assert_eq!(result, Err(PersistenceError::PollNotFound(42)));
}

#[test]
fn test_set_message_ref() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let poll_id = persistence
        .create_poll(&test_poll_record("Announce", PollStatus::Active))
        .unwrap();

    persistence.set_message_ref(poll_id, "msg-1234").unwrap();

    let poll = persistence.get_poll(poll_id).unwrap().unwrap();
    assert_eq!(poll.message_ref.as_deref(), Some("msg-1234"));
}

#[test]
fn test_apply_poll_edit_updates_fields_and_options() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let poll_id = persistence
        .create_poll(&test_poll_record("Edit me", PollStatus::Scheduled))
        .unwrap();

    let edit = PollEdit {
        name: Some(String::from("Edited")),
        description: Some(String::from("new description")),
        options: Some(vec![
            PollOption::new("A", "🅰"),
            PollOption::new("B", "🅱"),
            PollOption::new("C", "🆑"),
        ]),
        ..PollEdit::default()
    };
    persistence.apply_poll_edit(poll_id, &edit).unwrap();

    let poll = persistence.get_poll(poll_id).unwrap().unwrap();
    assert_eq!(poll.name, "Edited");
    assert_eq!(poll.description.as_deref(), Some("new description"));
    assert_eq!(poll.options.len(), 3);
    assert_eq!(poll.options[2].label, "C");
}

#[test]
fn test_list_polls_by_status() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let scheduled_id = persistence
        .create_poll(&test_poll_record("One", PollStatus::Scheduled))
        .unwrap();
    let active_id = persistence
        .create_poll(&test_poll_record("Two", PollStatus::Active))
        .unwrap();
    persistence
        .create_poll(&test_poll_record("Three", PollStatus::Closed))
        .unwrap();

    let scheduled = persistence
        .list_polls_by_status(PollStatus::Scheduled)
        .unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].poll_id, scheduled_id);

    let active = persistence.list_polls_by_status(PollStatus::Active).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].poll_id, active_id);

    assert_eq!(persistence.list_polls().unwrap().len(), 3);
}

#[test]
fn test_delete_poll_cascades() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let poll_id = persistence
        .create_poll(&test_poll_record("Doomed", PollStatus::Active))
        .unwrap();
    persistence
        .insert_ballot(
            poll_id,
            &pollwarden_domain::Ballot {
                voter_id: String::from("v1"),
                option_indices: vec![0],
            },
            chrono::Utc::now(),
        )
        .unwrap();

    persistence.delete_poll(poll_id).unwrap();

    assert!(persistence.get_poll(poll_id).unwrap().is_none());
    assert_eq!(persistence.count_votes(poll_id).unwrap(), 0);
}

#[test]
fn test_delete_missing_poll_fails() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    assert_eq!(
        persistence.delete_poll(7),
        Err(PersistenceError::PollNotFound(7))
    );
}
