// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tests for bulk operation records, progress mirroring, and recovery.

use crate::Persistence;
use chrono::Utc;
use pollwarden_domain::{BulkOperationStatus, BulkOperationType};

fn create_operation(persistence: &mut Persistence, id: &str, actor: &str) {
    persistence
        .create_bulk_operation(
            id,
            BulkOperationType::Close,
            actor,
            3,
            r#"{"target_poll_ids":[1,2,3]}"#,
            Utc::now(),
        )
        .unwrap();
}

#[test]
fn test_create_and_get_operation() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    create_operation(&mut persistence, "op-1", "admin");

    let record = persistence.get_bulk_operation("op-1").unwrap().unwrap();
    assert_eq!(record.operation_id, "op-1");
    assert_eq!(record.op_type, BulkOperationType::Close);
    assert_eq!(record.status, BulkOperationStatus::Pending);
    assert_eq!(record.total_count, 3);
    assert_eq!(record.processed_count, 0);
    assert!(record.started_at.is_none());
    assert!(record.finished_at.is_none());
}

#[test]
fn test_progress_and_finish() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    create_operation(&mut persistence, "op-2", "admin");

    persistence.mark_bulk_started("op-2", Utc::now()).unwrap();
    persistence.update_bulk_progress("op-2", 2, 1, 1).unwrap();

    let running = persistence.get_bulk_operation("op-2").unwrap().unwrap();
    assert_eq!(running.status, BulkOperationStatus::Running);
    assert_eq!(running.processed_count, 2);
    assert_eq!(running.success_count, 1);
    assert_eq!(running.failure_count, 1);

    persistence
        .finish_bulk_operation(
            "op-2",
            BulkOperationStatus::Completed,
            3,
            2,
            1,
            None,
            Utc::now(),
        )
        .unwrap();

    let finished = persistence.get_bulk_operation("op-2").unwrap().unwrap();
    assert_eq!(finished.status, BulkOperationStatus::Completed);
    assert_eq!(finished.processed_count, 3);
    assert!(finished.finished_at.is_some());
}

#[test]
fn test_item_errors_kept_in_submission_order() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    create_operation(&mut persistence, "op-3", "admin");

    persistence
        .record_bulk_item_error("op-3", 12, 1, "already closed")
        .unwrap();
    persistence
        .record_bulk_item_error("op-3", 7, 0, "not found")
        .unwrap();

    let errors = persistence.list_bulk_item_errors("op-3").unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].poll_id, 7);
    assert_eq!(errors[0].position, 0);
    assert_eq!(errors[1].poll_id, 12);
    assert_eq!(errors[1].message, "already closed");
}

#[test]
fn test_count_active_operations_for_actor() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    create_operation(&mut persistence, "op-4", "admin");
    create_operation(&mut persistence, "op-5", "admin");
    create_operation(&mut persistence, "op-6", "other");

    assert_eq!(
        persistence.count_active_operations_for_actor("admin").unwrap(),
        2
    );

    persistence
        .finish_bulk_operation(
            "op-4",
            BulkOperationStatus::Completed,
            3,
            3,
            0,
            None,
            Utc::now(),
        )
        .unwrap();

    assert_eq!(
        persistence.count_active_operations_for_actor("admin").unwrap(),
        1
    );
}

#[test]
fn test_fail_stale_operations() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    create_operation(&mut persistence, "op-7", "admin");
    persistence.mark_bulk_started("op-7", Utc::now()).unwrap();
    create_operation(&mut persistence, "op-8", "admin");

    let failed = persistence.fail_stale_bulk_operations(Utc::now()).unwrap();
    assert_eq!(failed, 2);

    for id in ["op-7", "op-8"] {
        let record = persistence.get_bulk_operation(id).unwrap().unwrap();
        assert_eq!(record.status, BulkOperationStatus::Failed);
        assert!(record.finished_at.is_some());
    }
}

#[test]
fn test_export_result_csv_stored() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    persistence
        .create_bulk_operation(
            "op-9",
            BulkOperationType::Export,
            "admin",
            1,
            r#"{"target_poll_ids":[1]}"#,
            Utc::now(),
        )
        .unwrap();

    persistence
        .finish_bulk_operation(
            "op-9",
            BulkOperationStatus::Completed,
            1,
            1,
            0,
            Some("poll_id,option,votes\n1,Yes,2\n"),
            Utc::now(),
        )
        .unwrap();

    let record = persistence.get_bulk_operation("op-9").unwrap().unwrap();
    assert!(record.result_csv.unwrap().contains("poll_id,option,votes"));
}
