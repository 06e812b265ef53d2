// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Bulk operation mutation operations.
//!
//! A bulk operation row is created at submission and mutated only by the
//! worker executing it: started, per-item progress, per-item errors, and a
//! single terminal write.

use crate::diesel_schema::{bulk_operation_errors, bulk_operations};
use crate::error::PersistenceError;
use diesel::prelude::*;
use pollwarden_domain::{BulkOperationStatus, BulkOperationType};

#[derive(Insertable)]
#[diesel(table_name = bulk_operations)]
struct NewBulkOperationRow {
    operation_id: String,
    op_type: String,
    status: String,
    submitted_by: String,
    total_count: i32,
    processed_count: i32,
    success_count: i32,
    failure_count: i32,
    parameters_json: String,
    created_at: String,
}

#[derive(Insertable)]
#[diesel(table_name = bulk_operation_errors)]
struct NewBulkItemErrorRow {
    operation_id: String,
    poll_id: i64,
    position: i32,
    message: String,
}

/// Insert a pending bulk operation record.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_bulk_operation(
    conn: &mut SqliteConnection,
    operation_id: &str,
    op_type: BulkOperationType,
    submitted_by: &str,
    total_count: i32,
    parameters_json: &str,
    created_at: &str,
) -> Result<(), PersistenceError> {
    let row = NewBulkOperationRow {
        operation_id: operation_id.to_string(),
        op_type: op_type.as_str().to_string(),
        status: BulkOperationStatus::Pending.as_str().to_string(),
        submitted_by: submitted_by.to_string(),
        total_count,
        processed_count: 0,
        success_count: 0,
        failure_count: 0,
        parameters_json: parameters_json.to_string(),
        created_at: created_at.to_string(),
    };
    diesel::insert_into(bulk_operations::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

/// Mark an operation as running.
///
/// # Errors
///
/// Returns `BulkOperationNotFound` if no row was updated.
pub fn mark_bulk_started(
    conn: &mut SqliteConnection,
    operation_id: &str,
    started_at: &str,
) -> Result<(), PersistenceError> {
    let updated = diesel::update(
        bulk_operations::table.filter(bulk_operations::operation_id.eq(operation_id)),
    )
    .set((
        bulk_operations::status.eq(BulkOperationStatus::Running.as_str()),
        bulk_operations::started_at.eq(started_at),
    ))
    .execute(conn)?;
    if updated == 0 {
        return Err(PersistenceError::BulkOperationNotFound(
            operation_id.to_string(),
        ));
    }
    Ok(())
}

/// Mirror in-memory progress counters to the durable record.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn update_bulk_progress(
    conn: &mut SqliteConnection,
    operation_id: &str,
    processed_count: i32,
    success_count: i32,
    failure_count: i32,
) -> Result<(), PersistenceError> {
    diesel::update(bulk_operations::table.filter(bulk_operations::operation_id.eq(operation_id)))
        .set((
            bulk_operations::processed_count.eq(processed_count),
            bulk_operations::success_count.eq(success_count),
            bulk_operations::failure_count.eq(failure_count),
        ))
        .execute(conn)?;
    Ok(())
}

/// Record one isolated per-item failure.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_bulk_item_error(
    conn: &mut SqliteConnection,
    operation_id: &str,
    poll_id: i64,
    position: i32,
    message: &str,
) -> Result<(), PersistenceError> {
    let row = NewBulkItemErrorRow {
        operation_id: operation_id.to_string(),
        poll_id,
        position,
        message: message.to_string(),
    };
    diesel::insert_into(bulk_operation_errors::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

/// Write an operation's terminal status, final counts, and (for export)
/// the CSV artifact.
///
/// # Errors
///
/// Returns `BulkOperationNotFound` if no row was updated.
#[allow(clippy::too_many_arguments)]
pub fn finish_bulk_operation(
    conn: &mut SqliteConnection,
    operation_id: &str,
    status: BulkOperationStatus,
    processed_count: i32,
    success_count: i32,
    failure_count: i32,
    result_csv: Option<&str>,
    finished_at: &str,
) -> Result<(), PersistenceError> {
    let updated = diesel::update(
        bulk_operations::table.filter(bulk_operations::operation_id.eq(operation_id)),
    )
    .set((
        bulk_operations::status.eq(status.as_str()),
        bulk_operations::processed_count.eq(processed_count),
        bulk_operations::success_count.eq(success_count),
        bulk_operations::failure_count.eq(failure_count),
        bulk_operations::result_csv.eq(result_csv),
        bulk_operations::finished_at.eq(finished_at),
    ))
    .execute(conn)?;
    if updated == 0 {
        return Err(PersistenceError::BulkOperationNotFound(
            operation_id.to_string(),
        ));
    }
    Ok(())
}

/// Mark every pending/running operation as failed.
///
/// Run once at process start: an operation left non-terminal by a previous
/// process is a batch-level fault, not something a new worker resumes.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn fail_stale_operations(
    conn: &mut SqliteConnection,
    finished_at: &str,
) -> Result<usize, PersistenceError> {
    Ok(diesel::update(
        bulk_operations::table.filter(
            bulk_operations::status
                .eq(BulkOperationStatus::Pending.as_str())
                .or(bulk_operations::status.eq(BulkOperationStatus::Running.as_str())),
        ),
    )
    .set((
        bulk_operations::status.eq(BulkOperationStatus::Failed.as_str()),
        bulk_operations::finished_at.eq(finished_at),
    ))
    .execute(conn)?)
}
