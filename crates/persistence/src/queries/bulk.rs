// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Bulk operation query operations.

use crate::data_models::{BulkItemError, BulkOperationRecord};
use crate::diesel_schema::{bulk_operation_errors, bulk_operations};
use crate::error::PersistenceError;
use diesel::prelude::*;
use pollwarden_domain::{BulkOperationStatus, BulkOperationType};
use std::str::FromStr;

#[derive(Queryable, Selectable)]
#[diesel(table_name = bulk_operations)]
struct BulkOperationRow {
    operation_id: String,
    op_type: String,
    status: String,
    submitted_by: String,
    total_count: i32,
    processed_count: i32,
    success_count: i32,
    failure_count: i32,
    parameters_json: String,
    result_csv: Option<String>,
    created_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
}

impl BulkOperationRow {
    fn into_record(self) -> Result<BulkOperationRecord, PersistenceError> {
        let op_type = BulkOperationType::from_str(&self.op_type).map_err(|e| {
            PersistenceError::ReconstructionError(format!(
                "bulk operation {}: {e}",
                self.operation_id
            ))
        })?;
        let status = BulkOperationStatus::from_str(&self.status).map_err(|e| {
            PersistenceError::ReconstructionError(format!(
                "bulk operation {}: {e}",
                self.operation_id
            ))
        })?;
        Ok(BulkOperationRecord {
            operation_id: self.operation_id,
            op_type,
            status,
            submitted_by: self.submitted_by,
            total_count: self.total_count,
            processed_count: self.processed_count,
            success_count: self.success_count,
            failure_count: self.failure_count,
            parameters_json: self.parameters_json,
            result_csv: self.result_csv,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        })
    }
}

/// Fetch one bulk operation record.
///
/// # Errors
///
/// Returns an error if the query fails or the row cannot be reconstructed.
pub fn get_bulk_operation(
    conn: &mut SqliteConnection,
    operation_id: &str,
) -> Result<Option<BulkOperationRecord>, PersistenceError> {
    let row = bulk_operations::table
        .filter(bulk_operations::operation_id.eq(operation_id))
        .select(BulkOperationRow::as_select())
        .first::<BulkOperationRow>(conn)
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(format!("get_bulk_operation: {e}")))?;

    row.map(BulkOperationRow::into_record).transpose()
}

/// List an operation's per-item errors in submission order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_bulk_item_errors(
    conn: &mut SqliteConnection,
    operation_id: &str,
) -> Result<Vec<BulkItemError>, PersistenceError> {
    let rows = bulk_operation_errors::table
        .filter(bulk_operation_errors::operation_id.eq(operation_id))
        .order(bulk_operation_errors::position.asc())
        .select((
            bulk_operation_errors::poll_id,
            bulk_operation_errors::position,
            bulk_operation_errors::message,
        ))
        .load::<(i64, i32, String)>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("list_bulk_item_errors: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(poll_id, position, message)| BulkItemError {
            poll_id,
            position,
            message,
        })
        .collect())
}

/// Number of non-terminal operations submitted by an actor.
///
/// Backs the per-actor concurrency cap at submission time.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_active_operations_for_actor(
    conn: &mut SqliteConnection,
    submitted_by: &str,
) -> Result<i64, PersistenceError> {
    bulk_operations::table
        .filter(bulk_operations::submitted_by.eq(submitted_by))
        .filter(
            bulk_operations::status
                .eq(BulkOperationStatus::Pending.as_str())
                .or(bulk_operations::status.eq(BulkOperationStatus::Running.as_str())),
        )
        .count()
        .get_result(conn)
        .map_err(|e| {
            PersistenceError::QueryFailed(format!("count_active_operations_for_actor: {e}"))
        })
}
