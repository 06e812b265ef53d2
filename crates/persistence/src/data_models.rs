// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use chrono::{DateTime, Utc};
use pollwarden_domain::{BulkOperationStatus, BulkOperationType, PollOption, PollStatus};
use serde::{Deserialize, Serialize};

/// Input data for creating a poll row and its option rows.
#[derive(Debug, Clone)]
pub struct NewPollRecord {
    /// The poll title.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial status (`Scheduled`, or `Active` when opened immediately).
    pub status: PollStatus,
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
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

/// Durable record of a bulk operation.
///
/// Timestamps are stored as RFC 3339 text, matching the column encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationRecord {
    /// The operation identifier.
    pub operation_id: String,
    /// The lifecycle transition applied to each target.
    pub op_type: BulkOperationType,
    /// Current batch status.
    pub status: BulkOperationStatus,
    /// The actor that submitted the operation.
    pub submitted_by: String,
    /// Number of target polls.
    pub total_count: i32,
    /// Number of targets processed so far.
    pub processed_count: i32,
    /// Number of targets that succeeded.
    pub success_count: i32,
    /// Number of targets that failed.
    pub failure_count: i32,
    /// Operation parameters as JSON (target ids and per-type options).
    pub parameters_json: String,
    /// CSV artifact for export operations.
    pub result_csv: Option<String>,
    /// Submission instant (RFC 3339).
    pub created_at: String,
    /// Instant the worker started (RFC 3339).
    pub started_at: Option<String>,
    /// Instant the operation reached a terminal status (RFC 3339).
    pub finished_at: Option<String>,
}

/// One isolated per-item failure inside a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    /// The target poll that failed.
    pub poll_id: i64,
    /// The target's position in the submitted list.
    pub position: i32,
    /// The failure message.
    pub message: String,
}
