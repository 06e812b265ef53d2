// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence layer for Pollwarden.
//!
//! This crate provides database persistence for polls, votes, and bulk
//! operation records. It is built on Diesel over `SQLite`.
//!
//! ## Recovery model
//!
//! The `polls` table's `status`, `open_time`, `close_time`, and `timezone`
//! columns are the sole durable representation of scheduling intent. There
//! is no job-queue table; the scheduler's in-memory job table is derived
//! from poll rows at startup and is never persisted. This keeps
//! `restore_from_store` the single recovery code path.
//!
//! ## Testing
//!
//! Tests run against unique in-memory `SQLite` databases. Uniqueness comes
//! from an atomic counter, eliminating time-based collisions between
//! concurrently running tests.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

mod data_models;
mod diesel_schema;
mod error;
mod mutations;
mod queries;
mod sqlite;

#[cfg(test)]
mod tests;

pub use data_models::{BulkItemError, BulkOperationRecord, NewPollRecord};
pub use error::PersistenceError;

use pollwarden_domain::{
    Ballot, BulkOperationStatus, BulkOperationType, Poll, PollEdit, PollStatus,
};

/// Atomic counter for generating unique in-memory database names.
///
/// This ensures deterministic test isolation by eliminating time-based
/// collisions. Each call to `new_in_memory()` receives a unique
/// sequential ID.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Formats a UTC instant for storage (RFC 3339).
pub(crate) fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339()
}

/// Parses a stored RFC 3339 instant back into UTC.
pub(crate) fn parse_instant(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            PersistenceError::ReconstructionError(format!("invalid stored instant '{value}': {e}"))
        })
}

/// Persistence adapter for polls, votes, and bulk operation records.
///
/// Owns a single `SQLite` connection; callers serialize access (the
/// lifecycle layer wraps this in an async mutex).
pub struct Persistence {
    conn: SqliteConnection,
}

impl Persistence {
    /// Creates a new persistence adapter with an in-memory `SQLite`
    /// database.
    ///
    /// Each call receives a unique database instance via atomic counter,
    /// ensuring deterministic test isolation without time-based
    /// collisions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        let db_id = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let db_name = format!("memdb_pollwarden_{db_id}");
        let shared_memory_url = format!("file:{db_name}?mode=memory&cache=shared");

        let mut conn = sqlite::initialize_database(&shared_memory_url)?;
        sqlite::verify_foreign_key_enforcement(&mut conn)?;
        Ok(Self { conn })
    }

    /// Creates a new persistence adapter backed by a database file,
    /// creating and migrating it as needed. WAL mode is enabled for
    /// better read concurrency.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_with_file(path: &Path) -> Result<Self, PersistenceError> {
        let url = path.to_string_lossy();
        let mut conn = sqlite::initialize_database(&url)?;
        sqlite::enable_wal_mode(&mut conn)?;
        sqlite::verify_foreign_key_enforcement(&mut conn)?;
        Ok(Self { conn })
    }

    // --- polls ---

    /// Inserts a poll and its options; returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_poll(&mut self, record: &NewPollRecord) -> Result<i64, PersistenceError> {
        mutations::polls::insert_poll(&mut self.conn, record)
    }

    /// Fetches one poll with its ordered options.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be
    /// reconstructed.
    pub fn get_poll(&mut self, poll_id: i64) -> Result<Option<Poll>, PersistenceError> {
        queries::polls::get_poll(&mut self.conn, poll_id)
    }

    /// Lists every poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_polls(&mut self) -> Result<Vec<Poll>, PersistenceError> {
        queries::polls::list_polls(&mut self.conn)
    }

    /// Lists every poll in the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_polls_by_status(
        &mut self,
        status: PollStatus,
    ) -> Result<Vec<Poll>, PersistenceError> {
        queries::polls::list_polls_by_status(&mut self.conn, status)
    }

    /// Updates a poll's status.
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist.
    pub fn update_poll_status(
        &mut self,
        poll_id: i64,
        status: PollStatus,
    ) -> Result<(), PersistenceError> {
        mutations::polls::update_poll_status(&mut self.conn, poll_id, status)
    }

    /// Updates a poll's status and close time atomically (reopen).
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist.
    pub fn update_poll_status_and_close_time(
        &mut self,
        poll_id: i64,
        status: PollStatus,
        close_time: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        mutations::polls::update_poll_status_and_close_time(
            &mut self.conn,
            poll_id,
            status,
            close_time,
        )
    }

    /// Stores the messaging reference from the first announcement.
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist.
    pub fn set_message_ref(
        &mut self,
        poll_id: i64,
        message_ref: &str,
    ) -> Result<(), PersistenceError> {
        mutations::polls::set_message_ref(&mut self.conn, poll_id, message_ref)
    }

    /// Applies an already-validated edit.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn apply_poll_edit(
        &mut self,
        poll_id: i64,
        edit: &PollEdit,
    ) -> Result<(), PersistenceError> {
        mutations::polls::apply_poll_edit(&mut self.conn, poll_id, edit)
    }

    /// Deletes a poll and, via foreign keys, its options and votes.
    ///
    /// # Errors
    ///
    /// Returns `PollNotFound` if the poll does not exist.
    pub fn delete_poll(&mut self, poll_id: i64) -> Result<(), PersistenceError> {
        mutations::polls::delete_poll(&mut self.conn, poll_id)
    }

    // --- votes ---

    /// Inserts one ballot as one vote row per selected option.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateVote` if the voter already voted on this poll.
    pub fn insert_ballot(
        &mut self,
        poll_id: i64,
        ballot: &Ballot,
        cast_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        mutations::votes::insert_ballot(&mut self.conn, poll_id, ballot, &format_instant(cast_at))
    }

    /// True iff the voter already has vote rows for this poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn has_voted(&mut self, poll_id: i64, voter_id: &str) -> Result<bool, PersistenceError> {
        queries::votes::has_voted(&mut self.conn, poll_id, voter_id)
    }

    /// Total vote rows for a poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_votes(&mut self, poll_id: i64) -> Result<i64, PersistenceError> {
        queries::votes::count_votes(&mut self.conn, poll_id)
    }

    /// Aggregate counts per option index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_votes_by_option(
        &mut self,
        poll_id: i64,
    ) -> Result<Vec<(i32, i64)>, PersistenceError> {
        queries::votes::count_votes_by_option(&mut self.conn, poll_id)
    }

    /// Deletes all votes for a poll (reopen with vote reset).
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_votes_for_poll(&mut self, poll_id: i64) -> Result<usize, PersistenceError> {
        mutations::votes::delete_votes_for_poll(&mut self.conn, poll_id)
    }

    // --- bulk operations ---

    /// Inserts a pending bulk operation record.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_bulk_operation(
        &mut self,
        operation_id: &str,
        op_type: BulkOperationType,
        submitted_by: &str,
        total_count: i32,
        parameters_json: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        mutations::bulk::insert_bulk_operation(
            &mut self.conn,
            operation_id,
            op_type,
            submitted_by,
            total_count,
            parameters_json,
            &format_instant(created_at),
        )
    }

    /// Marks an operation as running.
    ///
    /// # Errors
    ///
    /// Returns `BulkOperationNotFound` if the record does not exist.
    pub fn mark_bulk_started(
        &mut self,
        operation_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        mutations::bulk::mark_bulk_started(
            &mut self.conn,
            operation_id,
            &format_instant(started_at),
        )
    }

    /// Mirrors progress counters to the durable record.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_bulk_progress(
        &mut self,
        operation_id: &str,
        processed_count: i32,
        success_count: i32,
        failure_count: i32,
    ) -> Result<(), PersistenceError> {
        mutations::bulk::update_bulk_progress(
            &mut self.conn,
            operation_id,
            processed_count,
            success_count,
            failure_count,
        )
    }

    /// Records one isolated per-item failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_bulk_item_error(
        &mut self,
        operation_id: &str,
        poll_id: i64,
        position: i32,
        message: &str,
    ) -> Result<(), PersistenceError> {
        mutations::bulk::insert_bulk_item_error(
            &mut self.conn,
            operation_id,
            poll_id,
            position,
            message,
        )
    }

    /// Writes an operation's terminal status and final counts.
    ///
    /// # Errors
    ///
    /// Returns `BulkOperationNotFound` if the record does not exist.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_bulk_operation(
        &mut self,
        operation_id: &str,
        status: BulkOperationStatus,
        processed_count: i32,
        success_count: i32,
        failure_count: i32,
        result_csv: Option<&str>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        mutations::bulk::finish_bulk_operation(
            &mut self.conn,
            operation_id,
            status,
            processed_count,
            success_count,
            failure_count,
            result_csv,
            &format_instant(finished_at),
        )
    }

    /// Fails every pending/running operation left over from a previous
    /// process. Returns the number of operations failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn fail_stale_bulk_operations(
        &mut self,
        finished_at: DateTime<Utc>,
    ) -> Result<usize, PersistenceError> {
        mutations::bulk::fail_stale_operations(&mut self.conn, &format_instant(finished_at))
    }

    /// Fetches one bulk operation record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_bulk_operation(
        &mut self,
        operation_id: &str,
    ) -> Result<Option<BulkOperationRecord>, PersistenceError> {
        queries::bulk::get_bulk_operation(&mut self.conn, operation_id)
    }

    /// Lists an operation's per-item errors in submission order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_bulk_item_errors(
        &mut self,
        operation_id: &str,
    ) -> Result<Vec<BulkItemError>, PersistenceError> {
        queries::bulk::list_bulk_item_errors(&mut self.conn, operation_id)
    }

    /// Number of non-terminal operations submitted by an actor.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_active_operations_for_actor(
        &mut self,
        submitted_by: &str,
    ) -> Result<i64, PersistenceError> {
        queries::bulk::count_active_operations_for_actor(&mut self.conn, submitted_by)
    }
}
