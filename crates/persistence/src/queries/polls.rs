// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Poll query operations.
//!
//! Rows are reconstructed into `pollwarden_domain::Poll` values; the
//! stored status and timestamps must parse, or the row is reported as a
//! reconstruction error rather than silently skipped.

use crate::diesel_schema::{poll_options, polls};
use crate::error::PersistenceError;
use crate::parse_instant;
use diesel::prelude::*;
use pollwarden_domain::{Poll, PollOption, PollStatus};
use std::str::FromStr;

#[derive(Queryable, Selectable)]
#[diesel(table_name = polls)]
struct PollRow {
    poll_id: i64,
    name: String,
    description: Option<String>,
    status: String,
    open_time: String,
    close_time: String,
    timezone: String,
    anonymous: i32,
    multiple_choice: i32,
    max_choices: i32,
    message_ref: Option<String>,
    created_at: String,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = poll_options)]
#[allow(dead_code)]
struct PollOptionRow {
    option_id: i64,
    poll_id: i64,
    position: i32,
    label: String,
    marker: String,
}

fn reconstruct_poll(row: PollRow, option_rows: Vec<PollOptionRow>) -> Result<Poll, PersistenceError> {
    let status = PollStatus::from_str(&row.status).map_err(|e| {
        PersistenceError::ReconstructionError(format!("poll {}: {e}", row.poll_id))
    })?;
    let open_time = parse_instant(&row.open_time)?;
    let close_time = parse_instant(&row.close_time)?;
    let created_at = parse_instant(&row.created_at)?;

    let options = option_rows
        .into_iter()
        .map(|o| PollOption::new(o.label, o.marker))
        .collect();

    let max_choices = u8::try_from(row.max_choices).map_err(|_| {
        PersistenceError::ReconstructionError(format!(
            "poll {}: max_choices {} out of range",
            row.poll_id, row.max_choices
        ))
    })?;

    Ok(Poll {
        poll_id: row.poll_id,
        name: row.name,
        description: row.description,
        status,
        open_time,
        close_time,
        timezone: row.timezone,
        anonymous: row.anonymous != 0,
        multiple_choice: row.multiple_choice != 0,
        max_choices,
        options,
        message_ref: row.message_ref,
        created_at,
    })
}

fn load_options(
    conn: &mut SqliteConnection,
    poll_id: i64,
) -> Result<Vec<PollOptionRow>, PersistenceError> {
    poll_options::table
        .filter(poll_options::poll_id.eq(poll_id))
        .order(poll_options::position.asc())
        .select(PollOptionRow::as_select())
        .load::<PollOptionRow>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("load_options: {e}")))
}

/// Fetch one poll with its ordered option list.
///
/// # Errors
///
/// Returns an error if the query fails or the row cannot be reconstructed.
pub fn get_poll(
    conn: &mut SqliteConnection,
    poll_id: i64,
) -> Result<Option<Poll>, PersistenceError> {
    let row = polls::table
        .filter(polls::poll_id.eq(poll_id))
        .select(PollRow::as_select())
        .first::<PollRow>(conn)
        .optional()
        .map_err(|e| PersistenceError::QueryFailed(format!("get_poll: {e}")))?;

    match row {
        Some(row) => {
            let options = load_options(conn, poll_id)?;
            reconstruct_poll(row, options).map(Some)
        }
        None => Ok(None),
    }
}

/// List every poll, ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be reconstructed.
pub fn list_polls(conn: &mut SqliteConnection) -> Result<Vec<Poll>, PersistenceError> {
    let rows = polls::table
        .order(polls::poll_id.asc())
        .select(PollRow::as_select())
        .load::<PollRow>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("list_polls: {e}")))?;

    rows.into_iter()
        .map(|row| {
            let options = load_options(conn, row.poll_id)?;
            reconstruct_poll(row, options)
        })
        .collect()
}

/// List every poll in the given status, ordered by id.
///
/// This is the scheduler-recovery query: `scheduled` polls yield open
/// jobs, `active` polls yield close jobs.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be reconstructed.
pub fn list_polls_by_status(
    conn: &mut SqliteConnection,
    status: PollStatus,
) -> Result<Vec<Poll>, PersistenceError> {
    let rows = polls::table
        .filter(polls::status.eq(status.as_str()))
        .order(polls::poll_id.asc())
        .select(PollRow::as_select())
        .load::<PollRow>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("list_polls_by_status: {e}")))?;

    rows.into_iter()
        .map(|row| {
            let options = load_options(conn, row.poll_id)?;
            reconstruct_poll(row, options)
        })
        .collect()
}
