// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Poll mutation operations.
//!
//! Inserts, status updates, edits, and deletes. Status changes are driven
//! exclusively by the lifecycle service; nothing here validates
//! transitions.

use crate::data_models::NewPollRecord;
use crate::diesel_schema::{poll_options, polls};
use crate::error::PersistenceError;
use crate::format_instant;
use crate::sqlite::get_last_insert_rowid;
use diesel::prelude::*;
use pollwarden_domain::{PollEdit, PollOption, PollStatus};

#[derive(Insertable)]
#[diesel(table_name = polls)]
struct NewPollRow {
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

#[derive(Insertable)]
#[diesel(table_name = poll_options)]
struct NewOptionRow {
    poll_id: i64,
    position: i32,
    label: String,
    marker: String,
}

fn option_rows(poll_id: i64, options: &[PollOption]) -> Vec<NewOptionRow> {
    options
        .iter()
        .enumerate()
        .map(|(position, option)| NewOptionRow {
            poll_id,
            position: i32::try_from(position).unwrap_or(i32::MAX),
            label: option.label.clone(),
            marker: option.marker.clone(),
        })
        .collect()
}

/// Insert a poll row and its option rows atomically.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_poll(
    conn: &mut SqliteConnection,
    record: &NewPollRecord,
) -> Result<i64, PersistenceError> {
    conn.transaction::<i64, PersistenceError, _>(|conn| {
        let row = NewPollRow {
            name: record.name.clone(),
            description: record.description.clone(),
            status: record.status.as_str().to_string(),
            open_time: format_instant(record.open_time),
            close_time: format_instant(record.close_time),
            timezone: record.timezone.clone(),
            anonymous: i32::from(record.anonymous),
            multiple_choice: i32::from(record.multiple_choice),
            max_choices: i32::from(record.max_choices),
            message_ref: None,
            created_at: format_instant(record.created_at),
        };
        diesel::insert_into(polls::table).values(&row).execute(conn)?;
        let poll_id = get_last_insert_rowid(conn)?;

        diesel::insert_into(poll_options::table)
            .values(&option_rows(poll_id, &record.options))
            .execute(conn)?;

        Ok(poll_id)
    })
}

/// Update a poll's status.
///
/// # Errors
///
/// Returns `PollNotFound` if no row was updated.
pub fn update_poll_status(
    conn: &mut SqliteConnection,
    poll_id: i64,
    status: PollStatus,
) -> Result<(), PersistenceError> {
    let updated = diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
        .set(polls::status.eq(status.as_str()))
        .execute(conn)?;
    if updated == 0 {
        return Err(PersistenceError::PollNotFound(poll_id));
    }
    Ok(())
}

/// Update a poll's status and close time in one commit.
///
/// Used by reopen, where the new close time and the status flip must land
/// together.
///
/// # Errors
///
/// Returns `PollNotFound` if no row was updated.
pub fn update_poll_status_and_close_time(
    conn: &mut SqliteConnection,
    poll_id: i64,
    status: PollStatus,
    close_time: chrono::DateTime<chrono::Utc>,
) -> Result<(), PersistenceError> {
    let updated = diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
        .set((
            polls::status.eq(status.as_str()),
            polls::close_time.eq(format_instant(close_time)),
        ))
        .execute(conn)?;
    if updated == 0 {
        return Err(PersistenceError::PollNotFound(poll_id));
    }
    Ok(())
}

/// Store the messaging reference returned by the first announcement.
///
/// # Errors
///
/// Returns `PollNotFound` if no row was updated.
pub fn set_message_ref(
    conn: &mut SqliteConnection,
    poll_id: i64,
    message_ref: &str,
) -> Result<(), PersistenceError> {
    let updated = diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
        .set(polls::message_ref.eq(message_ref))
        .execute(conn)?;
    if updated == 0 {
        return Err(PersistenceError::PollNotFound(poll_id));
    }
    Ok(())
}

/// Apply an already-validated edit: each accepted field is written, and a
/// replaced option list is swapped atomically with the field updates.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_poll_edit(
    conn: &mut SqliteConnection,
    poll_id: i64,
    edit: &PollEdit,
) -> Result<(), PersistenceError> {
    conn.transaction::<(), PersistenceError, _>(|conn| {
        if let Some(name) = &edit.name {
            diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
                .set(polls::name.eq(name))
                .execute(conn)?;
        }
        if let Some(description) = &edit.description {
            diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
                .set(polls::description.eq(description))
                .execute(conn)?;
        }
        if let Some(open_time) = edit.open_time {
            diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
                .set(polls::open_time.eq(format_instant(open_time)))
                .execute(conn)?;
        }
        if let Some(close_time) = edit.close_time {
            diesel::update(polls::table.filter(polls::poll_id.eq(poll_id)))
                .set(polls::close_time.eq(format_instant(close_time)))
                .execute(conn)?;
        }
        if let Some(options) = &edit.options {
            diesel::delete(poll_options::table.filter(poll_options::poll_id.eq(poll_id)))
                .execute(conn)?;
            diesel::insert_into(poll_options::table)
                .values(&option_rows(poll_id, options))
                .execute(conn)?;
        }
        Ok(())
    })
}

/// Delete a poll and, via foreign keys, its options and votes.
///
/// # Errors
///
/// Returns `PollNotFound` if the poll does not exist.
pub fn delete_poll(conn: &mut SqliteConnection, poll_id: i64) -> Result<(), PersistenceError> {
    let deleted =
        diesel::delete(polls::table.filter(polls::poll_id.eq(poll_id))).execute(conn)?;
    if deleted == 0 {
        return Err(PersistenceError::PollNotFound(poll_id));
    }
    Ok(())
}
