// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Vote mutation operations.
//!
//! Votes are append-only while a poll is active. The lifecycle service is
//! responsible for status gating; these functions only write rows.

use crate::diesel_schema::votes;
use crate::error::PersistenceError;
use diesel::prelude::*;
use pollwarden_domain::Ballot;

#[derive(Insertable)]
#[diesel(table_name = votes)]
struct NewVoteRow {
    poll_id: i64,
    voter_id: String,
    option_index: i32,
    created_at: String,
}

/// Insert one ballot as one row per selected option, atomically.
///
/// # Errors
///
/// Returns `DuplicateVote` if the voter already has rows for this poll
/// (enforced by the unique index), or another error if the insert fails.
pub fn insert_ballot(
    conn: &mut SqliteConnection,
    poll_id: i64,
    ballot: &Ballot,
    created_at: &str,
) -> Result<(), PersistenceError> {
    let rows: Vec<NewVoteRow> = ballot
        .option_indices
        .iter()
        .map(|&index| NewVoteRow {
            poll_id,
            voter_id: ballot.voter_id.clone(),
            option_index: i32::try_from(index).unwrap_or(i32::MAX),
            created_at: created_at.to_string(),
        })
        .collect();

    conn.transaction::<(), PersistenceError, _>(|conn| {
        diesel::insert_into(votes::table)
            .values(&rows)
            .execute(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => PersistenceError::DuplicateVote {
                    poll_id,
                    voter_id: ballot.voter_id.clone(),
                },
                other => other.into(),
            })?;
        Ok(())
    })
}

/// Delete all votes for a poll (reopen with vote reset).
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_votes_for_poll(
    conn: &mut SqliteConnection,
    poll_id: i64,
) -> Result<usize, PersistenceError> {
    Ok(diesel::delete(votes::table.filter(votes::poll_id.eq(poll_id))).execute(conn)?)
}
