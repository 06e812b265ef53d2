// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Vote query operations.

use crate::diesel_schema::votes;
use crate::error::PersistenceError;
use diesel::dsl::count_star;
use diesel::prelude::*;

/// True iff the voter already has vote rows for this poll.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn has_voted(
    conn: &mut SqliteConnection,
    poll_id: i64,
    voter_id: &str,
) -> Result<bool, PersistenceError> {
    let count: i64 = votes::table
        .filter(votes::poll_id.eq(poll_id))
        .filter(votes::voter_id.eq(voter_id))
        .count()
        .get_result(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("has_voted: {e}")))?;
    Ok(count > 0)
}

/// Total number of vote rows for a poll.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_votes(conn: &mut SqliteConnection, poll_id: i64) -> Result<i64, PersistenceError> {
    votes::table
        .filter(votes::poll_id.eq(poll_id))
        .count()
        .get_result(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("count_votes: {e}")))
}

/// Aggregate vote counts per option index, ascending by index.
///
/// Options with zero votes are absent; callers fill the gaps against the
/// poll's option list.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_votes_by_option(
    conn: &mut SqliteConnection,
    poll_id: i64,
) -> Result<Vec<(i32, i64)>, PersistenceError> {
    votes::table
        .filter(votes::poll_id.eq(poll_id))
        .group_by(votes::option_index)
        .select((votes::option_index, count_star()))
        .order(votes::option_index.asc())
        .load::<(i32, i64)>(conn)
        .map_err(|e| PersistenceError::QueryFailed(format!("count_votes_by_option: {e}")))
}
