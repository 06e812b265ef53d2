// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Voting-window resolution for polls.
//!
//! Administrators declare open and close times as wall-clock times in an
//! IANA timezone. This module resolves those to absolute UTC instants and
//! enforces the window invariants.
//!
//! ## Invariants
//!
//! - Windows are stored as UTC instants; the declared timezone is kept
//!   alongside them for re-display
//! - `close_time` is strictly after `open_time`
//! - Window duration is within 1 minute to 30 days inclusive
//! - DST-ambiguous or non-existent local times are rejected, never guessed

use crate::error::DomainError;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Minimum permitted poll duration.
pub const MIN_POLL_DURATION: Duration = Duration::minutes(1);

/// Maximum permitted poll duration.
pub const MAX_POLL_DURATION: Duration = Duration::days(30);

/// A resolved voting window: both bounds as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    /// Absolute instant at which the poll opens.
    pub open_time: DateTime<Utc>,
    /// Absolute instant at which the poll closes.
    pub close_time: DateTime<Utc>,
}

/// Parses an IANA timezone identifier.
///
/// # Errors
///
/// Returns `DomainError::InvalidTimezone` if the identifier is unknown.
pub fn parse_timezone(timezone: &str) -> Result<Tz, DomainError> {
    timezone
        .parse()
        .map_err(|_| DomainError::InvalidTimezone(timezone.to_string()))
}

/// Resolves a wall-clock time in the declared timezone to a UTC instant.
///
/// # Errors
///
/// Returns an error if the timezone is invalid, or if the local time is
/// ambiguous or non-existent due to a DST transition.
pub fn resolve_local_time(
    local_time: NaiveDateTime,
    timezone: &str,
) -> Result<DateTime<Utc>, DomainError> {
    let tz: Tz = parse_timezone(timezone)?;
    let resolved = tz.from_local_datetime(&local_time).single().ok_or_else(|| {
        DomainError::UnresolvableLocalTime {
            timezone: timezone.to_string(),
            local_time: local_time.to_string(),
        }
    })?;
    Ok(resolved.with_timezone(&Utc))
}

/// Resolves a declared (open, close) wall-clock pair to a validated window.
///
/// # Errors
///
/// Returns an error if either time cannot be resolved or the resulting
/// window violates the ordering or duration invariants.
pub fn resolve_window(
    open_local: NaiveDateTime,
    close_local: NaiveDateTime,
    timezone: &str,
) -> Result<PollWindow, DomainError> {
    let open_time = resolve_local_time(open_local, timezone)?;
    let close_time = resolve_local_time(close_local, timezone)?;
    validate_window(open_time, close_time)?;
    Ok(PollWindow {
        open_time,
        close_time,
    })
}

/// Validates the ordering and duration invariants of a window.
///
/// # Errors
///
/// Returns `CloseNotAfterOpen` if the window is empty or inverted, or
/// `DurationOutOfBounds` if the duration is outside 1 minute to 30 days.
pub fn validate_window(
    open_time: DateTime<Utc>,
    close_time: DateTime<Utc>,
) -> Result<(), DomainError> {
    if close_time <= open_time {
        return Err(DomainError::CloseNotAfterOpen {
            open_time: open_time.to_rfc3339(),
            close_time: close_time.to_rfc3339(),
        });
    }
    let duration = close_time - open_time;
    if duration < MIN_POLL_DURATION || duration > MAX_POLL_DURATION {
        return Err(DomainError::DurationOutOfBounds {
            duration_seconds: duration.num_seconds(),
        });
    }
    Ok(())
}

/// Validates that a proposed close time lies strictly in the future.
///
/// Used when an edit or reopen reschedules the close job.
///
/// # Errors
///
/// Returns `CloseTimeNotFuture` if the close time is not after `now`.
pub fn validate_close_in_future(
    close_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if close_time <= now {
        return Err(DomainError::CloseTimeNotFuture {
            close_time: close_time.to_rfc3339(),
        });
    }
    Ok(())
}
