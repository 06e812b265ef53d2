// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Request and response types for the API boundary.
//!
//! Requests carry wall-clock times as naive local datetimes plus the
//! poll's IANA timezone; conversion to absolute instants happens here,
//! through the domain resolver, before anything reaches the lifecycle
//! layer. Responses carry RFC 3339 instants.

use chrono::{NaiveDateTime, Utc};
use pollwarden_domain::{Poll, PollEdit, PollOption, resolve_local_time};
use pollwarden_lifecycle::{
    BulkProgress, BulkRequest, NewPollRequest, PollResults, ReopenRequest, ReopenSchedule,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while converting a request into lifecycle inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A required field is missing.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    /// Two fields were supplied that exclude each other.
    #[error("fields '{0}' and '{1}' are mutually exclusive")]
    ConflictingFields(&'static str, &'static str),
    /// A value failed domain validation during conversion.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// One option in a request or response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptionDto {
    /// The option text shown to voters.
    pub label: String,
    /// The reaction marker for this option.
    pub marker: String,
}

impl From<PollOptionDto> for PollOption {
    fn from(dto: PollOptionDto) -> Self {
        Self::new(dto.label, dto.marker)
    }
}

impl From<&PollOption> for PollOptionDto {
    fn from(option: &PollOption) -> Self {
        Self {
            label: option.label.clone(),
            marker: option.marker.clone(),
        }
    }
}

/// API request to create a poll.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreatePollRequest {
    /// The actor ID performing this action.
    pub actor_id: String,
    /// The role of the actor.
    pub actor_role: String,
    /// The poll title.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Local wall-clock open time; required unless `open_immediately`.
    #[serde(default)]
    pub open_time: Option<NaiveDateTime>,
    /// Local wall-clock close time.
    pub close_time: NaiveDateTime,
    /// IANA timezone the times are declared in.
    pub timezone: String,
    /// Whether votes are hidden while active.
    #[serde(default)]
    pub anonymous: bool,
    /// Whether multiple selections are allowed.
    #[serde(default)]
    pub multiple_choice: bool,
    /// Maximum selections per ballot.
    #[serde(default = "default_max_choices")]
    pub max_choices: u8,
    /// Ordered option list.
    pub options: Vec<PollOptionDto>,
    /// Create the poll already active and announce it immediately.
    #[serde(default)]
    pub open_immediately: bool,
}

const fn default_max_choices() -> u8 {
    1
}

impl CreatePollRequest {
    /// Resolves local times and builds the lifecycle creation request.
    ///
    /// # Errors
    ///
    /// Returns an error if `open_time` is missing for a scheduled poll or
    /// a time cannot be resolved in the declared timezone.
    pub fn into_new_poll_request(self) -> Result<NewPollRequest, RequestError> {
        let close_time = resolve_local_time(self.close_time, &self.timezone).map_err(|e| {
            RequestError::InvalidValue {
                field: "close_time",
                message: e.to_string(),
            }
        })?;

        let open_time = if self.open_immediately {
            Utc::now()
        } else {
            let open_local = self
                .open_time
                .ok_or(RequestError::MissingField("open_time"))?;
            resolve_local_time(open_local, &self.timezone).map_err(|e| {
                RequestError::InvalidValue {
                    field: "open_time",
                    message: e.to_string(),
                }
            })?
        };

        Ok(NewPollRequest {
            name: self.name,
            description: self.description,
            open_time,
            close_time,
            timezone: self.timezone,
            anonymous: self.anonymous,
            multiple_choice: self.multiple_choice,
            max_choices: self.max_choices,
            options: self.options.into_iter().map(PollOption::from).collect(),
            open_immediately: self.open_immediately,
        })
    }
}

/// API request to edit a poll. Times are local wall-clock values in the
/// poll's stored timezone.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditPollRequest {
    /// The actor ID performing this action.
    pub actor_id: String,
    /// The role of the actor.
    pub actor_role: String,
    /// New poll title.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New local open time.
    #[serde(default)]
    pub open_time: Option<NaiveDateTime>,
    /// New local close time.
    #[serde(default)]
    pub close_time: Option<NaiveDateTime>,
    /// New full option list.
    #[serde(default)]
    pub options: Option<Vec<PollOptionDto>>,
}

impl EditPollRequest {
    /// Resolves local times against the poll's stored timezone and
    /// builds the domain edit.
    ///
    /// # Errors
    ///
    /// Returns an error if a time cannot be resolved in the timezone.
    pub fn into_poll_edit(self, timezone: &str) -> Result<PollEdit, RequestError> {
        let open_time = self
            .open_time
            .map(|local| resolve_local_time(local, timezone))
            .transpose()
            .map_err(|e| RequestError::InvalidValue {
                field: "open_time",
                message: e.to_string(),
            })?;
        let close_time = self
            .close_time
            .map(|local| resolve_local_time(local, timezone))
            .transpose()
            .map_err(|e| RequestError::InvalidValue {
                field: "close_time",
                message: e.to_string(),
            })?;

        Ok(PollEdit {
            name: self.name,
            description: self.description,
            open_time,
            close_time,
            options: self
                .options
                .map(|options| options.into_iter().map(PollOption::from).collect()),
        })
    }
}

/// API request to reopen a closed poll.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReopenPollRequest {
    /// The actor ID performing this action.
    pub actor_id: String,
    /// The role of the actor.
    pub actor_role: String,
    /// New local close time; mutually exclusive with `extend_by_minutes`.
    #[serde(default)]
    pub new_close_time: Option<NaiveDateTime>,
    /// Extend the close time to now plus this many minutes; mutually
    /// exclusive with `new_close_time`.
    #[serde(default)]
    pub extend_by_minutes: Option<i64>,
    /// Delete all existing votes before reopening.
    #[serde(default)]
    pub reset_votes: bool,
}

impl ReopenPollRequest {
    /// Builds the lifecycle reopen request.
    ///
    /// # Errors
    ///
    /// Returns an error if both schedule fields are supplied or the new
    /// close time cannot be resolved in the poll's timezone.
    pub fn into_reopen_request(self, timezone: &str) -> Result<ReopenRequest, RequestError> {
        let schedule = match (self.new_close_time, self.extend_by_minutes) {
            (Some(_), Some(_)) => {
                return Err(RequestError::ConflictingFields(
                    "new_close_time",
                    "extend_by_minutes",
                ));
            }
            (Some(local), None) => {
                let at = resolve_local_time(local, timezone).map_err(|e| {
                    RequestError::InvalidValue {
                        field: "new_close_time",
                        message: e.to_string(),
                    }
                })?;
                ReopenSchedule::NewCloseTime(at)
            }
            (None, Some(minutes)) => ReopenSchedule::ExtendBy(chrono::Duration::minutes(minutes)),
            (None, None) => ReopenSchedule::KeepCloseTime,
        };
        Ok(ReopenRequest {
            schedule,
            reset_votes: self.reset_votes,
        })
    }
}

/// API request carrying only actor attribution (open, close, delete).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActorRequest {
    /// The actor ID performing this action.
    pub actor_id: String,
    /// The role of the actor.
    pub actor_role: String,
}

/// API request to cast a ballot.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CastVoteRequest {
    /// Opaque voter identifier.
    pub voter_id: String,
    /// Zero-based option indices.
    pub option_indices: Vec<u32>,
}

/// API request to submit a bulk operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkSubmitRequest {
    /// The actor ID performing this action.
    pub actor_id: String,
    /// The role of the actor.
    pub actor_role: String,
    /// One of `close`, `reopen`, `delete`, `export`.
    pub op_type: String,
    /// The target polls, in submission order.
    pub target_poll_ids: Vec<i64>,
    /// Extend reopen close times to now plus this many minutes.
    #[serde(default)]
    pub extend_by_minutes: Option<i64>,
    /// Delete votes when reopening.
    #[serde(default)]
    pub reset_votes: bool,
}

impl BulkSubmitRequest {
    /// Builds the bulk engine request.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown operation type.
    pub fn into_bulk_request(self) -> Result<BulkRequest, RequestError> {
        let op_type = pollwarden_domain::BulkOperationType::from_str(&self.op_type).map_err(
            |e| RequestError::InvalidValue {
                field: "op_type",
                message: e.to_string(),
            },
        )?;
        let reopen = if op_type == pollwarden_domain::BulkOperationType::Reopen {
            let schedule = self.extend_by_minutes.map_or(
                ReopenSchedule::KeepCloseTime,
                |minutes| ReopenSchedule::ExtendBy(chrono::Duration::minutes(minutes)),
            );
            Some(ReopenRequest {
                schedule,
                reset_votes: self.reset_votes,
            })
        } else {
            None
        };
        Ok(BulkRequest {
            op_type,
            target_poll_ids: self.target_poll_ids,
            reopen,
        })
    }
}

/// API representation of a poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    /// The poll identifier.
    pub poll_id: i64,
    /// The poll title.
    pub name: String,
    /// The description, if any.
    pub description: Option<String>,
    /// Current status.
    pub status: String,
    /// Open instant (RFC 3339, UTC).
    pub open_time: String,
    /// Close instant (RFC 3339, UTC).
    pub close_time: String,
    /// Declared IANA timezone.
    pub timezone: String,
    /// Whether votes are hidden while active.
    pub anonymous: bool,
    /// Whether multiple selections are allowed.
    pub multiple_choice: bool,
    /// Maximum selections per ballot.
    pub max_choices: u8,
    /// Ordered option list.
    pub options: Vec<PollOptionDto>,
    /// The external message reference, once announced.
    pub message_ref: Option<String>,
}

impl From<&Poll> for PollResponse {
    fn from(poll: &Poll) -> Self {
        Self {
            poll_id: poll.poll_id,
            name: poll.name.clone(),
            description: poll.description.clone(),
            status: poll.status.as_str().to_string(),
            open_time: poll.open_time.to_rfc3339(),
            close_time: poll.close_time.to_rfc3339(),
            timezone: poll.timezone.clone(),
            anonymous: poll.anonymous,
            multiple_choice: poll.multiple_choice,
            max_choices: poll.max_choices,
            options: poll.options.iter().map(PollOptionDto::from).collect(),
            message_ref: poll.message_ref.clone(),
        }
    }
}

/// API representation of aggregate results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    /// The poll identifier.
    pub poll_id: i64,
    /// Total vote rows.
    pub total_votes: i64,
    /// One tally per option, in option order.
    pub tallies: Vec<TallyDto>,
}

/// One option's tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyDto {
    /// The option label.
    pub label: String,
    /// The option marker.
    pub marker: String,
    /// Vote count.
    pub votes: i64,
}

impl From<&PollResults> for ResultsResponse {
    fn from(results: &PollResults) -> Self {
        Self {
            poll_id: results.poll_id,
            total_votes: results.total_votes,
            tallies: results
                .tallies
                .iter()
                .map(|tally| TallyDto {
                    label: tally.label.clone(),
                    marker: tally.marker.clone(),
                    votes: tally.votes,
                })
                .collect(),
        }
    }
}

/// One rejected edit field in an edit response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedFieldDto {
    /// The rejected field name.
    pub field: String,
    /// Why it was rejected.
    pub reason: String,
}

/// API response for an edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditPollResponse {
    /// The poll after the accepted fields were applied.
    pub poll: PollResponse,
    /// Names of the fields that were applied.
    pub applied: Vec<String>,
    /// Proposed fields that were discarded, with reasons.
    pub rejected: Vec<RejectedFieldDto>,
    /// A notification failure message, if the external refresh failed.
    pub notification_error: Option<String>,
}

/// API response for a lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    /// The poll after the transition.
    pub poll: PollResponse,
    /// A notification failure message, if an external step failed.
    pub notification_error: Option<String>,
}

/// One per-item error in a bulk progress response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemErrorDto {
    /// The target poll that failed.
    pub poll_id: i64,
    /// The failure message.
    pub message: String,
}

/// API response for bulk progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkProgressResponse {
    /// The operation identifier.
    pub operation_id: String,
    /// The operation type.
    pub op_type: String,
    /// Current status.
    pub status: String,
    /// Number of targets.
    pub total_count: usize,
    /// Targets processed so far.
    pub processed_count: usize,
    /// Targets that succeeded.
    pub success_count: usize,
    /// Targets that failed.
    pub failure_count: usize,
    /// Completion percentage, 0..=100.
    pub percent_complete: u8,
    /// The item currently being processed, if any.
    pub current_poll_id: Option<i64>,
    /// Per-item errors accumulated so far.
    pub errors: Vec<BulkItemErrorDto>,
}

impl From<&BulkProgress> for BulkProgressResponse {
    fn from(progress: &BulkProgress) -> Self {
        Self {
            operation_id: progress.operation_id.clone(),
            op_type: progress.op_type.as_str().to_string(),
            status: progress.status.as_str().to_string(),
            total_count: progress.total_count,
            processed_count: progress.processed_count,
            success_count: progress.success_count,
            failure_count: progress.failure_count,
            percent_complete: progress.percent_complete(),
            current_poll_id: progress.current_poll_id,
            errors: progress
                .errors
                .iter()
                .map(|(poll_id, message)| BulkItemErrorDto {
                    poll_id: *poll_id,
                    message: message.clone(),
                })
                .collect(),
        }
    }
}

/// API response for a bulk submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkSubmitResponse {
    /// The assigned operation identifier.
    pub operation_id: String,
}
