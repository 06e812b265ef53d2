// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of a poll.
///
/// A poll is created `Scheduled` (or `Active` when opened immediately),
/// opens to `Active`, closes to `Closed`, and may reopen to `Active`.
/// There is no terminal status; polls leave the system only via explicit
/// administrative delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// The poll exists but has not yet opened for voting.
    Scheduled,
    /// The poll is open and accepting votes.
    Active,
    /// The poll has closed; results are final unless it is reopened.
    Closed,
}

impl PollStatus {
    /// Returns the string representation of the status.
    ///
    /// This is used for persistence and API serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from its string representation.
    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            _ => Err(DomainError::InvalidPollStatus {
                status: s.to_string(),
            }),
        }
    }
}

impl FromStr for PollStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single voting option: a human-readable label and the marker
/// (reaction emoji or similar) the messaging platform displays for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// The option text shown to voters.
    pub label: String,
    /// The reaction marker voters use to select this option.
    pub marker: String,
}

impl PollOption {
    /// Creates a new poll option.
    #[must_use]
    pub fn new(label: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            marker: marker.into(),
        }
    }
}

/// A poll: a time-bounded voting campaign with a lifecycle state.
///
/// `open_time` and `close_time` are absolute UTC instants. The declared
/// `timezone` is stored alongside them so user-supplied local times
/// re-display correctly regardless of the viewing client's clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    /// Store-assigned identifier, immutable after creation.
    pub poll_id: i64,
    /// The poll title.
    pub name: String,
    /// Optional longer description shown with the poll.
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: PollStatus,
    /// Absolute instant at which the poll opens.
    pub open_time: DateTime<Utc>,
    /// Absolute instant at which the poll closes.
    pub close_time: DateTime<Utc>,
    /// IANA timezone identifier the times were declared in.
    pub timezone: String,
    /// Whether individual votes are hidden while the poll is active.
    /// Closed polls always reveal aggregate results.
    pub anonymous: bool,
    /// Whether a voter may select more than one option.
    pub multiple_choice: bool,
    /// Maximum number of options one ballot may select.
    pub max_choices: u8,
    /// Ordered option list. Existing entries and their order are frozen
    /// once the poll is active; only a suffix of new entries may be added.
    pub options: Vec<PollOption>,
    /// Opaque messaging-platform reference, set at first announcement.
    pub message_ref: Option<String>,
    /// Instant the poll record was created.
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// Returns the effective maximum number of selections for one ballot.
    #[must_use]
    pub fn effective_max_choices(&self) -> usize {
        if self.multiple_choice {
            usize::from(self.max_choices.max(1))
        } else {
            1
        }
    }
}

/// A single recorded vote row: one voter's selection of one option.
///
/// A multiple-choice ballot produces one `Vote` per selected option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// The poll this vote belongs to.
    pub poll_id: i64,
    /// Opaque voter identifier.
    pub voter_id: String,
    /// Zero-based index into the poll's option list.
    pub option_index: u32,
}

/// A voter's full selection, submitted as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// Opaque voter identifier.
    pub voter_id: String,
    /// Zero-based option indices, in selection order.
    pub option_indices: Vec<u32>,
}

/// The kind of lifecycle transition a bulk operation applies to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationType {
    /// Close every target poll.
    Close,
    /// Reopen every target poll.
    Reopen,
    /// Delete every target poll.
    Delete,
    /// Export aggregate results for every target poll as CSV.
    Export,
}

impl BulkOperationType {
    /// Returns the string representation of the operation type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Close => "close",
            Self::Reopen => "reopen",
            Self::Delete => "delete",
            Self::Export => "export",
        }
    }

    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "close" => Ok(Self::Close),
            "reopen" => Ok(Self::Reopen),
            "delete" => Ok(Self::Delete),
            "export" => Ok(Self::Export),
            _ => Err(DomainError::InvalidBulkOperationType {
                op_type: s.to_string(),
            }),
        }
    }
}

impl FromStr for BulkOperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for BulkOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a bulk operation.
///
/// `Completed` describes the batch running to the end of its target list,
/// even when individual items failed. `Failed` is reserved for batch-level
/// faults such as the worker itself dying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationStatus {
    /// Accepted but not yet picked up by a worker.
    Pending,
    /// A worker is processing the target list.
    Running,
    /// The worker reached the end of the target list.
    Completed,
    /// A batch-level fault stopped the worker before the end.
    Failed,
    /// Cancellation was requested and observed between items.
    Cancelled,
}

impl BulkOperationStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true if this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn parse_str(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::InvalidBulkOperationStatus {
                status: s.to_string(),
            }),
        }
    }
}

impl FromStr for BulkOperationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for BulkOperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_status_string_round_trip() {
        for status in [PollStatus::Scheduled, PollStatus::Active, PollStatus::Closed] {
            let s = status.as_str();
            match PollStatus::parse_str(s) {
                Ok(parsed) => assert_eq!(status, parsed),
                Err(e) => panic!("Failed to parse status string: {s}: {e}"),
            }
        }
    }

    #[test]
    fn test_invalid_poll_status_string() {
        assert!(PollStatus::parse_str("open").is_err());
        assert!(PollStatus::parse_str("").is_err());
    }

    #[test]
    fn test_bulk_type_round_trip() {
        for op in [
            BulkOperationType::Close,
            BulkOperationType::Reopen,
            BulkOperationType::Delete,
            BulkOperationType::Export,
        ] {
            assert_eq!(op.as_str().parse::<BulkOperationType>().ok(), Some(op));
        }
    }

    #[test]
    fn test_bulk_status_terminal() {
        assert!(!BulkOperationStatus::Pending.is_terminal());
        assert!(!BulkOperationStatus::Running.is_terminal());
        assert!(BulkOperationStatus::Completed.is_terminal());
        assert!(BulkOperationStatus::Failed.is_terminal());
        assert!(BulkOperationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_effective_max_choices_single_choice() {
        let poll = test_poll(false, 3);
        assert_eq!(poll.effective_max_choices(), 1);
    }

    #[test]
    fn test_effective_max_choices_multiple_choice() {
        let poll = test_poll(true, 3);
        assert_eq!(poll.effective_max_choices(), 3);
    }

    fn test_poll(multiple_choice: bool, max_choices: u8) -> Poll {
        let now = Utc::now();
        Poll {
            poll_id: 1,
            name: String::from("Test poll"),
            description: None,
            status: PollStatus::Scheduled,
            open_time: now,
            close_time: now + chrono::Duration::hours(1),
            timezone: String::from("UTC"),
            anonymous: false,
            multiple_choice,
            max_choices,
            options: vec![
                PollOption::new("Yes", "✅"),
                PollOption::new("No", "❌"),
            ],
            message_ref: None,
            created_at: now,
        }
    }
}
