// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors that can occur during domain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Poll name is empty or invalid.
    InvalidName(String),
    /// Timezone identifier is not a valid IANA name.
    InvalidTimezone(String),
    /// A local wall-clock time cannot be resolved in the declared timezone.
    UnresolvableLocalTime {
        /// The declared timezone.
        timezone: String,
        /// The offending local datetime.
        local_time: String,
    },
    /// Close time is not strictly after open time.
    CloseNotAfterOpen {
        /// The open instant (RFC 3339).
        open_time: String,
        /// The close instant (RFC 3339).
        close_time: String,
    },
    /// Poll duration is outside the permitted bounds.
    DurationOutOfBounds {
        /// The actual duration in seconds.
        duration_seconds: i64,
    },
    /// Close time must be strictly in the future.
    CloseTimeNotFuture {
        /// The proposed close instant (RFC 3339).
        close_time: String,
    },
    /// Option count is outside the permitted 2..=10 range.
    InvalidOptionCount {
        /// The number of options provided.
        count: usize,
    },
    /// An option label is empty.
    EmptyOptionLabel {
        /// The zero-based index of the offending option.
        index: usize,
    },
    /// Two options share the same marker.
    DuplicateOptionMarker {
        /// The duplicated marker.
        marker: String,
    },
    /// Max choices is inconsistent with the option list.
    InvalidMaxChoices {
        /// The configured maximum.
        max_choices: u8,
        /// The number of options.
        option_count: usize,
    },
    /// A status transition is not permitted by the poll lifecycle rules.
    InvalidStatusTransition {
        /// The current status.
        from: String,
        /// The attempted operation.
        operation: String,
        /// Why the transition is not allowed.
        reason: String,
    },
    /// Poll status string is not a valid status.
    InvalidPollStatus {
        /// The invalid status string.
        status: String,
    },
    /// Bulk operation type string is not recognized.
    InvalidBulkOperationType {
        /// The invalid type string.
        op_type: String,
    },
    /// Bulk operation status string is not recognized.
    InvalidBulkOperationStatus {
        /// The invalid status string.
        status: String,
    },
    /// A ballot contains no selections.
    EmptyBallot,
    /// A ballot selects the same option twice.
    DuplicateSelection {
        /// The duplicated option index.
        index: u32,
    },
    /// A ballot selects an option index that does not exist.
    SelectionOutOfRange {
        /// The offending option index.
        index: u32,
        /// The number of options on the poll.
        option_count: usize,
    },
    /// A ballot selects more options than the poll allows.
    TooManySelections {
        /// The number of selected options.
        selected: usize,
        /// The maximum permitted.
        allowed: usize,
    },
    /// Failed to parse a stored datetime from its string representation.
    DateParseError {
        /// The invalid datetime string.
        value: String,
        /// The parsing error message.
        error: String,
    },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(msg) => write!(f, "Invalid poll name: {msg}"),
            Self::InvalidTimezone(tz) => write!(f, "Invalid timezone identifier: {tz}"),
            Self::UnresolvableLocalTime {
                timezone,
                local_time,
            } => {
                write!(
                    f,
                    "Local time {local_time} cannot be resolved in timezone {timezone} (ambiguous or non-existent due to DST)"
                )
            }
            Self::CloseNotAfterOpen {
                open_time,
                close_time,
            } => {
                write!(
                    f,
                    "Close time {close_time} must be strictly after open time {open_time}"
                )
            }
            Self::DurationOutOfBounds { duration_seconds } => {
                write!(
                    f,
                    "Poll duration of {duration_seconds}s is outside the permitted range of 1 minute to 30 days"
                )
            }
            Self::CloseTimeNotFuture { close_time } => {
                write!(f, "Close time {close_time} must be strictly in the future")
            }
            Self::InvalidOptionCount { count } => {
                write!(f, "Invalid option count: {count}. Must be between 2 and 10")
            }
            Self::EmptyOptionLabel { index } => {
                write!(f, "Option at index {index} has an empty label")
            }
            Self::DuplicateOptionMarker { marker } => {
                write!(f, "Option marker '{marker}' is used more than once")
            }
            Self::InvalidMaxChoices {
                max_choices,
                option_count,
            } => {
                write!(
                    f,
                    "Invalid max choices: {max_choices}. Must be between 1 and the option count ({option_count})"
                )
            }
            Self::InvalidStatusTransition {
                from,
                operation,
                reason,
            } => {
                write!(f, "Cannot {operation} a poll in status '{from}': {reason}")
            }
            Self::InvalidPollStatus { status } => {
                write!(f, "Invalid poll status: {status}")
            }
            Self::InvalidBulkOperationType { op_type } => {
                write!(f, "Invalid bulk operation type: {op_type}")
            }
            Self::InvalidBulkOperationStatus { status } => {
                write!(f, "Invalid bulk operation status: {status}")
            }
            Self::EmptyBallot => write!(f, "Ballot must select at least one option"),
            Self::DuplicateSelection { index } => {
                write!(f, "Option index {index} is selected more than once")
            }
            Self::SelectionOutOfRange {
                index,
                option_count,
            } => {
                write!(
                    f,
                    "Option index {index} is out of range for a poll with {option_count} options"
                )
            }
            Self::TooManySelections { selected, allowed } => {
                write!(
                    f,
                    "Ballot selects {selected} options but at most {allowed} are allowed"
                )
            }
            Self::DateParseError { value, error } => {
                write!(f, "Failed to parse datetime '{value}': {error}")
            }
        }
    }
}

impl std::error::Error for DomainError {}
