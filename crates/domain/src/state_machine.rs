// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Poll lifecycle transition rules.
//!
//! Pure functions, no I/O. The lifecycle service consults these predicates
//! after re-reading the poll's current status and before any mutation.
//!
//! ## Invariants
//!
//! - `scheduled → active` (open), `active → closed` (close),
//!   `closed → active` (reopen) are the only status transitions
//! - Reopen is never permitted for an active poll; an attempt signals a
//!   caller bug or a stale client view, not a recoverable race
//! - Edits never change status; they mutate only fields permitted for the
//!   current status

use crate::error::DomainError;
use crate::types::{Poll, PollOption, PollStatus};
use chrono::{DateTime, Utc};

/// A lifecycle operation that changes `Poll.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    /// `scheduled → active`
    Open,
    /// `active → closed`
    Close,
    /// `closed → active`
    Reopen,
}

impl LifecycleOp {
    /// Returns the lowercase verb for this operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Reopen => "reopen",
        }
    }

    /// The status a poll must currently hold for this operation.
    #[must_use]
    pub const fn required_status(&self) -> PollStatus {
        match self {
            Self::Open => PollStatus::Scheduled,
            Self::Close => PollStatus::Active,
            Self::Reopen => PollStatus::Closed,
        }
    }

    /// The status a poll holds after this operation succeeds.
    #[must_use]
    pub const fn target_status(&self) -> PollStatus {
        match self {
            Self::Open | Self::Reopen => PollStatus::Active,
            Self::Close => PollStatus::Closed,
        }
    }
}

impl std::fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// True iff the poll may be opened.
#[must_use]
pub fn can_open(poll: &Poll) -> bool {
    poll.status == PollStatus::Scheduled
}

/// True iff the poll may be closed.
#[must_use]
pub fn can_close(poll: &Poll) -> bool {
    poll.status == PollStatus::Active
}

/// True iff the poll may be reopened.
///
/// Never true for an active poll.
#[must_use]
pub fn can_reopen(poll: &Poll) -> bool {
    poll.status == PollStatus::Closed
}

/// Validates that `op` is permitted for a poll currently in `status`.
///
/// # Errors
///
/// Returns `DomainError::InvalidStatusTransition` if the operation is not
/// allowed from the current status.
pub fn validate_transition(status: PollStatus, op: LifecycleOp) -> Result<(), DomainError> {
    if status == op.required_status() {
        return Ok(());
    }
    let reason = match (op, status) {
        (LifecycleOp::Reopen, PollStatus::Active) => {
            String::from("the poll is already active; reopening it would signal a caller bug")
        }
        (LifecycleOp::Open, PollStatus::Active) => String::from("the poll is already open"),
        (LifecycleOp::Close, PollStatus::Closed) => String::from("the poll is already closed"),
        _ => format!("operation requires status '{}'", op.required_status()),
    };
    Err(DomainError::InvalidStatusTransition {
        from: status.as_str().to_string(),
        operation: op.as_str().to_string(),
        reason,
    })
}

/// A field an edit request may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditField {
    /// The poll title.
    Name,
    /// The poll description.
    Description,
    /// The open instant.
    OpenTime,
    /// The close instant.
    CloseTime,
    /// The option list.
    Options,
}

impl EditField {
    /// Returns the snake_case field name used in API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::OpenTime => "open_time",
            Self::CloseTime => "close_time",
            Self::Options => "options",
        }
    }

    /// True iff a change to this field is visible to voters and must
    /// trigger a messaging refresh.
    #[must_use]
    pub const fn is_voter_visible(&self) -> bool {
        matches!(
            self,
            Self::Name | Self::Description | Self::CloseTime | Self::Options
        )
    }
}

impl std::fmt::Display for EditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The set of fields mutable for a poll in the given status.
///
/// Derived, never stored. Scheduled polls are fully editable; active polls
/// accept content tweaks, close-time changes, and option appends; closed
/// polls accept nothing (reopen first).
#[must_use]
pub const fn allowed_edit_fields(status: PollStatus) -> &'static [EditField] {
    match status {
        PollStatus::Scheduled => &[
            EditField::Name,
            EditField::Description,
            EditField::OpenTime,
            EditField::CloseTime,
            EditField::Options,
        ],
        PollStatus::Active => &[
            EditField::Name,
            EditField::Description,
            EditField::CloseTime,
            EditField::Options,
        ],
        PollStatus::Closed => &[],
    }
}

/// A partial field map proposed by an edit request.
///
/// `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollEdit {
    /// New poll title.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New open instant.
    pub open_time: Option<DateTime<Utc>>,
    /// New close instant.
    pub close_time: Option<DateTime<Utc>>,
    /// New full option list.
    pub options: Option<Vec<PollOption>>,
}

impl PollEdit {
    /// True iff no field is proposed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.open_time.is_none()
            && self.close_time.is_none()
            && self.options.is_none()
    }

    /// Returns the fields this edit proposes to change.
    #[must_use]
    pub fn proposed_fields(&self) -> Vec<EditField> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push(EditField::Name);
        }
        if self.description.is_some() {
            fields.push(EditField::Description);
        }
        if self.open_time.is_some() {
            fields.push(EditField::OpenTime);
        }
        if self.close_time.is_some() {
            fields.push(EditField::CloseTime);
        }
        if self.options.is_some() {
            fields.push(EditField::Options);
        }
        fields
    }
}

/// A proposed field that was rejected, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEdit {
    /// The rejected field.
    pub field: EditField,
    /// Human-readable rejection reason.
    pub reason: String,
}

/// The outcome of edit validation: the accepted subset plus rejections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditDecision {
    /// The fields that may be applied as-is.
    pub accepted: PollEdit,
    /// Proposed fields that were discarded, with reasons.
    pub rejected: Vec<RejectedEdit>,
}

impl EditDecision {
    /// The accepted fields that are visible to voters.
    #[must_use]
    pub fn voter_visible_changes(&self) -> Vec<EditField> {
        self.accepted
            .proposed_fields()
            .into_iter()
            .filter(EditField::is_voter_visible)
            .collect()
    }
}

/// Splits a proposed edit into the subset legal for the poll's current
/// status and a list of rejected fields with reasons.
///
/// For `options` on an active poll: every currently-stored option must be
/// present, unchanged, and in its original order in the proposal; only a
/// suffix of brand-new entries may be appended, and the total must stay
/// within the 2..=10 bound. Any other discrepancy rejects the field.
#[must_use]
pub fn validate_edit(poll: &Poll, proposed: &PollEdit) -> EditDecision {
    let allowed = allowed_edit_fields(poll.status);
    let mut decision = EditDecision::default();

    for field in proposed.proposed_fields() {
        if !allowed.contains(&field) {
            decision.rejected.push(RejectedEdit {
                field,
                reason: format!("field is not editable while the poll is {}", poll.status),
            });
            continue;
        }
        match field {
            EditField::Name => decision.accepted.name.clone_from(&proposed.name),
            EditField::Description => {
                decision.accepted.description.clone_from(&proposed.description);
            }
            EditField::OpenTime => decision.accepted.open_time = proposed.open_time,
            EditField::CloseTime => decision.accepted.close_time = proposed.close_time,
            EditField::Options => {
                if let Some(new_options) = &proposed.options {
                    match validate_option_edit(poll, new_options) {
                        Ok(()) => decision.accepted.options = Some(new_options.clone()),
                        Err(reason) => decision.rejected.push(RejectedEdit {
                            field: EditField::Options,
                            reason,
                        }),
                    }
                }
            }
        }
    }

    decision
}

/// Validates an option-list edit against the frozen-prefix rule.
fn validate_option_edit(poll: &Poll, new_options: &[PollOption]) -> Result<(), String> {
    if !(2..=10).contains(&new_options.len()) {
        return Err(format!(
            "option count {} is outside the permitted range of 2 to 10",
            new_options.len()
        ));
    }

    // Scheduled polls have no votes yet; the list may be replaced wholesale.
    if poll.status == PollStatus::Scheduled {
        return Ok(());
    }

    if new_options.len() < poll.options.len() {
        return Err(format!(
            "existing options cannot be removed: poll has {}, proposal has {}",
            poll.options.len(),
            new_options.len()
        ));
    }
    for (index, existing) in poll.options.iter().enumerate() {
        if new_options[index] != *existing {
            return Err(format!(
                "existing option at index {index} ('{}') must remain unchanged and in its original position",
                existing.label
            ));
        }
    }
    Ok(())
}
