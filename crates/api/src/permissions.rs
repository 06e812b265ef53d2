// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The (role, edit field) permission table.
//!
//! Evaluated once per edit request, before the state machine sees the
//! proposal. This replaces the legacy pattern of branching on dynamic
//! "editor type" strings at each call site.

use crate::auth::Role;
use pollwarden_domain::{EditField, PollEdit, RejectedEdit};

/// Whether an action is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The action is permitted.
    Allowed,
    /// The action is denied.
    Denied,
}

impl Capability {
    /// Builds a capability from a boolean decision.
    #[must_use]
    pub const fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allowed } else { Self::Denied }
    }

    /// True iff the action is permitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// The permission table: may `role` edit `field`?
///
/// Admins may edit every field. Moderators manage content and close
/// times but may not restructure the opening schedule.
#[must_use]
pub const fn can_edit_field(role: Role, field: EditField) -> Capability {
    match (role, field) {
        (Role::Admin, _)
        | (
            Role::Moderator,
            EditField::Name | EditField::Description | EditField::CloseTime | EditField::Options,
        ) => Capability::Allowed,
        (Role::Moderator, EditField::OpenTime) => Capability::Denied,
    }
}

/// Strips fields the role may not edit, recording each removal.
///
/// The remaining proposal still goes through the domain's status-based
/// `validate_edit`; this filter only encodes who may touch what.
#[must_use]
pub fn filter_edit_for_role(role: Role, proposed: PollEdit) -> (PollEdit, Vec<RejectedEdit>) {
    let mut filtered = proposed;
    let mut rejected = Vec::new();

    for field in filtered.proposed_fields() {
        if can_edit_field(role, field).is_allowed() {
            continue;
        }
        match field {
            EditField::Name => filtered.name = None,
            EditField::Description => filtered.description = None,
            EditField::OpenTime => filtered.open_time = None,
            EditField::CloseTime => filtered.close_time = None,
            EditField::Options => filtered.options = None,
        }
        rejected.push(RejectedEdit {
            field,
            reason: format!("role '{role}' may not edit this field"),
        });
    }

    (filtered, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_admin_may_edit_everything() {
        for field in [
            EditField::Name,
            EditField::Description,
            EditField::OpenTime,
            EditField::CloseTime,
            EditField::Options,
        ] {
            assert!(can_edit_field(Role::Admin, field).is_allowed());
        }
    }

    #[test]
    fn test_moderator_may_not_edit_open_time() {
        assert!(!can_edit_field(Role::Moderator, EditField::OpenTime).is_allowed());
        assert!(can_edit_field(Role::Moderator, EditField::Name).is_allowed());
        assert!(can_edit_field(Role::Moderator, EditField::CloseTime).is_allowed());
    }

    #[test]
    fn test_filter_strips_denied_fields_and_reports_them() {
        let proposed = PollEdit {
            name: Some(String::from("Renamed")),
            open_time: Some(Utc::now()),
            ..PollEdit::default()
        };

        let (filtered, rejected) = filter_edit_for_role(Role::Moderator, proposed);

        assert_eq!(filtered.name.as_deref(), Some("Renamed"));
        assert!(filtered.open_time.is_none());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].field, EditField::OpenTime);
    }

    #[test]
    fn test_filter_passes_admin_edit_unchanged() {
        let proposed = PollEdit {
            open_time: Some(Utc::now()),
            ..PollEdit::default()
        };
        let (filtered, rejected) = filter_edit_for_role(Role::Admin, proposed);
        assert!(filtered.open_time.is_some());
        assert!(rejected.is_empty());
    }
}
