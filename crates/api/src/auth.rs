// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Actor roles and authorization checks.
//!
//! Roles form a closed enum; permission decisions are table-driven (see
//! `permissions`) rather than branching on free-form actor-type strings.

use crate::error::{ApiError, AuthError};

/// Actor roles for authorization.
///
/// Roles apply to administrative actors, never to voters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full authority: poll creation and deletion, every lifecycle
    /// transition, every edit field, and bulk operations.
    Admin,
    /// Day-to-day poll management: open/close/reopen and content edits,
    /// but no schedule restructuring, deletion, or bulk operations.
    Moderator,
}

impl Role {
    /// Returns the role name used in API payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }

    /// Parses a role from its API payload string.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown role name.
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(AuthError::AuthenticationFailed {
                reason: format!("Unknown role: {other}"),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated actor with an associated role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedActor {
    /// The unique identifier for this actor.
    pub id: String,
    /// The role assigned to this actor.
    pub role: Role,
}

impl AuthenticatedActor {
    /// Creates a new authenticated actor.
    #[must_use]
    pub const fn new(id: String, role: Role) -> Self {
        Self { id, role }
    }
}

/// Authorization checks for operations that are all-or-nothing per role.
///
/// Field-level edit permissions live in `permissions`.
pub struct AuthorizationService;

impl AuthorizationService {
    /// Poll creation requires Admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor does not have the Admin role.
    pub fn authorize_create_poll(actor: &AuthenticatedActor) -> Result<(), ApiError> {
        Self::require_admin(actor, "create_poll")
    }

    /// Poll deletion requires Admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor does not have the Admin role.
    pub fn authorize_delete_poll(actor: &AuthenticatedActor) -> Result<(), ApiError> {
        Self::require_admin(actor, "delete_poll")
    }

    /// Bulk operations require Admin.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor does not have the Admin role.
    pub fn authorize_bulk_operation(actor: &AuthenticatedActor) -> Result<(), ApiError> {
        Self::require_admin(actor, "bulk_operation")
    }

    /// Lifecycle transitions (open/close/reopen) are permitted for both
    /// roles.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible so the call sites do not change
    /// if a narrower role is added.
    pub const fn authorize_transition(_actor: &AuthenticatedActor) -> Result<(), ApiError> {
        Ok(())
    }

    fn require_admin(actor: &AuthenticatedActor, action: &str) -> Result<(), ApiError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Moderator => Err(ApiError::Unauthorized {
                action: action.to_string(),
                required_role: String::from("admin"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AuthenticatedActor {
        AuthenticatedActor::new(String::from("alice"), Role::Admin)
    }

    fn moderator() -> AuthenticatedActor {
        AuthenticatedActor::new(String::from("bob"), Role::Moderator)
    }

    #[test]
    fn test_role_parse_round_trip() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("moderator").unwrap(), Role::Moderator);
        assert!(Role::parse("owner").is_err());
    }

    #[test]
    fn test_admin_only_actions() {
        assert!(AuthorizationService::authorize_create_poll(&admin()).is_ok());
        assert!(AuthorizationService::authorize_create_poll(&moderator()).is_err());
        assert!(AuthorizationService::authorize_delete_poll(&moderator()).is_err());
        assert!(AuthorizationService::authorize_bulk_operation(&moderator()).is_err());
    }

    #[test]
    fn test_transitions_allowed_for_both_roles() {
        assert!(AuthorizationService::authorize_transition(&admin()).is_ok());
        assert!(AuthorizationService::authorize_transition(&moderator()).is_ok());
    }
}
