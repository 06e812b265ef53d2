// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Error types for the API layer.
//!
//! Lower-layer errors are translated explicitly so domain and lifecycle
//! internals never leak raw through the API contract.

use pollwarden_lifecycle::{BulkError, LifecycleError};

/// Authentication and authorization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Authentication failed.
    AuthenticationFailed {
        /// The reason authentication failed.
        reason: String,
    },
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// API-level errors.
///
/// These are distinct from domain/lifecycle errors and represent the API
/// contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Authentication failed.
    AuthenticationFailed {
        /// The reason authentication failed.
        reason: String,
    },
    /// Authorization failed - the actor does not have permission.
    Unauthorized {
        /// The action that was attempted.
        action: String,
        /// The role required for this action.
        required_role: String,
    },
    /// The entity's current state does not permit the operation.
    PreconditionFailed {
        /// A human-readable description of the conflict.
        message: String,
    },
    /// Invalid input was provided.
    InvalidInput {
        /// The field that was invalid.
        field: String,
        /// A human-readable description of the error.
        message: String,
    },
    /// A requested resource was not found.
    ResourceNotFound {
        /// The type of resource that was not found.
        resource_type: String,
        /// A human-readable description of what was not found.
        message: String,
    },
    /// The request conflicts with existing state (e.g. a repeat vote).
    Conflict {
        /// A human-readable description of the conflict.
        message: String,
    },
    /// The actor has hit a concurrency cap.
    TooManyOperations {
        /// A human-readable description of the cap.
        message: String,
    },
    /// An internal error occurred.
    Internal {
        /// A description of the internal error.
        message: String,
    },
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }
            Self::Unauthorized {
                action,
                required_role,
            } => {
                write!(f, "Unauthorized: '{action}' requires {required_role} role")
            }
            Self::PreconditionFailed { message } => {
                write!(f, "Precondition failed: {message}")
            }
            Self::InvalidInput { field, message } => {
                write!(f, "Invalid input for field '{field}': {message}")
            }
            Self::ResourceNotFound {
                resource_type,
                message,
            } => {
                write!(f, "{resource_type} not found: {message}")
            }
            Self::Conflict { message } => write!(f, "Conflict: {message}"),
            Self::TooManyOperations { message } => {
                write!(f, "Too many operations: {message}")
            }
            Self::Internal { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthenticationFailed { reason } => Self::AuthenticationFailed { reason },
        }
    }
}

/// Translates a lifecycle error into an API error.
///
/// This translation is explicit and ensures lifecycle errors are not
/// leaked directly.
#[must_use]
pub fn translate_lifecycle_error(err: LifecycleError) -> ApiError {
    match err {
        LifecycleError::PollNotFound(id) => ApiError::ResourceNotFound {
            resource_type: String::from("Poll"),
            message: format!("Poll {id} does not exist"),
        },
        LifecycleError::Precondition(domain_err) => ApiError::PreconditionFailed {
            message: domain_err.to_string(),
        },
        LifecycleError::Validation(domain_err) => ApiError::InvalidInput {
            field: String::from("request"),
            message: domain_err.to_string(),
        },
        LifecycleError::DuplicateVote { poll_id, voter_id } => ApiError::Conflict {
            message: format!("Voter '{voter_id}' has already voted on poll {poll_id}"),
        },
        LifecycleError::Store(store_err) => ApiError::Internal {
            message: format!("Store error: {store_err}"),
        },
    }
}

/// Translates a bulk engine error into an API error.
#[must_use]
pub fn translate_bulk_error(err: BulkError) -> ApiError {
    match err {
        BulkError::NoTargets => ApiError::InvalidInput {
            field: String::from("target_poll_ids"),
            message: String::from("target list cannot be empty"),
        },
        BulkError::TooManyTargets { requested, max } => ApiError::InvalidInput {
            field: String::from("target_poll_ids"),
            message: format!("{requested} targets requested but at most {max} are allowed"),
        },
        BulkError::ActorBusy { actor, active, cap } => ApiError::TooManyOperations {
            message: format!("actor '{actor}' has {active} operations running (cap {cap})"),
        },
        BulkError::OperationNotFound(id) => ApiError::ResourceNotFound {
            resource_type: String::from("Bulk operation"),
            message: format!("Bulk operation {id} does not exist"),
        },
        BulkError::AlreadyTerminal { status } => ApiError::PreconditionFailed {
            message: format!("Bulk operation is already {status}"),
        },
        BulkError::Store(store_err) => ApiError::Internal {
            message: format!("Store error: {store_err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollwarden_domain::DomainError;

    #[test]
    fn test_precondition_translation() {
        let err = LifecycleError::Precondition(DomainError::InvalidStatusTransition {
            from: String::from("active"),
            operation: String::from("reopen"),
            reason: String::from("already active"),
        });
        match translate_lifecycle_error(err) {
            ApiError::PreconditionFailed { message } => {
                assert!(message.contains("reopen"));
            }
            other => panic!("Expected PreconditionFailed, got: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_translation() {
        match translate_lifecycle_error(LifecycleError::PollNotFound(9)) {
            ApiError::ResourceNotFound { resource_type, .. } => {
                assert_eq!(resource_type, "Poll");
            }
            other => panic!("Expected ResourceNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_actor_busy_translation() {
        let err = BulkError::ActorBusy {
            actor: String::from("alice"),
            active: 2,
            cap: 2,
        };
        assert!(matches!(
            translate_bulk_error(err),
            ApiError::TooManyOperations { .. }
        ));
    }
}
