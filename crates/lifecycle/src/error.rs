// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Error types for the lifecycle layer.
//!
//! The taxonomy separates precondition failures (the poll's current status
//! does not permit the operation; usually a caller bug or stale view) from
//! validation failures (bad field values, rejected before any mutation).
//! External notification failures after a successful commit are *not*
//! errors here; they are surfaced on the operation outcome instead.

use pollwarden_domain::DomainError;
use pollwarden_persistence::PersistenceError;

/// Errors returned by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The target poll does not exist.
    PollNotFound(i64),
    /// The poll's current status does not permit the operation.
    ///
    /// Never retried automatically; logged at warning level since it
    /// usually indicates a caller bug or a stale client view.
    Precondition(DomainError),
    /// Proposed values violate domain invariants; rejected before any
    /// mutation.
    Validation(DomainError),
    /// A voter attempted to vote twice on the same poll.
    DuplicateVote {
        /// The target poll.
        poll_id: i64,
        /// The offending voter.
        voter_id: String,
    },
    /// The persistence store failed; fatal to the individual operation.
    Store(PersistenceError),
}

impl LifecycleError {
    /// True iff this is a precondition failure.
    ///
    /// The scheduler uses this to downgrade a racing scheduled job (e.g. a
    /// scheduled close finding the poll already closed manually) to a
    /// logged, non-fatal event.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PollNotFound(id) => write!(f, "Poll not found: {id}"),
            Self::Precondition(err) => write!(f, "Precondition failed: {err}"),
            Self::Validation(err) => write!(f, "Validation failed: {err}"),
            Self::DuplicateVote { poll_id, voter_id } => {
                write!(f, "Voter '{voter_id}' has already voted on poll {poll_id}")
            }
            Self::Store(err) => write!(f, "Store error: {err}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<PersistenceError> for LifecycleError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::PollNotFound(id) => Self::PollNotFound(id),
            PersistenceError::DuplicateVote { poll_id, voter_id } => {
                Self::DuplicateVote { poll_id, voter_id }
            }
            other => Self::Store(other),
        }
    }
}

/// Errors returned by bulk operation submission and inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkError {
    /// The target list is empty.
    NoTargets,
    /// The target list exceeds the configured maximum.
    TooManyTargets {
        /// The number of targets requested.
        requested: usize,
        /// The configured maximum.
        max: usize,
    },
    /// The actor already has the maximum number of operations running.
    ActorBusy {
        /// The submitting actor.
        actor: String,
        /// How many operations the actor has in flight.
        active: i64,
        /// The configured per-actor cap.
        cap: i64,
    },
    /// The operation id is unknown.
    OperationNotFound(String),
    /// The operation is already terminal and cannot be cancelled.
    AlreadyTerminal {
        /// The operation's terminal status.
        status: String,
    },
    /// The persistence store failed.
    Store(PersistenceError),
}

impl std::fmt::Display for BulkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTargets => write!(f, "Bulk operation has no target polls"),
            Self::TooManyTargets { requested, max } => {
                write!(
                    f,
                    "Bulk operation targets {requested} polls but at most {max} are allowed"
                )
            }
            Self::ActorBusy { actor, active, cap } => {
                write!(
                    f,
                    "Actor '{actor}' has {active} operations running (cap {cap})"
                )
            }
            Self::OperationNotFound(id) => write!(f, "Bulk operation not found: {id}"),
            Self::AlreadyTerminal { status } => {
                write!(f, "Bulk operation is already {status}")
            }
            Self::Store(err) => write!(f, "Store error: {err}"),
        }
    }
}

impl std::error::Error for BulkError {}

impl From<PersistenceError> for BulkError {
    fn from(err: PersistenceError) -> Self {
        Self::Store(err)
    }
}

/// Errors surfaced by the messaging gateway and cache collaborators.
///
/// These never roll back a committed state transition; they degrade to
/// "internal state correct, external mirror stale".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// A network-level failure reaching the platform.
    Network(String),
    /// The platform rejected the call (permissions, deleted message).
    Rejected(String),
    /// The call did not complete within the configured timeout.
    TimedOut {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Gateway network error: {msg}"),
            Self::Rejected(msg) => write!(f, "Gateway rejected the call: {msg}"),
            Self::TimedOut { timeout_ms } => {
                write!(f, "Gateway call timed out after {timeout_ms}ms")
            }
        }
    }
}

impl std::error::Error for GatewayError {}
