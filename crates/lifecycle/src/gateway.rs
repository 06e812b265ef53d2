// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! External collaborator contracts.
//!
//! The messaging gateway mirrors poll state onto an external chat
//! platform; the cache layer invalidates any cached view of a poll. Both
//! are best-effort from the lifecycle service's point of view: a failed
//! call never rolls back a committed transition.

use crate::error::GatewayError;
use async_trait::async_trait;
use pollwarden_domain::Poll;
use tracing::debug;

/// Aggregate results for one poll, as shown when results are revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResults {
    /// The poll these tallies belong to.
    pub poll_id: i64,
    /// Total vote rows across all options.
    pub total_votes: i64,
    /// One tally per option, in option order.
    pub tallies: Vec<OptionTally>,
}

/// Vote count for a single option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTally {
    /// The option label.
    pub label: String,
    /// The option marker.
    pub marker: String,
    /// Number of votes for this option.
    pub votes: i64,
}

/// Contract for the external messaging platform.
///
/// Each call may fail (network, permissions); failures are logged and
/// surfaced in the operation's outcome but do not block internal state
/// commits.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Announce a newly opened poll. Returns the platform's opaque
    /// message reference, stored on the poll for later updates.
    async fn announce(&self, poll: &Poll) -> Result<String, GatewayError>;

    /// Refresh the message content after a voter-visible change or a
    /// reopen.
    async fn refresh(&self, poll: &Poll, message_ref: &str) -> Result<(), GatewayError>;

    /// Update the message to display final results. Called on close,
    /// unconditionally: closed polls always reveal aggregate results.
    async fn reveal_results(
        &self,
        poll: &Poll,
        results: &PollResults,
        message_ref: &str,
    ) -> Result<(), GatewayError>;
}

/// Contract for the cache layer in front of poll reads.
///
/// Best-effort: failures are swallowed and logged, never propagated as
/// operation failures.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Drop any cached view of the poll.
    async fn invalidate(&self, poll_id: i64) -> Result<(), GatewayError>;
}

/// Gateway used when no chat platform is configured.
///
/// Announcements are logged and receive synthetic message references so
/// the rest of the lifecycle behaves exactly as it would in production.
#[derive(Debug, Default)]
pub struct LoggingMessagingGateway;

#[async_trait]
impl MessagingGateway for LoggingMessagingGateway {
    async fn announce(&self, poll: &Poll) -> Result<String, GatewayError> {
        debug!(poll_id = poll.poll_id, "announce (no platform configured)");
        Ok(format!("log-{}", poll.poll_id))
    }

    async fn refresh(&self, poll: &Poll, message_ref: &str) -> Result<(), GatewayError> {
        debug!(
            poll_id = poll.poll_id,
            message_ref, "refresh (no platform configured)"
        );
        Ok(())
    }

    async fn reveal_results(
        &self,
        poll: &Poll,
        results: &PollResults,
        message_ref: &str,
    ) -> Result<(), GatewayError> {
        debug!(
            poll_id = poll.poll_id,
            message_ref,
            total_votes = results.total_votes,
            "reveal results (no platform configured)"
        );
        Ok(())
    }
}

/// Cache layer used when no cache is configured.
#[derive(Debug, Default)]
pub struct NoopCacheLayer;

#[async_trait]
impl CacheLayer for NoopCacheLayer {
    async fn invalidate(&self, _poll_id: i64) -> Result<(), GatewayError> {
        Ok(())
    }
}
