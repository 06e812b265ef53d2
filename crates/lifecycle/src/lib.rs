// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Lifecycle, scheduling, and bulk operation services for Pollwarden.
//!
//! Three services sit on top of the domain and persistence layers:
//!
//! - [`LifecycleService`]: the only code path permitted to change
//!   `Poll.status`; serializes transitions per poll and propagates them
//!   to the messaging gateway and cache
//! - [`SchedulerService`]: the in-memory job table and tick loop firing
//!   time-based transitions, rebuilt from the store at startup
//! - [`BulkOperationEngine`]: applies one lifecycle operation to a large
//!   poll set with bounded concurrency, progress, and cancellation

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

mod bulk;
mod error;
mod gateway;
mod scheduler;
mod service;

#[cfg(test)]
mod tests;

pub use bulk::{BulkConfig, BulkOperationEngine, BulkProgress, BulkRequest};
pub use error::{BulkError, GatewayError, LifecycleError};
pub use gateway::{
    CacheLayer, LoggingMessagingGateway, MessagingGateway, NoopCacheLayer, OptionTally,
    PollResults,
};
pub use scheduler::{JobKind, RestoreSummary, ScheduledJob, SchedulerService};
pub use service::{
    EditOutcome, LifecycleConfig, LifecycleService, NewPollRequest, ReopenRequest,
    ReopenSchedule, TransitionOutcome, TransitionReason,
};
