// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

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

mod error;
mod schedule;
mod state_machine;
mod types;
mod validation;

// Re-export public types and functions
pub use error::DomainError;
pub use schedule::{
    MAX_POLL_DURATION, MIN_POLL_DURATION, PollWindow, parse_timezone, resolve_local_time,
    resolve_window, validate_close_in_future, validate_window,
};
pub use state_machine::{
    EditDecision, EditField, LifecycleOp, PollEdit, RejectedEdit, allowed_edit_fields, can_close,
    can_open, can_reopen, validate_edit, validate_transition,
};
pub use types::{
    Ballot, BulkOperationStatus, BulkOperationType, Poll, PollOption, PollStatus, Vote,
};
pub use validation::{validate_ballot, validate_max_choices, validate_name, validate_options};
