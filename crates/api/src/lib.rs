// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! API boundary layer for Pollwarden.
//!
//! Request/response types, actor roles with a table-driven edit
//! permission model, and explicit error translation. Nothing here talks
//! to the store directly; the server crate wires these types to the
//! lifecycle services.

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

mod auth;
mod error;
mod permissions;
mod request_response;

pub use auth::{AuthenticatedActor, AuthorizationService, Role};
pub use error::{ApiError, AuthError, translate_bulk_error, translate_lifecycle_error};
pub use permissions::{Capability, can_edit_field, filter_edit_for_role};
pub use request_response::{
    ActorRequest, BulkItemErrorDto, BulkProgressResponse, BulkSubmitRequest, BulkSubmitResponse,
    CastVoteRequest, CreatePollRequest, EditPollRequest, EditPollResponse, PollOptionDto,
    PollResponse, RejectedFieldDto, ReopenPollRequest, RequestError, ResultsResponse, TallyDto,
    TransitionResponse,
};
