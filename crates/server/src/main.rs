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
    clippy::all
)]
#![allow(clippy::multiple_crate_versions)]

use axum::{
    Json, Router,
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use pollwarden_api::{
    ActorRequest, ApiError, AuthenticatedActor, AuthorizationService, BulkProgressResponse,
    BulkSubmitRequest, BulkSubmitResponse, CastVoteRequest, CreatePollRequest, EditPollRequest,
    EditPollResponse, PollResponse, RejectedFieldDto, ReopenPollRequest, RequestError,
    ResultsResponse, Role, TransitionResponse, filter_edit_for_role, translate_bulk_error,
    translate_lifecycle_error,
};
use pollwarden_domain::{Ballot, PollStatus};
use pollwarden_lifecycle::{
    BulkConfig, BulkError, BulkOperationEngine, LifecycleConfig, LifecycleService,
    LoggingMessagingGateway, NoopCacheLayer, SchedulerService, TransitionReason,
};
use pollwarden_persistence::Persistence;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Pollwarden server - HTTP server for poll lifecycle administration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `SQLite` database file. If not provided, uses in-memory database.
    #[arg(short, long)]
    database: Option<String>,

    /// Port to bind the server to
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Scheduler tick interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    tick_interval_ms: u64,

    /// Bound on every messaging gateway call, in seconds
    #[arg(long, default_value_t = 10)]
    gateway_timeout_secs: u64,

    /// Maximum target polls per bulk operation
    #[arg(long, default_value_t = 1000)]
    bulk_max_targets: usize,

    /// Maximum concurrently running bulk operations per actor
    #[arg(long, default_value_t = 2)]
    bulk_per_actor_cap: i64,

    /// Bulk items in flight at once
    #[arg(long, default_value_t = 4)]
    bulk_item_concurrency: usize,
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    /// The lifecycle service: sole mutator of poll status.
    lifecycle: Arc<LifecycleService>,
    /// The scheduler owning the in-memory job table.
    scheduler: Arc<SchedulerService>,
    /// The bulk operation engine.
    bulk: Arc<BulkOperationEngine>,
}

/// Query parameters for listing polls.
#[derive(Debug, Deserialize)]
struct ListPollsQuery {
    /// Optional status filter.
    status: Option<String>,
}

/// API response for write operations without a richer payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WriteResponse {
    /// Success indicator.
    success: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Error response type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorResponse {
    /// Error indicator.
    error: bool,
    /// Error message.
    message: String,
}

/// HTTP error wrapper that implements `IntoResponse`.
struct HttpError {
    /// The HTTP status code.
    status: StatusCode,
    /// The error message.
    message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body: Json<ErrorResponse> = Json(ErrorResponse {
            error: true,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        let status = match err {
            ApiError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            ApiError::PreconditionFailed { .. } | ApiError::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            ApiError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ApiError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::TooManyOperations { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "internal error");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<RequestError> for HttpError {
    fn from(err: RequestError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }
}

impl From<pollwarden_lifecycle::LifecycleError> for HttpError {
    fn from(err: pollwarden_lifecycle::LifecycleError) -> Self {
        translate_lifecycle_error(err).into()
    }
}

impl From<BulkError> for HttpError {
    fn from(err: BulkError) -> Self {
        translate_bulk_error(err).into()
    }
}

/// Parses actor attribution from a request.
fn authenticate(actor_id: &str, actor_role: &str) -> Result<AuthenticatedActor, HttpError> {
    if actor_id.is_empty() {
        return Err(ApiError::AuthenticationFailed {
            reason: String::from("actor_id cannot be empty"),
        }
        .into());
    }
    let role: Role = Role::parse(actor_role).map_err(ApiError::from)?;
    Ok(AuthenticatedActor::new(actor_id.to_string(), role))
}

async fn handle_create_poll(
    AxumState(app_state): AxumState<AppState>,
    Json(request): Json<CreatePollRequest>,
) -> Result<Json<TransitionResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_create_poll(&actor).map_err(HttpError::from)?;

    let new_poll = request.into_new_poll_request()?;
    let outcome = app_state.lifecycle.create_poll(new_poll).await?;
    Ok(Json(TransitionResponse {
        poll: PollResponse::from(&outcome.poll),
        notification_error: outcome.notification_error,
    }))
}

async fn handle_list_polls(
    AxumState(app_state): AxumState<AppState>,
    Query(query): Query<ListPollsQuery>,
) -> Result<Json<Vec<PollResponse>>, HttpError> {
    let polls = match query.status {
        Some(status) => {
            let status = PollStatus::from_str(&status).map_err(|e| HttpError {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
            })?;
            app_state.lifecycle.list_polls_by_status(status).await?
        }
        None => app_state.lifecycle.list_polls().await?,
    };
    Ok(Json(polls.iter().map(PollResponse::from).collect()))
}

async fn handle_get_poll(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Json<PollResponse>, HttpError> {
    let poll = app_state.lifecycle.get_poll(poll_id).await?;
    Ok(Json(PollResponse::from(&poll)))
}

async fn handle_get_results(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
) -> Result<Json<ResultsResponse>, HttpError> {
    let results = app_state.lifecycle.poll_results(poll_id).await?;
    Ok(Json(ResultsResponse::from(&results)))
}

async fn handle_open_poll(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<TransitionResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_transition(&actor).map_err(HttpError::from)?;

    let outcome = app_state
        .lifecycle
        .open_poll(poll_id, TransitionReason::Manual)
        .await?;
    Ok(Json(TransitionResponse {
        poll: PollResponse::from(&outcome.poll),
        notification_error: outcome.notification_error,
    }))
}

async fn handle_close_poll(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<TransitionResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_transition(&actor).map_err(HttpError::from)?;

    let outcome = app_state
        .lifecycle
        .close_poll(poll_id, TransitionReason::Manual)
        .await?;
    Ok(Json(TransitionResponse {
        poll: PollResponse::from(&outcome.poll),
        notification_error: outcome.notification_error,
    }))
}

async fn handle_reopen_poll(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
    Json(request): Json<ReopenPollRequest>,
) -> Result<Json<TransitionResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_transition(&actor).map_err(HttpError::from)?;

    // Local times in the request resolve against the poll's stored
    // timezone.
    let poll = app_state.lifecycle.get_poll(poll_id).await?;
    let reopen = request.into_reopen_request(&poll.timezone)?;

    let outcome = app_state
        .lifecycle
        .reopen_poll(poll_id, reopen, TransitionReason::Manual)
        .await?;
    Ok(Json(TransitionResponse {
        poll: PollResponse::from(&outcome.poll),
        notification_error: outcome.notification_error,
    }))
}

async fn handle_edit_poll(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
    Json(request): Json<EditPollRequest>,
) -> Result<Json<EditPollResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;

    let poll = app_state.lifecycle.get_poll(poll_id).await?;
    let proposed = request.into_poll_edit(&poll.timezone)?;

    // Role filter first, then the status-based rules inside the service.
    let (proposed, role_rejected) = filter_edit_for_role(actor.role, proposed);
    let outcome = app_state.lifecycle.edit_poll(poll_id, proposed).await?;

    let rejected = role_rejected
        .iter()
        .chain(outcome.rejected.iter())
        .map(|r| RejectedFieldDto {
            field: r.field.as_str().to_string(),
            reason: r.reason.clone(),
        })
        .collect();

    Ok(Json(EditPollResponse {
        poll: PollResponse::from(&outcome.poll),
        applied: outcome
            .applied
            .iter()
            .map(|field| field.as_str().to_string())
            .collect(),
        rejected,
        notification_error: outcome.notification_error,
    }))
}

async fn handle_delete_poll(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<WriteResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_delete_poll(&actor).map_err(HttpError::from)?;

    app_state.lifecycle.delete_poll(poll_id).await?;
    Ok(Json(WriteResponse {
        success: true,
        message: Some(format!("Poll {poll_id} deleted")),
    }))
}

async fn handle_cast_vote(
    AxumState(app_state): AxumState<AppState>,
    Path(poll_id): Path<i64>,
    Json(request): Json<CastVoteRequest>,
) -> Result<Json<WriteResponse>, HttpError> {
    let ballot = Ballot {
        voter_id: request.voter_id,
        option_indices: request.option_indices,
    };
    app_state.lifecycle.cast_vote(poll_id, ballot).await?;
    Ok(Json(WriteResponse {
        success: true,
        message: None,
    }))
}

async fn handle_submit_bulk(
    AxumState(app_state): AxumState<AppState>,
    Json(request): Json<BulkSubmitRequest>,
) -> Result<Json<BulkSubmitResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_bulk_operation(&actor).map_err(HttpError::from)?;

    let bulk_request = request.into_bulk_request()?;
    let operation_id = app_state.bulk.submit(bulk_request, &actor.id).await?;
    Ok(Json(BulkSubmitResponse { operation_id }))
}

async fn handle_bulk_progress(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Json<BulkProgressResponse>, HttpError> {
    let progress = app_state.bulk.get_progress(&operation_id).await?;
    Ok(Json(BulkProgressResponse::from(&progress)))
}

async fn handle_cancel_bulk(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<WriteResponse>, HttpError> {
    let actor = authenticate(&request.actor_id, &request.actor_role)?;
    AuthorizationService::authorize_bulk_operation(&actor).map_err(HttpError::from)?;

    app_state.bulk.cancel(&operation_id).await?;
    Ok(Json(WriteResponse {
        success: true,
        message: Some(String::from("Cancellation requested")),
    }))
}

async fn handle_bulk_export(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<String>,
) -> Result<Response, HttpError> {
    let artifact = app_state.bulk.export_artifact(&operation_id).await?;
    match artifact {
        Some(csv) => Ok((
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/csv")],
            csv,
        )
            .into_response()),
        None => Err(HttpError {
            status: StatusCode::NOT_FOUND,
            message: format!("Bulk operation {operation_id} has no export artifact"),
        }),
    }
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/polls", post(handle_create_poll))
        .route("/polls", get(handle_list_polls))
        .route("/polls/{poll_id}", get(handle_get_poll))
        .route("/polls/{poll_id}/results", get(handle_get_results))
        .route("/polls/{poll_id}/open", post(handle_open_poll))
        .route("/polls/{poll_id}/close", post(handle_close_poll))
        .route("/polls/{poll_id}/reopen", post(handle_reopen_poll))
        .route("/polls/{poll_id}/edit", post(handle_edit_poll))
        .route("/polls/{poll_id}/delete", post(handle_delete_poll))
        .route("/polls/{poll_id}/votes", post(handle_cast_vote))
        .route("/bulk", post(handle_submit_bulk))
        .route("/bulk/{operation_id}", get(handle_bulk_progress))
        .route("/bulk/{operation_id}/cancel", post(handle_cancel_bulk))
        .route("/bulk/{operation_id}/export", get(handle_bulk_export))
        .with_state(app_state)
}

/// Wires the full service stack over a store.
fn build_app_state(
    persistence: Persistence,
    lifecycle_config: LifecycleConfig,
    bulk_config: BulkConfig,
) -> AppState {
    let persistence = Arc::new(Mutex::new(persistence));
    let scheduler = Arc::new(SchedulerService::new());
    let lifecycle = Arc::new(LifecycleService::new(
        Arc::clone(&persistence),
        Arc::clone(&scheduler),
        Arc::new(LoggingMessagingGateway),
        Arc::new(NoopCacheLayer),
        lifecycle_config,
    ));
    let bulk = Arc::new(BulkOperationEngine::new(
        Arc::clone(&lifecycle),
        persistence,
        bulk_config,
    ));
    AppState {
        lifecycle,
        scheduler,
        bulk,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut persistence = match &args.database {
        Some(path) => {
            info!(path, "opening database file");
            Persistence::new_with_file(std::path::Path::new(path))?
        }
        None => {
            info!("using in-memory database");
            Persistence::new_in_memory()?
        }
    };

    // Bulk operations left non-terminal by a previous process are a
    // batch-level fault, not something a new worker resumes.
    let stale = persistence.fail_stale_bulk_operations(chrono::Utc::now())?;
    if stale > 0 {
        info!(stale, "failed stale bulk operations from a previous run");
    }

    let app_state = build_app_state(
        persistence,
        LifecycleConfig {
            gateway_timeout: std::time::Duration::from_secs(args.gateway_timeout_secs),
        },
        BulkConfig {
            max_targets: args.bulk_max_targets,
            per_actor_cap: args.bulk_per_actor_cap,
            item_concurrency: args.bulk_item_concurrency,
        },
    );

    // Recovery before the listener: overdue transitions fire exactly
    // once, before any new external trigger is accepted.
    let summary = app_state
        .scheduler
        .restore_from_store(&app_state.lifecycle)
        .await?;
    info!(
        fired_open = summary.fired_open,
        fired_close = summary.fired_close,
        "startup recovery complete"
    );

    tokio::spawn(Arc::clone(&app_state.scheduler).run(
        Arc::clone(&app_state.lifecycle),
        std::time::Duration::from_millis(args.tick_interval_ms),
    ));

    let app = build_router(app_state);
    let addr = format!("0.0.0.0:{}", args.port);
    info!(addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
