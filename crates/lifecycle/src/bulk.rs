// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The bulk operation engine.
//!
//! Applies one lifecycle operation to a large set of polls with bounded
//! concurrency, live progress, and cooperative cancellation. Every item
//! goes through the lifecycle service; the engine never mutates a poll
//! directly.
//!
//! ## Invariants
//!
//! - A single item's failure is recorded and never aborts the batch
//! - Cancellation is checked between items, not mid-item; in-flight items
//!   complete and already-processed items are not rolled back
//! - `completed` means the worker reached the end of the target list,
//!   even with per-item failures; `failed` is reserved for batch-level
//!   faults (worker crash, store unreachable)
//! - Progress counters are mirrored to the store so finished operations
//!   survive restarts; operations left non-terminal by a dead process are
//!   failed at the next startup

use crate::error::BulkError;
use crate::service::{LifecycleService, ReopenRequest, ReopenSchedule, TransitionReason};
use chrono::Utc;
use futures::StreamExt;
use pollwarden_domain::{BulkOperationStatus, BulkOperationType};
use pollwarden_persistence::Persistence;
use rand::RngExt;
use rand::distr::Alphanumeric;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Configuration for the bulk engine.
#[derive(Debug, Clone, Copy)]
pub struct BulkConfig {
    /// Maximum number of target polls per operation.
    pub max_targets: usize,
    /// Maximum concurrently running operations per actor.
    pub per_actor_cap: i64,
    /// Items in flight at once. Kept small so a batch cannot overwhelm
    /// the messaging gateway's rate limits.
    pub item_concurrency: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_targets: 1000,
            per_actor_cap: 2,
            item_concurrency: 4,
        }
    }
}

/// A bulk submission.
#[derive(Debug, Clone)]
pub struct BulkRequest {
    /// The lifecycle operation to apply to each target.
    pub op_type: BulkOperationType,
    /// The target polls, in submission order.
    pub target_poll_ids: Vec<i64>,
    /// Reopen parameters, used when `op_type` is `Reopen`.
    pub reopen: Option<ReopenRequest>,
}

/// A progress snapshot, observable at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkProgress {
    /// The operation identifier.
    pub operation_id: String,
    /// The operation type.
    pub op_type: BulkOperationType,
    /// Current status.
    pub status: BulkOperationStatus,
    /// Number of targets.
    pub total_count: usize,
    /// Targets processed so far.
    pub processed_count: usize,
    /// Targets that succeeded.
    pub success_count: usize,
    /// Targets that failed.
    pub failure_count: usize,
    /// The item currently being processed, if any.
    pub current_poll_id: Option<i64>,
    /// Per-item errors accumulated so far. Snapshots of a finished
    /// operation list them in submission order.
    pub errors: Vec<(i64, String)>,
}

impl BulkProgress {
    /// Completion percentage, 0..=100.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        if self.total_count == 0 {
            return 100;
        }
        let percent = self.processed_count * 100 / self.total_count;
        u8::try_from(percent).unwrap_or(100)
    }
}

/// Durable form of the submission parameters.
#[derive(Debug, Serialize)]
struct StoredParameters<'a> {
    target_poll_ids: &'a [i64],
    reset_votes: bool,
    new_close_time: Option<chrono::DateTime<Utc>>,
    extend_by_seconds: Option<i64>,
}

/// One row of the export artifact.
#[derive(Debug, Clone)]
struct ExportRow {
    poll_id: i64,
    poll_name: String,
    option_label: String,
    votes: i64,
}

/// Mutable state of a running operation.
struct LiveState {
    status: BulkOperationStatus,
    processed: usize,
    success: usize,
    failure: usize,
    current_poll_id: Option<i64>,
    errors: Vec<(i64, String)>,
    export_rows: Vec<ExportRow>,
    store_fault: bool,
}

/// Registry entry for a running operation.
struct ActiveOperation {
    op_type: BulkOperationType,
    total: usize,
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<LiveState>>,
}

type Registry = Arc<Mutex<HashMap<String, ActiveOperation>>>;

/// The bulk operation engine. See the module docs.
pub struct BulkOperationEngine {
    lifecycle: Arc<LifecycleService>,
    persistence: Arc<Mutex<Persistence>>,
    config: BulkConfig,
    registry: Registry,
}

impl BulkOperationEngine {
    /// Creates a bulk engine over the lifecycle service and store.
    #[must_use]
    pub fn new(
        lifecycle: Arc<LifecycleService>,
        persistence: Arc<Mutex<Persistence>>,
        config: BulkConfig,
    ) -> Self {
        Self {
            lifecycle,
            persistence,
            config,
            registry: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit a bulk operation; returns its id. The worker runs in a
    /// background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the target list is empty or oversized, the
    /// actor is at the per-actor cap, or the record cannot be persisted.
    pub async fn submit(
        &self,
        request: BulkRequest,
        submitted_by: &str,
    ) -> Result<String, BulkError> {
        if request.target_poll_ids.is_empty() {
            return Err(BulkError::NoTargets);
        }
        if request.target_poll_ids.len() > self.config.max_targets {
            return Err(BulkError::TooManyTargets {
                requested: request.target_poll_ids.len(),
                max: self.config.max_targets,
            });
        }

        {
            let mut store = self.persistence.lock().await;
            let active = store.count_active_operations_for_actor(submitted_by)?;
            if active >= self.config.per_actor_cap {
                return Err(BulkError::ActorBusy {
                    actor: submitted_by.to_string(),
                    active,
                    cap: self.config.per_actor_cap,
                });
            }
        }

        let operation_id = generate_operation_id();
        let parameters_json = serialize_parameters(&request)?;
        let total = request.target_poll_ids.len();

        {
            let mut store = self.persistence.lock().await;
            store.create_bulk_operation(
                &operation_id,
                request.op_type,
                submitted_by,
                i32::try_from(total).unwrap_or(i32::MAX),
                &parameters_json,
                Utc::now(),
            )?;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(LiveState {
            status: BulkOperationStatus::Pending,
            processed: 0,
            success: 0,
            failure: 0,
            current_poll_id: None,
            errors: Vec::new(),
            export_rows: Vec::new(),
            store_fault: false,
        }));

        {
            let mut registry = self.registry.lock().await;
            registry.insert(
                operation_id.clone(),
                ActiveOperation {
                    op_type: request.op_type,
                    total,
                    cancel: Arc::clone(&cancel),
                    state: Arc::clone(&state),
                },
            );
        }

        info!(
            operation_id,
            op_type = %request.op_type,
            targets = total,
            submitted_by,
            "bulk operation submitted"
        );

        let worker = Worker {
            lifecycle: Arc::clone(&self.lifecycle),
            persistence: Arc::clone(&self.persistence),
            item_concurrency: self.config.item_concurrency,
            registry: Arc::clone(&self.registry),
        };
        let worker_id = operation_id.clone();
        tokio::spawn(async move {
            worker.run(worker_id, request, cancel, state).await;
        });

        Ok(operation_id)
    }

    /// A progress snapshot for an operation, live or finished.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` if the id is unknown.
    pub async fn get_progress(&self, operation_id: &str) -> Result<BulkProgress, BulkError> {
        {
            let registry = self.registry.lock().await;
            if let Some(active) = registry.get(operation_id) {
                let state = active.state.lock().await;
                return Ok(BulkProgress {
                    operation_id: operation_id.to_string(),
                    op_type: active.op_type,
                    status: state.status,
                    total_count: active.total,
                    processed_count: state.processed,
                    success_count: state.success,
                    failure_count: state.failure,
                    current_poll_id: state.current_poll_id,
                    errors: state.errors.clone(),
                });
            }
        }

        let mut store = self.persistence.lock().await;
        let record = store
            .get_bulk_operation(operation_id)?
            .ok_or_else(|| BulkError::OperationNotFound(operation_id.to_string()))?;
        let errors = store
            .list_bulk_item_errors(operation_id)?
            .into_iter()
            .map(|e| (e.poll_id, e.message))
            .collect();
        Ok(BulkProgress {
            operation_id: record.operation_id,
            op_type: record.op_type,
            status: record.status,
            total_count: count(record.total_count),
            processed_count: count(record.processed_count),
            success_count: count(record.success_count),
            failure_count: count(record.failure_count),
            current_poll_id: None,
            errors,
        })
    }

    /// The CSV artifact of a finished export operation, if present.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` if the id is unknown.
    pub async fn export_artifact(&self, operation_id: &str) -> Result<Option<String>, BulkError> {
        let mut store = self.persistence.lock().await;
        let record = store
            .get_bulk_operation(operation_id)?
            .ok_or_else(|| BulkError::OperationNotFound(operation_id.to_string()))?;
        Ok(record.result_csv)
    }

    /// Request cancellation. The flag is observed between items; the
    /// in-flight item completes first.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotFound` for an unknown id or `AlreadyTerminal`
    /// if the operation has finished.
    pub async fn cancel(&self, operation_id: &str) -> Result<(), BulkError> {
        {
            let registry = self.registry.lock().await;
            if let Some(active) = registry.get(operation_id) {
                active.cancel.store(true, Ordering::SeqCst);
                info!(operation_id, "bulk cancellation requested");
                return Ok(());
            }
        }

        let mut store = self.persistence.lock().await;
        match store.get_bulk_operation(operation_id)? {
            Some(record) => Err(BulkError::AlreadyTerminal {
                status: record.status.as_str().to_string(),
            }),
            None => Err(BulkError::OperationNotFound(operation_id.to_string())),
        }
    }

}

/// The handles a spawned worker needs; cloned out of the engine at
/// submission time so the task owns everything it touches.
struct Worker {
    lifecycle: Arc<LifecycleService>,
    persistence: Arc<Mutex<Persistence>>,
    item_concurrency: usize,
    registry: Registry,
}

impl Worker {
    /// Processes every target with bounded concurrency.
    async fn run(
        self,
        operation_id: String,
        request: BulkRequest,
        cancel: Arc<AtomicBool>,
        state: Arc<Mutex<LiveState>>,
    ) {
        {
            let mut store = self.persistence.lock().await;
            if let Err(e) = store.mark_bulk_started(&operation_id, Utc::now()) {
                error!(operation_id, error = %e, "failed to mark bulk operation started");
            }
        }
        {
            let mut live = state.lock().await;
            live.status = BulkOperationStatus::Running;
        }

        let op_type = request.op_type;
        let reopen = request.reopen;
        let worker = &self;
        futures::stream::iter(request.target_poll_ids.into_iter().enumerate())
            .map(|(position, poll_id)| {
                let operation_id = operation_id.clone();
                let cancel = Arc::clone(&cancel);
                let state = Arc::clone(&state);
                async move {
                    worker
                        .process_item(&operation_id, op_type, reopen, position, poll_id, &cancel, &state)
                        .await;
                }
            })
            .buffer_unordered(self.item_concurrency)
            .collect::<Vec<()>>()
            .await;

        let (final_status, processed, success, failure, result_csv) = {
            let mut live = state.lock().await;
            live.current_poll_id = None;
            let status = if live.store_fault {
                BulkOperationStatus::Failed
            } else if cancel.load(Ordering::SeqCst) {
                BulkOperationStatus::Cancelled
            } else {
                BulkOperationStatus::Completed
            };
            live.status = status;
            let csv = if op_type == BulkOperationType::Export && !live.export_rows.is_empty() {
                match build_export_csv(&live.export_rows) {
                    Ok(csv) => Some(csv),
                    Err(e) => {
                        error!(operation_id, error = %e, "failed to build export artifact");
                        None
                    }
                }
            } else {
                None
            };
            (status, live.processed, live.success, live.failure, csv)
        };

        {
            let mut store = self.persistence.lock().await;
            if let Err(e) = store.finish_bulk_operation(
                &operation_id,
                final_status,
                i32::try_from(processed).unwrap_or(i32::MAX),
                i32::try_from(success).unwrap_or(i32::MAX),
                i32::try_from(failure).unwrap_or(i32::MAX),
                result_csv.as_deref(),
                Utc::now(),
            ) {
                error!(operation_id, error = %e, "failed to finalize bulk operation record");
            }
        }

        info!(
            operation_id,
            status = %final_status,
            processed,
            success,
            failure,
            "bulk operation finished"
        );

        let mut registry = self.registry.lock().await;
        registry.remove(&operation_id);
    }

    /// One target: skipped when cancelled, otherwise run through the
    /// lifecycle service with the failure isolated.
    #[allow(clippy::too_many_arguments)]
    async fn process_item(
        &self,
        operation_id: &str,
        op_type: BulkOperationType,
        reopen: Option<ReopenRequest>,
        position: usize,
        poll_id: i64,
        cancel: &AtomicBool,
        state: &Mutex<LiveState>,
    ) {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut live = state.lock().await;
            live.current_poll_id = Some(poll_id);
        }

        let outcome: Result<Vec<ExportRow>, String> = match op_type {
            BulkOperationType::Close => self
                .lifecycle
                .close_poll(poll_id, TransitionReason::Manual)
                .await
                .map(|_| Vec::new())
                .map_err(|e| e.to_string()),
            BulkOperationType::Reopen => {
                let request = reopen.unwrap_or(ReopenRequest {
                    schedule: ReopenSchedule::KeepCloseTime,
                    reset_votes: false,
                });
                self.lifecycle
                    .reopen_poll(poll_id, request, TransitionReason::Manual)
                    .await
                    .map(|_| Vec::new())
                    .map_err(|e| e.to_string())
            }
            BulkOperationType::Delete => self
                .lifecycle
                .delete_poll(poll_id)
                .await
                .map(|()| Vec::new())
                .map_err(|e| e.to_string()),
            BulkOperationType::Export => self.export_item(poll_id).await,
        };

        let mut live = state.lock().await;
        live.processed += 1;
        match outcome {
            Ok(rows) => {
                live.success += 1;
                live.export_rows.extend(rows);
            }
            Err(message) => {
                live.failure += 1;
                warn!(operation_id, poll_id, error = %message, "bulk item failed");
                live.errors.push((poll_id, message.clone()));
                let mut store = self.persistence.lock().await;
                if let Err(e) = store.record_bulk_item_error(
                    operation_id,
                    poll_id,
                    i32::try_from(position).unwrap_or(i32::MAX),
                    &message,
                ) {
                    error!(operation_id, error = %e, "failed to record bulk item error");
                    live.store_fault = true;
                }
            }
        }
        let (processed, success, failure) = (live.processed, live.success, live.failure);
        drop(live);

        let mut store = self.persistence.lock().await;
        if let Err(e) = store.update_bulk_progress(
            operation_id,
            i32::try_from(processed).unwrap_or(i32::MAX),
            i32::try_from(success).unwrap_or(i32::MAX),
            i32::try_from(failure).unwrap_or(i32::MAX),
        ) {
            error!(operation_id, error = %e, "failed to mirror bulk progress");
            drop(store);
            let mut live = state.lock().await;
            live.store_fault = true;
        }
    }

    /// Export one poll's tallies: one row per option.
    async fn export_item(&self, poll_id: i64) -> Result<Vec<ExportRow>, String> {
        let poll = self
            .lifecycle
            .get_poll(poll_id)
            .await
            .map_err(|e| e.to_string())?;
        let results = self
            .lifecycle
            .poll_results(poll_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(results
            .tallies
            .into_iter()
            .map(|tally| ExportRow {
                poll_id,
                poll_name: poll.name.clone(),
                option_label: tally.label,
                votes: tally.votes,
            })
            .collect())
    }
}

fn count(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn generate_operation_id() -> String {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    format!("op_{token}")
}

fn serialize_parameters(request: &BulkRequest) -> Result<String, BulkError> {
    let (reset_votes, new_close_time, extend_by_seconds) = match request.reopen {
        Some(reopen) => {
            let (new_close, extend) = match reopen.schedule {
                ReopenSchedule::KeepCloseTime => (None, None),
                ReopenSchedule::NewCloseTime(at) => (Some(at), None),
                ReopenSchedule::ExtendBy(duration) => (None, Some(duration.num_seconds())),
            };
            (reopen.reset_votes, new_close, extend)
        }
        None => (false, None, None),
    };
    let parameters = StoredParameters {
        target_poll_ids: &request.target_poll_ids,
        reset_votes,
        new_close_time,
        extend_by_seconds,
    };
    serde_json::to_string(&parameters)
        .map_err(|e| BulkError::Store(pollwarden_persistence::PersistenceError::SerializationError(e.to_string())))
}

fn build_export_csv(rows: &[ExportRow]) -> Result<String, String> {
    // Items complete in arbitrary order under concurrency; the artifact
    // is sorted by poll id with option order preserved within a poll.
    let mut ordered: Vec<&ExportRow> = rows.iter().collect();
    ordered.sort_by_key(|row| row.poll_id);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["poll_id", "poll_name", "option_label", "votes"])
        .map_err(|e| e.to_string())?;
    for row in ordered {
        writer
            .write_record([
                row.poll_id.to_string(),
                row.poll_name.clone(),
                row.option_label.clone(),
                row.votes.to_string(),
            ])
            .map_err(|e| e.to_string())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
