// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Shared fixtures: a recording gateway/cache pair and a wired service
//! harness.

use crate::error::GatewayError;
use crate::gateway::{CacheLayer, MessagingGateway, PollResults};
use crate::scheduler::SchedulerService;
use crate::service::{LifecycleConfig, LifecycleService, NewPollRequest};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use pollwarden_domain::{Poll, PollOption, PollStatus};
use pollwarden_persistence::{NewPollRecord, Persistence};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// Gateway that records every call and can be told to fail or stall.
#[derive(Default)]
pub struct RecordingGateway {
    pub announces: StdMutex<Vec<i64>>,
    pub refreshes: StdMutex<Vec<i64>>,
    pub reveals: StdMutex<Vec<i64>>,
    pub fail_announce: AtomicBool,
    pub fail_reveal: AtomicBool,
    pub call_delay_ms: StdMutex<Option<u64>>,
}

impl RecordingGateway {
    pub fn announce_count(&self) -> usize {
        self.announces.lock().unwrap().len()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.lock().unwrap().len()
    }

    pub fn reveal_count(&self) -> usize {
        self.reveals.lock().unwrap().len()
    }

    async fn maybe_delay(&self) {
        let delay = *self.call_delay_ms.lock().unwrap();
        if let Some(ms) = delay {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn announce(&self, poll: &Poll) -> Result<String, GatewayError> {
        self.maybe_delay().await;
        if self.fail_announce.load(Ordering::SeqCst) {
            return Err(GatewayError::Network(String::from("announce unreachable")));
        }
        self.announces.lock().unwrap().push(poll.poll_id);
        Ok(format!("msg-{}", poll.poll_id))
    }

    async fn refresh(&self, poll: &Poll, _message_ref: &str) -> Result<(), GatewayError> {
        self.maybe_delay().await;
        self.refreshes.lock().unwrap().push(poll.poll_id);
        Ok(())
    }

    async fn reveal_results(
        &self,
        poll: &Poll,
        _results: &PollResults,
        _message_ref: &str,
    ) -> Result<(), GatewayError> {
        self.maybe_delay().await;
        if self.fail_reveal.load(Ordering::SeqCst) {
            return Err(GatewayError::Network(String::from("reveal unreachable")));
        }
        self.reveals.lock().unwrap().push(poll.poll_id);
        Ok(())
    }
}

/// Cache layer that records invalidations.
#[derive(Default)]
pub struct RecordingCache {
    pub invalidations: StdMutex<Vec<i64>>,
}

#[async_trait]
impl CacheLayer for RecordingCache {
    async fn invalidate(&self, poll_id: i64) -> Result<(), GatewayError> {
        self.invalidations.lock().unwrap().push(poll_id);
        Ok(())
    }
}

/// A fully wired service stack over one in-memory store.
pub struct TestHarness {
    pub persistence: Arc<Mutex<Persistence>>,
    pub scheduler: Arc<SchedulerService>,
    pub lifecycle: Arc<LifecycleService>,
    pub gateway: Arc<RecordingGateway>,
    pub cache: Arc<RecordingCache>,
}

impl TestHarness {
    pub fn new() -> Self {
        let persistence = Arc::new(Mutex::new(
            Persistence::new_in_memory().expect("in-memory database"),
        ));
        Self::with_persistence(persistence)
    }

    /// Builds fresh services over an existing store: a process restart
    /// in miniature.
    pub fn with_persistence(persistence: Arc<Mutex<Persistence>>) -> Self {
        let scheduler = Arc::new(SchedulerService::new());
        let gateway = Arc::new(RecordingGateway::default());
        let cache = Arc::new(RecordingCache::default());
        let lifecycle = Arc::new(LifecycleService::new(
            Arc::clone(&persistence),
            Arc::clone(&scheduler),
            Arc::clone(&gateway) as Arc<dyn MessagingGateway>,
            Arc::clone(&cache) as Arc<dyn CacheLayer>,
            LifecycleConfig::default(),
        ));
        Self {
            persistence,
            scheduler,
            lifecycle,
            gateway,
            cache,
        }
    }

    /// Writes a poll row directly, bypassing the lifecycle service.
    /// Used to stage store contents "left behind" by an earlier process.
    pub async fn seed_poll(
        &self,
        name: &str,
        status: PollStatus,
        open_offset_secs: i64,
        close_offset_secs: i64,
    ) -> i64 {
        let now = Utc::now();
        let record = NewPollRecord {
            name: name.to_string(),
            description: None,
            status,
            open_time: now + Duration::seconds(open_offset_secs),
            close_time: now + Duration::seconds(close_offset_secs),
            timezone: String::from("America/New_York"),
            anonymous: false,
            multiple_choice: false,
            max_choices: 1,
            options: vec![PollOption::new("Yes", "✅"), PollOption::new("No", "❌")],
            created_at: now,
        };
        let mut store = self.persistence.lock().await;
        store.create_poll(&record).expect("seed poll")
    }

    /// Creates an active, announced poll through the lifecycle service.
    pub async fn create_active_poll(&self, name: &str) -> i64 {
        let outcome = self
            .lifecycle
            .create_poll(poll_request(name, 0, 3600, true))
            .await
            .expect("create active poll");
        outcome.poll.poll_id
    }
}

/// A creation request with offsets relative to now.
pub fn poll_request(
    name: &str,
    open_offset_secs: i64,
    close_offset_secs: i64,
    open_immediately: bool,
) -> NewPollRequest {
    let now = Utc::now();
    NewPollRequest {
        name: name.to_string(),
        description: Some(String::from("test poll")),
        open_time: now + Duration::seconds(open_offset_secs),
        close_time: now + Duration::seconds(close_offset_secs),
        timezone: String::from("America/New_York"),
        anonymous: false,
        multiple_choice: false,
        max_choices: 1,
        options: vec![PollOption::new("Yes", "✅"), PollOption::new("No", "❌")],
        open_immediately,
    }
}
