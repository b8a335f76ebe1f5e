//! Test doubles shared by the service tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use tuckin_shared::{AppError, AppResult};
use uuid::Uuid;

use crate::calendar::{local_instant, Clock};
use crate::dining::archive::ObjectStore;
use crate::domain::{Gender, Personality, PoolUser, UserId};
use crate::notifier::PushSink;

/// A clock pinned to a fixed start that follows tokio's clock from there, so
/// tests running with paused time move it by sleeping. `advance` and `set`
/// jump it by hand. Without paused time real time keeps accruing, so only
/// compare against thresholds there.
#[derive(Debug)]
pub struct ManualClock {
    base: DateTime<Utc>,
    started: tokio::time::Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            base: now,
            started: tokio::time::Instant::now(),
            offset: Mutex::new(Duration::zero()),
        }
    }

    fn elapsed(&self) -> Duration {
        Duration::from_std(self.started.elapsed()).unwrap()
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.offset.lock().unwrap() = to - self.base - self.elapsed();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + self.elapsed() + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub fn taipei(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    local_instant(NaiveDate::from_ymd_opt(y, m, d).unwrap(), h, min).unwrap()
}

/// Tuesday 2025-01-07 06:00 Taipei: the matching instant for the Thursday
/// 2025-01-09 dinner.
pub fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at(taipei(2025, 1, 7, 6, 0)))
}

#[derive(Debug, Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<(UserId, String, Value)>>,
    failing: Mutex<Vec<UserId>>,
}

impl RecordingPush {
    pub fn fail_for(&self, user_id: UserId) {
        self.failing.lock().unwrap().push(user_id);
    }

    pub fn sent_to(&self) -> Vec<UserId> {
        self.sent.lock().unwrap().iter().map(|(id, ..)| *id).collect()
    }

    pub fn sent(&self) -> Vec<(UserId, String, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSink for RecordingPush {
    async fn send(&self, user_id: UserId, title: &str, _body: &str, data: &Value) -> AppResult<()> {
        if self.failing.lock().unwrap().contains(&user_id) {
            return Err(AppError::transient("device unreachable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((user_id, title.to_string(), data.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingObjectStore {
    pub deleted_prefixes: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        if self.fail {
            return Err(AppError::transient("bucket unavailable"));
        }
        self.deleted_prefixes.lock().unwrap().push(prefix.to_string());
        Ok(1)
    }
}

pub fn pool_user(gender: Gender, personality: Personality, prefer_school_only: bool) -> PoolUser {
    PoolUser {
        id: Uuid::new_v4(),
        gender,
        personality,
        prefer_school_only,
        food_preferences: Vec::new(),
    }
}
