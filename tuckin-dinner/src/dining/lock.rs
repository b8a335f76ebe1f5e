//! The ten-minute confirmation lock. While an event is `confirming` one
//! member is calling the restaurant; the lock is released by whichever of
//! the per-event watcher or the periodic sweep gets there first.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tuckin_shared::AppResult;

use crate::calendar::Clock;
use crate::domain::{DiningEvent, EventId, EventPatch, EventStatus};
use crate::store::Store;

pub fn lock_duration() -> Duration {
    Duration::minutes(10)
}

/// The watcher releases slightly early so it never races its own timer.
fn release_threshold() -> Duration {
    Duration::seconds(594)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasedBy {
    Watcher,
    Sweep,
}

impl ReleasedBy {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Watcher => "watcher",
            Self::Sweep => "sweep",
        }
    }
}

/// Flips a `confirming` event back to `pending_confirmation`. Returns false
/// when the event had already left `confirming`.
async fn release(store: &dyn Store, event_id: EventId, now: DateTime<Utc>, via: ReleasedBy) -> AppResult<bool> {
    let patch = EventPatch::status(EventStatus::PendingConfirmation, now);
    let released = store
        .update_event(event_id, &patch, Some(EventStatus::Confirming), now)
        .await?
        .is_some();
    if released {
        metrics::counter!("confirm_locks_released_total", "via" => via.as_str()).increment(1);
        tracing::info!(event_id = %event_id, via = via.as_str(), "confirmation lock released");
    }
    Ok(released)
}

fn held_for(event: &DiningEvent, now: DateTime<Utc>) -> Duration {
    now - event.status_change_time
}

/// Sleeps out the lock of one event and releases it if nobody finished
/// confirming. The remaining wait is always derived from the stored
/// `status_change_time`, so a restarted or refreshed lock is handled the
/// same way.
pub async fn watch(store: Arc<dyn Store>, clock: Arc<dyn Clock>, event_id: EventId) {
    let mut wait = lock_duration();
    loop {
        match wait.to_std() {
            Ok(wait) => clock.sleep(wait).await,
            Err(_) => tokio::task::yield_now().await,
        }

        let event = match store.load_event(event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "lock watcher could not read event");
                return;
            }
        };
        if event.status != EventStatus::Confirming {
            return;
        }

        let now = clock.now();
        let held = held_for(&event, now);
        if held >= release_threshold() {
            if let Err(e) = release(store.as_ref(), event_id, now, ReleasedBy::Watcher).await {
                tracing::warn!(event_id = %event_id, error = %e, "lock watcher release failed");
            }
            return;
        }
        wait = lock_duration() - held;
    }
}

/// Releases every lock older than the full lock duration.
pub async fn sweep(store: &dyn Store, now: DateTime<Utc>) -> AppResult<usize> {
    let mut released = 0;
    for event in store.events_with_status(&[EventStatus::Confirming]).await? {
        if held_for(&event, now) >= lock_duration()
            && release(store, event.id, now, ReleasedBy::Sweep).await?
        {
            released += 1;
        }
    }
    Ok(released)
}
