use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use tuckin_shared::clients::object_store::ObjectStoreClient;
use tuckin_shared::AppResult;

use crate::calendar::Clock;
use crate::domain::{ArchiveEntry, DiningEvent, DiningHistory, EventId, EventStatus};
use crate::store::Store;

/// Completed events stay readable this long after the dinner.
pub fn retention() -> Duration {
    Duration::days(2)
}

/// Bucket cleanup port.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize>;
}

#[async_trait]
impl ObjectStore for ObjectStoreClient {
    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        ObjectStoreClient::delete_prefix(self, prefix).await
    }
}

pub fn chat_image_prefix(event_id: EventId) -> String {
    format!("chat_images/{event_id}/")
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ArchiveReport {
    pub archived: usize,
    /// Archived without a group row to take members from.
    pub orphaned: usize,
    pub images_deleted: usize,
}

pub struct Archiver {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl Archiver {
    pub fn new(store: Arc<dyn Store>, objects: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, objects, clock }
    }

    /// Builds the archive row for one event. An event whose group row is
    /// gone still gets archived, with no members, so it can't linger in
    /// `completed`.
    async fn entry_for(&self, event: &DiningEvent) -> AppResult<ArchiveEntry> {
        let group = self.store.load_group(event.group_id).await?;
        if group.is_none() {
            tracing::warn!(event_id = %event.id, group_id = %event.group_id, "event without group, archived without members");
        }
        let (member_ids, school_only) = group.map_or((Vec::new(), false), |g| (g.user_ids, g.school_only));
        let restaurant_name = self
            .store
            .load_restaurant(event.restaurant_id)
            .await?
            .map(|r| r.name)
            .unwrap_or_default();

        Ok(ArchiveEntry {
            event_id: event.id,
            group_id: event.group_id,
            member_ids: member_ids.clone(),
            history: DiningHistory {
                original_event_id: event.id,
                group_id: event.group_id,
                restaurant_id: event.restaurant_id,
                restaurant_name,
                event_name: event.name.clone(),
                event_date: event.date,
                attendee_count: event.attendee_count,
                user_ids: member_ids,
                school_only,
            },
        })
    }

    /// Moves every completed event older than the retention window into
    /// history and clears the cycle's working rows.
    pub async fn archive(&self) -> AppResult<ArchiveReport> {
        let now = self.clock.now();
        let cutoff = now - retention();
        let mut report = ArchiveReport::default();

        let due: Vec<DiningEvent> = self
            .store
            .events_with_status(&[EventStatus::Completed])
            .await?
            .into_iter()
            .filter(|e| e.date < cutoff)
            .collect();
        if due.is_empty() {
            tracing::info!("nothing to archive");
            return Ok(report);
        }

        let mut entries = Vec::with_capacity(due.len());
        for event in &due {
            let entry = self.entry_for(event).await?;
            if entry.member_ids.is_empty() {
                report.orphaned += 1;
            }
            entries.push(entry);
        }

        for entry in &entries {
            let prefix = chat_image_prefix(entry.event_id);
            match self.objects.delete_prefix(&prefix).await {
                Ok(count) => report.images_deleted += count,
                Err(e) => tracing::warn!(event_id = %entry.event_id, error = %e, "chat image cleanup failed"),
            }
        }

        report.archived = self.store.archive_cycle(&entries, now).await?;
        tracing::info!(archived = report.archived, orphaned = report.orphaned, "cycle archived");
        Ok(report)
    }
}
