use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::json;
use tuckin_shared::{AppError, AppResult, ErrorCode};

use crate::calendar::Clock;
use crate::domain::{DiningEvent, EventId, EventPatch, EventStatus, MatchingGroup, UserId, UserStatus};
use crate::notifier::{NotificationKind, Notifier};
use crate::random::SharedRng;
use crate::store::Store;

use super::lock;

/// Left in the description when the group will meet on site without a booking.
const PASSPHRASES: &[&str] = &[
    "今天吃什麼",
    "塔可塔可",
    "肚子餓了",
    "一起乾杯",
    "好久不見",
    "晚餐愉快",
];

const OPEN_STATUSES: [EventStatus; 3] = [
    EventStatus::PendingConfirmation,
    EventStatus::Confirming,
    EventStatus::Confirmed,
];
const COMPLETE_ATTEMPTS: usize = 3;

#[derive(Debug, Default, Clone, Serialize)]
pub struct AgeOutReport {
    pub completed: usize,
    pub members_to_rating: usize,
}

pub struct EventLifecycle {
    store: Arc<dyn Store>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    rng: Arc<SharedRng>,
}

impl EventLifecycle {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier, clock: Arc<dyn Clock>, rng: Arc<SharedRng>) -> Self {
        Self { store, notifier, clock, rng }
    }

    async fn event_and_group(&self, event_id: EventId, caller: UserId) -> AppResult<(DiningEvent, MatchingGroup)> {
        let event = self
            .store
            .load_event(event_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::EventNotFound, "dining event not found"))?;
        let group = self
            .store
            .load_group(event.group_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound, "dining group not found"))?;
        if !group.has_member(caller) {
            return Err(AppError::new(ErrorCode::NotGroupMember, "not a member of this dinner"));
        }
        Ok((event, group))
    }

    fn wrong_status(event: &DiningEvent, wanted: EventStatus) -> AppError {
        AppError::with_details(
            ErrorCode::InvalidEventStatus,
            format!("event is {}, expected {wanted}", event.status),
            json!({ "status": event.status }),
        )
    }

    /// Takes the confirmation lock and starts its watcher.
    pub async fn start_confirming(&self, event_id: EventId, caller: UserId) -> AppResult<DiningEvent> {
        let (event, _) = self.event_and_group(event_id, caller).await?;
        if event.status != EventStatus::PendingConfirmation {
            return Err(Self::wrong_status(&event, EventStatus::PendingConfirmation));
        }

        let now = self.clock.now();
        let updated = self
            .store
            .update_event(
                event_id,
                &EventPatch::status(EventStatus::Confirming, now),
                Some(EventStatus::PendingConfirmation),
                now,
            )
            .await?
            // Another member took the lock between our read and write.
            .ok_or_else(|| Self::wrong_status(&event, EventStatus::PendingConfirmation))?;

        tokio::spawn(lock::watch(self.store.clone(), self.clock.clone(), event_id));
        tracing::info!(event_id = %event_id, user_id = %caller, "confirmation started");
        Ok(updated)
    }

    pub async fn confirm(
        &self,
        event_id: EventId,
        caller: UserId,
        reservation_name: &str,
        reservation_phone: &str,
    ) -> AppResult<DiningEvent> {
        let (event, _) = self.event_and_group(event_id, caller).await?;
        if event.status != EventStatus::Confirming {
            return Err(Self::wrong_status(&event, EventStatus::Confirming));
        }

        let (name, phone) = (reservation_name.trim(), reservation_phone.trim());
        let now = self.clock.now();
        let mut patch = EventPatch {
            reservation_name: Some(name.to_string()),
            reservation_phone: Some(phone.to_string()),
            ..EventPatch::status(EventStatus::Confirmed, now)
        };
        if name.is_empty() && phone.is_empty() {
            let phrase = PASSPHRASES.choose(&mut self.rng.fork()).copied().unwrap_or(PASSPHRASES[0]);
            patch.description = Some(Some(format!("不需訂位，到店後說出暗號「{phrase}」")));
        }

        let updated = self
            .store
            .update_event(event_id, &patch, Some(EventStatus::Confirming), now)
            .await?
            .ok_or_else(|| Self::wrong_status(&event, EventStatus::Confirming))?;
        tracing::info!(event_id = %event_id, implicit = name.is_empty() && phone.is_empty(), "restaurant confirmed");
        Ok(updated)
    }

    /// Moves to the next candidate restaurant and refreshes the lock.
    pub async fn swap_restaurant(&self, event_id: EventId, caller: UserId) -> AppResult<DiningEvent> {
        let (event, _) = self.event_and_group(event_id, caller).await?;
        if event.status != EventStatus::Confirming {
            return Err(Self::wrong_status(&event, EventStatus::Confirming));
        }
        let Some((next, rest)) = event.candidate_restaurant_ids.split_first() else {
            return Err(AppError::new(ErrorCode::CandidatesExhausted, "no other restaurant to switch to"));
        };

        let now = self.clock.now();
        let patch = EventPatch {
            restaurant_id: Some(*next),
            candidate_restaurant_ids: Some(rest.to_vec()),
            status_change_time: Some(now),
            ..EventPatch::default()
        };
        let updated = self
            .store
            .update_event(event_id, &patch, Some(EventStatus::Confirming), now)
            .await?
            .ok_or_else(|| Self::wrong_status(&event, EventStatus::Confirming))?;
        tracing::info!(event_id = %event_id, restaurant_id = %next, remaining = rest.len(), "restaurant swapped");
        Ok(updated)
    }

    pub async fn sweep_locks(&self) -> AppResult<usize> {
        lock::sweep(self.store.as_ref(), self.clock.now()).await
    }

    /// Marks every past dinner completed and opens rating for its members.
    pub async fn age_out(&self) -> AppResult<AgeOutReport> {
        let now = self.clock.now();
        let mut report = AgeOutReport::default();
        let open = self.store.events_with_status(&OPEN_STATUSES).await?;

        for event in open.into_iter().filter(|e| e.date < now) {
            let Some(completed) = self.complete(event, now).await? else {
                continue;
            };
            report.completed += 1;

            let Some(group) = self.store.load_group(completed.group_id).await? else {
                tracing::warn!(event_id = %completed.id, "completed event has no group");
                continue;
            };
            let moved = self
                .store
                .transition_users(&group.user_ids, UserStatus::WaitingAttendance, UserStatus::Rating)
                .await?;
            report.members_to_rating += moved.len();

            self.notifier
                .notify_group(
                    &group.user_ids,
                    "聚餐結束囉",
                    "幫這次一起吃飯的夥伴評分吧！",
                    NotificationKind::RatingOpen.payload(json!({ "dining_event_id": completed.id })),
                )
                .await;
        }

        tracing::info!(completed = report.completed, members = report.members_to_rating, "events aged out");
        Ok(report)
    }

    /// Guarded move to `completed`. A lock taken or released after the
    /// listing changes the status under us, so re-read and retry while the
    /// event is still open.
    async fn complete(&self, mut event: DiningEvent, now: DateTime<Utc>) -> AppResult<Option<DiningEvent>> {
        let patch = EventPatch::status(EventStatus::Completed, now);
        for _ in 0..COMPLETE_ATTEMPTS {
            if let Some(done) = self.store.update_event(event.id, &patch, Some(event.status), now).await? {
                return Ok(Some(done));
            }
            match self.store.load_event(event.id).await? {
                Some(current) if OPEN_STATUSES.contains(&current.status) => event = current,
                _ => return Ok(None),
            }
        }
        tracing::warn!(event_id = %event.id, status = %event.status, "event kept changing status, left for the next run");
        Ok(None)
    }
}
