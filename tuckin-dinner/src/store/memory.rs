//! In-memory store used by the service tests. Mirrors the guard semantics of
//! `PgStore` so the same scenarios hold against either.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tuckin_shared::AppResult;
use uuid::Uuid;

use super::Store;
use crate::domain::{
    ArchiveEntry, CategoryId, DiningEvent, DiningHistory, EventId, EventPatch, EventStatus,
    Gender, GroupId, GroupStatus, GroupVotes, MatchingGroup, NewDiningEvent, NewGroup,
    NewNotification, Personality, PoolUser, RatingSession, Restaurant, RestaurantId,
    RestaurantVote, ScheduleRow, TaskStatus, TaskType, UserId, UserProfile, UserRating, UserStatus,
    WaitingPool,
};

#[derive(Debug, Clone)]
pub struct MemUser {
    pub id: UserId,
    pub nickname: String,
    pub gender: Option<Gender>,
    pub personality: Option<Personality>,
    pub prefer_school_only: bool,
    pub food_preferences: Vec<CategoryId>,
}

#[derive(Debug, Default)]
pub struct MemState {
    pub users: Vec<MemUser>,
    pub statuses: HashMap<UserId, UserStatus>,
    pub matching_info: HashMap<UserId, (GroupId, DateTime<Utc>)>,
    pub history: Vec<DiningHistory>,
    pub groups: BTreeMap<GroupId, MatchingGroup>,
    pub restaurants: Vec<Restaurant>,
    pub votes: Vec<RestaurantVote>,
    pub events: BTreeMap<EventId, DiningEvent>,
    pub sessions: HashMap<String, RatingSession>,
    pub ratings: BTreeMap<(EventId, UserId, UserId), UserRating>,
    pub schedule: Vec<ScheduleRow>,
    pub notifications: Vec<NewNotification>,
    pub device_tokens: HashMap<UserId, Vec<String>>,
    pub chat_messages: Vec<(Uuid, EventId)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn add_pool_user(&self, user: &PoolUser, status: UserStatus) {
        let mut state = self.state();
        state.users.push(MemUser {
            id: user.id,
            nickname: format!("user-{}", &user.id.to_string()[..8]),
            gender: Some(user.gender),
            personality: Some(user.personality),
            prefer_school_only: user.prefer_school_only,
            food_preferences: user.food_preferences.clone(),
        });
        state.statuses.insert(user.id, status);
    }

    pub fn add_restaurant(&self, name: &str, category_id: Option<CategoryId>, business_hours: Option<&str>) -> RestaurantId {
        let id = Uuid::new_v4();
        self.state().restaurants.push(Restaurant {
            id,
            name: name.to_string(),
            category_id,
            address: None,
            business_hours: business_hours.map(str::to_string),
        });
        id
    }

    pub fn status_of(&self, user_id: UserId) -> Option<UserStatus> {
        self.state().statuses.get(&user_id).copied()
    }

    pub fn event(&self, id: EventId) -> Option<DiningEvent> {
        self.state().events.get(&id).cloned()
    }

    pub fn notifications_for(&self, user_id: UserId) -> Vec<NewNotification> {
        self.state()
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }
}

fn guarded<T: PartialEq + Copy>(current: T, expected: Option<T>) -> bool {
    expected.map_or(true, |e| e == current)
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn waiting_users(&self) -> AppResult<WaitingPool> {
        let state = self.state();
        let mut pool = WaitingPool::default();
        for u in state
            .users
            .iter()
            .filter(|u| state.statuses.get(&u.id) == Some(&UserStatus::WaitingMatching))
        {
            match (u.gender, u.personality) {
                (Some(gender), Some(personality)) => pool.users.push(PoolUser {
                    id: u.id,
                    gender,
                    personality,
                    prefer_school_only: u.prefer_school_only,
                    food_preferences: u.food_preferences.clone(),
                }),
                _ => pool.incomplete.push(u.id),
            }
        }
        Ok(pool)
    }

    async fn users_with_status(&self, statuses: &[UserStatus]) -> AppResult<Vec<UserId>> {
        let state = self.state();
        Ok(state
            .users
            .iter()
            .filter(|u| state.statuses.get(&u.id).is_some_and(|s| statuses.contains(s)))
            .map(|u| u.id)
            .collect())
    }

    async fn user_status(&self, user_id: UserId) -> AppResult<Option<UserStatus>> {
        Ok(self.status_of(user_id))
    }

    async fn transition_users(&self, ids: &[UserId], from: UserStatus, to: UserStatus) -> AppResult<Vec<UserId>> {
        let mut state = self.state();
        let mut moved = Vec::new();
        for id in ids {
            if let Some(status) = state.statuses.get_mut(id) {
                if *status == from {
                    *status = to;
                    moved.push(*id);
                }
            }
        }
        Ok(moved)
    }

    async fn set_user_status(&self, ids: &[UserId], to: UserStatus) -> AppResult<usize> {
        let mut state = self.state();
        for id in ids {
            state.statuses.insert(*id, to);
        }
        Ok(ids.len())
    }

    async fn user_profiles(&self, ids: &[UserId]) -> AppResult<Vec<UserProfile>> {
        Ok(self
            .state()
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| UserProfile {
                user_id: u.id,
                nickname: u.nickname.clone(),
                gender: u.gender,
            })
            .collect())
    }

    async fn upsert_matching_info(
        &self,
        ids: &[UserId],
        group_id: GroupId,
        confirmation_deadline: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut state = self.state();
        for id in ids {
            state.matching_info.insert(*id, (group_id, confirmation_deadline));
        }
        Ok(())
    }

    async fn dining_history_groups(&self, ids: &[UserId]) -> AppResult<Vec<Vec<UserId>>> {
        Ok(self
            .state()
            .history
            .iter()
            .filter(|h| h.user_ids.iter().any(|u| ids.contains(u)))
            .map(|h| h.user_ids.clone())
            .collect())
    }

    async fn create_group(&self, group: &NewGroup, now: DateTime<Utc>) -> AppResult<GroupId> {
        let id = Uuid::new_v4();
        self.state().groups.insert(
            id,
            MatchingGroup {
                id,
                user_ids: group.user_ids.clone(),
                male_count: group.male_count,
                female_count: group.female_count,
                is_complete: group.is_complete(),
                school_only: group.school_only,
                status: GroupStatus::WaitingRestaurant,
                created_at: now,
            },
        );
        Ok(id)
    }

    async fn delete_groups(&self, ids: &[GroupId]) -> AppResult<usize> {
        let mut state = self.state();
        Ok(ids.iter().filter(|id| state.groups.remove(*id).is_some()).count())
    }

    async fn load_group(&self, id: GroupId) -> AppResult<Option<MatchingGroup>> {
        Ok(self.state().groups.get(&id).cloned())
    }

    async fn groups_with_status(&self, status: GroupStatus) -> AppResult<Vec<MatchingGroup>> {
        Ok(self
            .state()
            .groups
            .values()
            .filter(|g| g.status == status)
            .cloned()
            .collect())
    }

    async fn group_for_user(&self, user_id: UserId) -> AppResult<Option<MatchingGroup>> {
        let state = self.state();
        Ok(state
            .matching_info
            .get(&user_id)
            .and_then(|(group_id, _)| state.groups.get(group_id))
            .cloned())
    }

    async fn transition_group(&self, id: GroupId, from: GroupStatus, to: GroupStatus) -> AppResult<bool> {
        let mut state = self.state();
        match state.groups.get_mut(&id) {
            Some(group) if group.status == from => {
                group.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>> {
        let mut restaurants = self.state().restaurants.clone();
        restaurants.sort_by_key(|r| r.id);
        Ok(restaurants)
    }

    async fn load_restaurant(&self, id: RestaurantId) -> AppResult<Option<Restaurant>> {
        Ok(self.state().restaurants.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_seed_votes(
        &self,
        group_id: GroupId,
        restaurant_ids: &[RestaurantId],
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut state = self.state();
        for restaurant_id in restaurant_ids {
            state.votes.push(RestaurantVote {
                id: Uuid::new_v4(),
                group_id,
                restaurant_id: *restaurant_id,
                user_id: None,
                is_system_recommendation: true,
                created_at: now,
            });
        }
        Ok(restaurant_ids.len())
    }

    async fn insert_user_vote(
        &self,
        group_id: GroupId,
        user_id: UserId,
        restaurant_id: RestaurantId,
        now: DateTime<Utc>,
    ) -> AppResult<(RestaurantVote, bool)> {
        let mut state = self.state();
        if let Some(existing) = state
            .votes
            .iter()
            .find(|v| v.group_id == group_id && v.user_id == Some(user_id))
        {
            return Ok((existing.clone(), false));
        }
        let vote = RestaurantVote {
            id: Uuid::new_v4(),
            group_id,
            restaurant_id,
            user_id: Some(user_id),
            is_system_recommendation: false,
            created_at: now,
        };
        state.votes.push(vote.clone());
        Ok((vote, true))
    }

    async fn load_votes(&self, group_id: GroupId) -> AppResult<Vec<RestaurantVote>> {
        Ok(self
            .state()
            .votes
            .iter()
            .filter(|v| v.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn load_group_and_votes(&self, group_id: GroupId) -> AppResult<Option<GroupVotes>> {
        let state = self.state();
        let Some(group) = state.groups.get(&group_id).cloned() else {
            return Ok(None);
        };
        let votes: Vec<RestaurantVote> = state
            .votes
            .iter()
            .filter(|v| v.group_id == group_id)
            .cloned()
            .collect();
        let voted_user_ids = votes.iter().filter_map(|v| v.user_id).collect();
        Ok(Some(GroupVotes {
            group,
            voted_user_ids,
            votes,
        }))
    }

    async fn create_event(&self, event: &NewDiningEvent) -> AppResult<(DiningEvent, bool)> {
        let mut state = self.state();
        if let Some(existing) = state.events.values().find(|e| e.group_id == event.group_id) {
            return Ok((existing.clone(), false));
        }
        let created = DiningEvent {
            id: Uuid::new_v4(),
            group_id: event.group_id,
            restaurant_id: event.restaurant_id,
            candidate_restaurant_ids: event.candidate_restaurant_ids.clone(),
            name: event.name.clone(),
            date: event.date,
            status: EventStatus::PendingConfirmation,
            description: event.description.clone(),
            reservation_name: None,
            reservation_phone: None,
            attendee_count: event.attendee_count,
            status_change_time: event.created_at,
            created_at: event.created_at,
            updated_at: event.created_at,
        };
        state.events.insert(created.id, created.clone());
        Ok((created, true))
    }

    async fn load_event(&self, id: EventId) -> AppResult<Option<DiningEvent>> {
        Ok(self.event(id))
    }

    async fn event_for_group(&self, group_id: GroupId) -> AppResult<Option<DiningEvent>> {
        Ok(self
            .state()
            .events
            .values()
            .find(|e| e.group_id == group_id)
            .cloned())
    }

    async fn update_event(
        &self,
        id: EventId,
        patch: &EventPatch,
        only_if_status: Option<EventStatus>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DiningEvent>> {
        let mut state = self.state();
        let Some(event) = state.events.get_mut(&id) else {
            return Ok(None);
        };
        if !guarded(event.status, only_if_status) {
            return Ok(None);
        }
        if let Some(restaurant_id) = patch.restaurant_id {
            event.restaurant_id = restaurant_id;
        }
        if let Some(candidates) = &patch.candidate_restaurant_ids {
            event.candidate_restaurant_ids = candidates.clone();
        }
        if let Some(status) = patch.status {
            event.status = status;
        }
        if let Some(description) = &patch.description {
            event.description = description.clone();
        }
        if let Some(name) = &patch.reservation_name {
            event.reservation_name = Some(name.clone());
        }
        if let Some(phone) = &patch.reservation_phone {
            event.reservation_phone = Some(phone.clone());
        }
        if let Some(at) = patch.status_change_time {
            event.status_change_time = at;
        }
        event.updated_at = now;
        Ok(Some(event.clone()))
    }

    async fn events_with_status(&self, statuses: &[EventStatus]) -> AppResult<Vec<DiningEvent>> {
        let mut events: Vec<DiningEvent> = self
            .state()
            .events
            .values()
            .filter(|e| statuses.contains(&e.status))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn rating_session_for(&self, event_id: EventId, user_id: UserId) -> AppResult<Option<RatingSession>> {
        Ok(self
            .state()
            .sessions
            .values()
            .find(|s| s.event_id == event_id && s.from_user_id == user_id)
            .cloned())
    }

    async fn rating_session_by_token(&self, token: &str) -> AppResult<Option<RatingSession>> {
        Ok(self.state().sessions.get(token).cloned())
    }

    async fn save_rating_session(&self, session: &RatingSession, _now: DateTime<Utc>) -> AppResult<RatingSession> {
        let mut state = self.state();
        if let Some(existing) = state
            .sessions
            .values()
            .find(|s| s.event_id == session.event_id && s.from_user_id == session.from_user_id)
        {
            return Ok(existing.clone());
        }
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(session.clone())
    }

    async fn extend_rating_session(&self, token: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        if let Some(session) = self.state().sessions.get_mut(token) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    async fn delete_rating_session(&self, token: &str) -> AppResult<bool> {
        Ok(self.state().sessions.remove(token).is_some())
    }

    async fn upsert_ratings(&self, ratings: &[UserRating]) -> AppResult<usize> {
        let mut state = self.state();
        for rating in ratings {
            state.ratings.insert(
                (rating.event_id, rating.from_user_id, rating.to_user_id),
                rating.clone(),
            );
        }
        Ok(ratings.len())
    }

    async fn archive_cycle(&self, entries: &[ArchiveEntry], _now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.state();
        for entry in entries {
            if !state
                .history
                .iter()
                .any(|h| h.original_event_id == entry.history.original_event_id)
            {
                state.history.push(entry.history.clone());
            }
            for member in &entry.member_ids {
                if let Some(status) = state.statuses.get_mut(member) {
                    if *status == UserStatus::Rating {
                        *status = UserStatus::Booking;
                    }
                }
            }
            state.sessions.retain(|_, s| s.event_id != entry.event_id);
            state.votes.retain(|v| v.group_id != entry.group_id);
            state.matching_info.retain(|_, (group_id, _)| *group_id != entry.group_id);
            state.chat_messages.retain(|(_, event_id)| *event_id != entry.event_id);
            state.events.remove(&entry.event_id);
            state.groups.remove(&entry.group_id);
        }
        Ok(entries.len())
    }

    async fn latest_schedule_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.state().schedule.iter().map(|r| r.scheduled_time).max())
    }

    async fn upsert_schedule_rows(&self, rows: &[(TaskType, DateTime<Utc>)], _now: DateTime<Utc>) -> AppResult<usize> {
        let mut state = self.state();
        let mut inserted = 0;
        for (task_type, scheduled_time) in rows {
            let exists = state
                .schedule
                .iter()
                .any(|r| r.task_type == *task_type && r.scheduled_time == *scheduled_time);
            if !exists {
                state.schedule.push(ScheduleRow {
                    id: Uuid::new_v4(),
                    task_type: *task_type,
                    scheduled_time: *scheduled_time,
                    status: TaskStatus::Pending,
                    error_message: None,
                });
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn load_due_schedule_rows(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduleRow>> {
        let mut due: Vec<ScheduleRow> = self
            .state()
            .schedule
            .iter()
            .filter(|r| r.status == TaskStatus::Pending && r.scheduled_time <= now)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.scheduled_time);
        Ok(due)
    }

    async fn mark_row_done(&self, id: Uuid, _now: DateTime<Utc>) -> AppResult<()> {
        if let Some(row) = self.state().schedule.iter_mut().find(|r| r.id == id) {
            row.status = TaskStatus::Done;
            row.error_message = None;
        }
        Ok(())
    }

    async fn mark_row_failed(&self, id: Uuid, reason: &str, _now: DateTime<Utc>) -> AppResult<()> {
        if let Some(row) = self.state().schedule.iter_mut().find(|r| r.id == id) {
            row.status = TaskStatus::Failed;
            row.error_message = Some(reason.to_string());
        }
        Ok(())
    }

    async fn insert_notification(&self, notification: &NewNotification, _now: DateTime<Utc>) -> AppResult<()> {
        self.state().notifications.push(notification.clone());
        Ok(())
    }

    async fn device_tokens(&self, user_id: UserId) -> AppResult<Vec<String>> {
        Ok(self
            .state()
            .device_tokens
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
