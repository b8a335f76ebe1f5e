//! Persistence port. Every state transition the core makes goes through a
//! status-guarded method here, so retried batches are safe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tuckin_shared::AppResult;
use uuid::Uuid;

use crate::domain::{
    ArchiveEntry, DiningEvent, EventId, EventPatch, EventStatus, GroupId, GroupStatus,
    GroupVotes, MatchingGroup, NewDiningEvent, NewGroup, NewNotification,
    RatingSession, Restaurant, RestaurantId, RestaurantVote, ScheduleRow, TaskType, UserId,
    UserProfile, UserRating, UserStatus, WaitingPool,
};

#[cfg(test)]
pub mod memory;
pub mod pg;

pub use pg::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    // --- users ---

    /// Snapshot of every user in `waiting_matching`, with profile, personality
    /// and food preferences. Users missing a gender or personality land in
    /// `incomplete`.
    async fn waiting_users(&self) -> AppResult<WaitingPool>;

    async fn users_with_status(&self, statuses: &[UserStatus]) -> AppResult<Vec<UserId>>;

    async fn user_status(&self, user_id: UserId) -> AppResult<Option<UserStatus>>;

    /// Conditional update; only rows currently in `from` move. Returns the
    /// ids that moved.
    async fn transition_users(&self, ids: &[UserId], from: UserStatus, to: UserStatus) -> AppResult<Vec<UserId>>;

    /// Unconditional upsert of the status row.
    async fn set_user_status(&self, ids: &[UserId], to: UserStatus) -> AppResult<usize>;

    async fn user_profiles(&self, ids: &[UserId]) -> AppResult<Vec<UserProfile>>;

    async fn upsert_matching_info(
        &self,
        ids: &[UserId],
        group_id: GroupId,
        confirmation_deadline: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Member lists of every archived dinner that included any of `ids`.
    async fn dining_history_groups(&self, ids: &[UserId]) -> AppResult<Vec<Vec<UserId>>>;

    // --- groups ---

    async fn create_group(&self, group: &NewGroup, now: DateTime<Utc>) -> AppResult<GroupId>;

    async fn delete_groups(&self, ids: &[GroupId]) -> AppResult<usize>;

    async fn load_group(&self, id: GroupId) -> AppResult<Option<MatchingGroup>>;

    async fn groups_with_status(&self, status: GroupStatus) -> AppResult<Vec<MatchingGroup>>;

    /// The group the user is currently matched into, via the matching info row.
    async fn group_for_user(&self, user_id: UserId) -> AppResult<Option<MatchingGroup>>;

    async fn transition_group(&self, id: GroupId, from: GroupStatus, to: GroupStatus) -> AppResult<bool>;

    // --- restaurants and votes ---

    async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>>;

    async fn load_restaurant(&self, id: RestaurantId) -> AppResult<Option<Restaurant>>;

    async fn insert_seed_votes(
        &self,
        group_id: GroupId,
        restaurant_ids: &[RestaurantId],
        now: DateTime<Utc>,
    ) -> AppResult<usize>;

    /// Idempotent per (group, user): returns the existing row and `false` if
    /// the user already voted.
    async fn insert_user_vote(
        &self,
        group_id: GroupId,
        user_id: UserId,
        restaurant_id: RestaurantId,
        now: DateTime<Utc>,
    ) -> AppResult<(RestaurantVote, bool)>;

    async fn load_votes(&self, group_id: GroupId) -> AppResult<Vec<RestaurantVote>>;

    async fn load_group_and_votes(&self, group_id: GroupId) -> AppResult<Option<GroupVotes>>;

    // --- dining events ---

    /// Insert-once per group: a second call returns the existing event and `false`.
    async fn create_event(&self, event: &NewDiningEvent) -> AppResult<(DiningEvent, bool)>;

    async fn load_event(&self, id: EventId) -> AppResult<Option<DiningEvent>>;

    async fn event_for_group(&self, group_id: GroupId) -> AppResult<Option<DiningEvent>>;

    /// Applies `patch` only while the event is in `only_if_status` (when given).
    /// Returns the updated event, or `None` when the guard did not match.
    async fn update_event(
        &self,
        id: EventId,
        patch: &EventPatch,
        only_if_status: Option<EventStatus>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DiningEvent>>;

    async fn events_with_status(&self, statuses: &[EventStatus]) -> AppResult<Vec<DiningEvent>>;

    // --- ratings ---

    async fn rating_session_for(&self, event_id: EventId, user_id: UserId) -> AppResult<Option<RatingSession>>;

    async fn rating_session_by_token(&self, token: &str) -> AppResult<Option<RatingSession>>;

    /// Insert-once per (event, user). Returns whichever session is stored.
    async fn save_rating_session(&self, session: &RatingSession, now: DateTime<Utc>) -> AppResult<RatingSession>;

    async fn extend_rating_session(&self, token: &str, expires_at: DateTime<Utc>) -> AppResult<()>;

    async fn delete_rating_session(&self, token: &str) -> AppResult<bool>;

    async fn upsert_ratings(&self, ratings: &[UserRating]) -> AppResult<usize>;

    // --- archive ---

    /// One transaction: history rows, cascade deletes in dependency order,
    /// then `rating -> booking` for the members.
    async fn archive_cycle(&self, entries: &[ArchiveEntry], now: DateTime<Utc>) -> AppResult<usize>;

    // --- schedule ---

    async fn latest_schedule_time(&self) -> AppResult<Option<DateTime<Utc>>>;

    /// Insert, ignoring rows whose (task_type, scheduled_time) already exists.
    async fn upsert_schedule_rows(&self, rows: &[(TaskType, DateTime<Utc>)], now: DateTime<Utc>) -> AppResult<usize>;

    /// Pending rows at or before `now`, oldest first.
    async fn load_due_schedule_rows(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduleRow>>;

    async fn mark_row_done(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()>;

    async fn mark_row_failed(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> AppResult<()>;

    // --- notifications ---

    async fn insert_notification(&self, notification: &NewNotification, now: DateTime<Utc>) -> AppResult<()>;

    async fn device_tokens(&self, user_id: UserId) -> AppResult<Vec<String>>;
}
