use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::max;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use tuckin_shared::clients::db::DbPool;
use tuckin_shared::{AppError, AppResult};
use uuid::Uuid;

use super::Store;
use crate::domain::{
    ArchiveEntry, DiningEvent, EventId, EventPatch, EventStatus, Gender, GroupId, GroupStatus,
    GroupVotes, MatchingGroup, NewDiningEvent, NewGroup, NewNotification, Personality, PoolUser,
    RatingPeer, RatingSession, Restaurant, RestaurantId, RestaurantVote, ScheduleRow, TaskStatus,
    TaskType, UserId, UserProfile, UserRating, UserStatus, WaitingPool,
};
use crate::models::{
    EventChangeset, EventRow, GroupRow, MatchingInfoRow, NewEventRow, NewGroupRow,
    NewHistoryRow, NewNotificationRow, NewScheduleRow, NewVoteRow, RatingSessionRow,
    RestaurantRow, ScheduleRowRecord, UserRatingRow, UserStatusRow, VoteRow,
};
use crate::schema::{
    chat_messages, dining_events, dining_history, matching_groups, rating_sessions,
    restaurant_votes, restaurants, schedule_table, user_device_tokens, user_food_preferences,
    user_matching_info, user_notifications, user_personality_results, user_profiles, user_ratings,
    user_status,
};

/// Diesel/r2d2 implementation of the store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

fn parse<T: FromStr<Err = String>>(raw: &str) -> AppResult<T> {
    raw.parse().map_err(|e: String| AppError::Internal(anyhow::anyhow!(e)))
}

fn status_texts<T: Copy>(values: &[T], as_str: fn(&T) -> &'static str) -> Vec<&'static str> {
    values.iter().map(as_str).collect()
}

impl TryFrom<GroupRow> for MatchingGroup {
    type Error = AppError;

    fn try_from(row: GroupRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            user_ids: row.user_ids,
            male_count: row.male_count,
            female_count: row.female_count,
            is_complete: row.is_complete,
            school_only: row.school_only,
            status: parse(&row.status)?,
            created_at: row.created_at,
        })
    }
}

impl From<RestaurantRow> for Restaurant {
    fn from(row: RestaurantRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            address: row.address,
            business_hours: row.business_hours,
        }
    }
}

impl From<VoteRow> for RestaurantVote {
    fn from(row: VoteRow) -> Self {
        Self {
            id: row.id,
            group_id: row.group_id,
            restaurant_id: row.restaurant_id,
            user_id: row.user_id,
            is_system_recommendation: row.is_system_recommendation,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<EventRow> for DiningEvent {
    type Error = AppError;

    fn try_from(row: EventRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            group_id: row.matching_group_id,
            restaurant_id: row.restaurant_id,
            candidate_restaurant_ids: row.candidate_restaurant_ids,
            name: row.name,
            date: row.date,
            status: parse(&row.status)?,
            description: row.description,
            reservation_name: row.reservation_name,
            reservation_phone: row.reservation_phone,
            attendee_count: row.attendee_count,
            status_change_time: row.status_change_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<RatingSessionRow> for RatingSession {
    type Error = AppError;

    fn try_from(row: RatingSessionRow) -> AppResult<Self> {
        let user_sequence: Vec<RatingPeer> = serde_json::from_value(row.user_sequence)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("decode user_sequence: {e}")))?;
        let user_mapping: BTreeMap<String, Uuid> = serde_json::from_value(row.user_mapping)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("decode user_mapping: {e}")))?;

        Ok(Self {
            token: row.session_token,
            event_id: row.dining_event_id,
            from_user_id: row.from_user_id,
            user_sequence,
            user_mapping,
            expires_at: row.expires_at,
        })
    }
}

impl TryFrom<ScheduleRowRecord> for ScheduleRow {
    type Error = AppError;

    fn try_from(row: ScheduleRowRecord) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            task_type: parse(&row.task_type)?,
            scheduled_time: row.scheduled_time,
            status: parse(&row.status)?,
            error_message: row.error_message,
        })
    }
}

fn changeset(patch: &EventPatch, now: DateTime<Utc>) -> EventChangeset {
    EventChangeset {
        restaurant_id: patch.restaurant_id,
        candidate_restaurant_ids: patch.candidate_restaurant_ids.clone(),
        status: patch.status.map(|s| s.as_str().to_string()),
        description: patch.description.clone(),
        reservation_name: patch.reservation_name.clone().map(Some),
        reservation_phone: patch.reservation_phone.clone().map(Some),
        status_change_time: patch.status_change_time,
        updated_at: Some(now),
    }
}

fn load_group_row(conn: &mut PgConnection, id: GroupId) -> QueryResult<Option<GroupRow>> {
    matching_groups::table.find(id).first::<GroupRow>(conn).optional()
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    async fn waiting_users(&self) -> AppResult<WaitingPool> {
        let mut conn = self.conn()?;

        let rows: Vec<(Uuid, Option<String>, Option<bool>, Option<String>)> = user_status::table
            .left_join(user_profiles::table.on(user_profiles::user_id.eq(user_status::user_id)))
            .left_join(
                user_personality_results::table
                    .on(user_personality_results::user_id.eq(user_status::user_id)),
            )
            .filter(user_status::status.eq(UserStatus::WaitingMatching.as_str()))
            .select((
                user_status::user_id,
                user_profiles::gender.nullable(),
                user_profiles::prefer_school_only.nullable(),
                user_personality_results::personality_type.nullable(),
            ))
            .load(&mut conn)?;

        let ids: Vec<Uuid> = rows.iter().map(|(id, ..)| *id).collect();
        let mut preferences: HashMap<Uuid, Vec<i32>> = HashMap::new();
        let pairs: Vec<(Uuid, i32)> = user_food_preferences::table
            .filter(user_food_preferences::user_id.eq_any(&ids))
            .select((user_food_preferences::user_id, user_food_preferences::category_id))
            .load(&mut conn)?;
        for (user_id, category_id) in pairs {
            preferences.entry(user_id).or_default().push(category_id);
        }

        let mut pool = WaitingPool::default();
        for (id, gender, prefer_school_only, personality) in rows {
            let gender = gender.as_deref().and_then(|g| Gender::from_str(g).ok());
            let personality = personality.as_deref().and_then(|p| Personality::from_str(p).ok());
            match (gender, personality) {
                (Some(gender), Some(personality)) => pool.users.push(PoolUser {
                    id,
                    gender,
                    personality,
                    prefer_school_only: prefer_school_only.unwrap_or(false),
                    food_preferences: preferences.remove(&id).unwrap_or_default(),
                }),
                _ => {
                    tracing::warn!(user_id = %id, "waiting user without gender or personality");
                    pool.incomplete.push(id);
                }
            }
        }
        Ok(pool)
    }

    async fn users_with_status(&self, statuses: &[UserStatus]) -> AppResult<Vec<UserId>> {
        let mut conn = self.conn()?;
        let ids = user_status::table
            .filter(user_status::status.eq_any(status_texts(statuses, UserStatus::as_str)))
            .select(user_status::user_id)
            .load::<Uuid>(&mut conn)?;
        Ok(ids)
    }

    async fn user_status(&self, user_id: UserId) -> AppResult<Option<UserStatus>> {
        let mut conn = self.conn()?;
        let status = user_status::table
            .find(user_id)
            .select(user_status::status)
            .first::<String>(&mut conn)
            .optional()?;
        status.as_deref().map(parse).transpose()
    }

    async fn transition_users(&self, ids: &[UserId], from: UserStatus, to: UserStatus) -> AppResult<Vec<UserId>> {
        let mut conn = self.conn()?;
        let moved = diesel::update(
            user_status::table
                .filter(user_status::user_id.eq_any(ids))
                .filter(user_status::status.eq(from.as_str())),
        )
        .set((user_status::status.eq(to.as_str()), user_status::updated_at.eq(Utc::now())))
        .returning(user_status::user_id)
        .get_results::<Uuid>(&mut conn)?;
        Ok(moved)
    }

    async fn set_user_status(&self, ids: &[UserId], to: UserStatus) -> AppResult<usize> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let rows: Vec<UserStatusRow> = ids
            .iter()
            .map(|id| UserStatusRow {
                user_id: *id,
                status: to.as_str(),
                updated_at: now,
            })
            .collect();
        let written = diesel::insert_into(user_status::table)
            .values(&rows)
            .on_conflict(user_status::user_id)
            .do_update()
            .set((
                user_status::status.eq(excluded(user_status::status)),
                user_status::updated_at.eq(excluded(user_status::updated_at)),
            ))
            .execute(&mut conn)?;
        Ok(written)
    }

    async fn user_profiles(&self, ids: &[UserId]) -> AppResult<Vec<UserProfile>> {
        let mut conn = self.conn()?;
        let rows: Vec<(Uuid, String, Option<String>)> = user_profiles::table
            .filter(user_profiles::user_id.eq_any(ids))
            .select((user_profiles::user_id, user_profiles::nickname, user_profiles::gender))
            .load(&mut conn)?;
        Ok(rows
            .into_iter()
            .map(|(user_id, nickname, gender)| UserProfile {
                user_id,
                nickname,
                gender: gender.as_deref().and_then(|g| Gender::from_str(g).ok()),
            })
            .collect())
    }

    async fn upsert_matching_info(
        &self,
        ids: &[UserId],
        group_id: GroupId,
        confirmation_deadline: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let rows: Vec<MatchingInfoRow> = ids
            .iter()
            .map(|id| MatchingInfoRow {
                user_id: *id,
                matching_group_id: group_id,
                confirmation_deadline,
                updated_at: now,
            })
            .collect();
        diesel::insert_into(user_matching_info::table)
            .values(&rows)
            .on_conflict(user_matching_info::user_id)
            .do_update()
            .set((
                user_matching_info::matching_group_id.eq(excluded(user_matching_info::matching_group_id)),
                user_matching_info::confirmation_deadline
                    .eq(excluded(user_matching_info::confirmation_deadline)),
                user_matching_info::updated_at.eq(excluded(user_matching_info::updated_at)),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn dining_history_groups(&self, ids: &[UserId]) -> AppResult<Vec<Vec<UserId>>> {
        let mut conn = self.conn()?;
        let groups = dining_history::table
            .filter(dining_history::user_ids.overlaps_with(ids.to_vec()))
            .select(dining_history::user_ids)
            .load::<Vec<Uuid>>(&mut conn)?;
        Ok(groups)
    }

    async fn create_group(&self, group: &NewGroup, now: DateTime<Utc>) -> AppResult<GroupId> {
        let mut conn = self.conn()?;
        let row = NewGroupRow {
            id: Uuid::new_v4(),
            user_ids: &group.user_ids,
            male_count: group.male_count,
            female_count: group.female_count,
            is_complete: group.is_complete(),
            school_only: group.school_only,
            status: GroupStatus::WaitingRestaurant.as_str(),
            created_at: now,
            updated_at: now,
        };
        let id = diesel::insert_into(matching_groups::table)
            .values(&row)
            .returning(matching_groups::id)
            .get_result::<Uuid>(&mut conn)?;
        Ok(id)
    }

    async fn delete_groups(&self, ids: &[GroupId]) -> AppResult<usize> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(matching_groups::table.filter(matching_groups::id.eq_any(ids)))
            .execute(&mut conn)?;
        Ok(deleted)
    }

    async fn load_group(&self, id: GroupId) -> AppResult<Option<MatchingGroup>> {
        let mut conn = self.conn()?;
        load_group_row(&mut conn, id)?.map(MatchingGroup::try_from).transpose()
    }

    async fn groups_with_status(&self, status: GroupStatus) -> AppResult<Vec<MatchingGroup>> {
        let mut conn = self.conn()?;
        matching_groups::table
            .filter(matching_groups::status.eq(status.as_str()))
            .order(matching_groups::created_at.asc())
            .load::<GroupRow>(&mut conn)?
            .into_iter()
            .map(MatchingGroup::try_from)
            .collect()
    }

    async fn group_for_user(&self, user_id: UserId) -> AppResult<Option<MatchingGroup>> {
        let mut conn = self.conn()?;
        matching_groups::table
            .inner_join(
                user_matching_info::table
                    .on(user_matching_info::matching_group_id.eq(matching_groups::id)),
            )
            .filter(user_matching_info::user_id.eq(user_id))
            .select(matching_groups::all_columns)
            .first::<GroupRow>(&mut conn)
            .optional()?
            .map(MatchingGroup::try_from)
            .transpose()
    }

    async fn transition_group(&self, id: GroupId, from: GroupStatus, to: GroupStatus) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let moved = diesel::update(
            matching_groups::table
                .filter(matching_groups::id.eq(id))
                .filter(matching_groups::status.eq(from.as_str())),
        )
        .set((matching_groups::status.eq(to.as_str()), matching_groups::updated_at.eq(Utc::now())))
        .execute(&mut conn)?;
        Ok(moved > 0)
    }

    async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>> {
        let mut conn = self.conn()?;
        let rows = restaurants::table
            .order(restaurants::id.asc())
            .load::<RestaurantRow>(&mut conn)?;
        Ok(rows.into_iter().map(Restaurant::from).collect())
    }

    async fn load_restaurant(&self, id: RestaurantId) -> AppResult<Option<Restaurant>> {
        let mut conn = self.conn()?;
        let row = restaurants::table
            .find(id)
            .first::<RestaurantRow>(&mut conn)
            .optional()?;
        Ok(row.map(Restaurant::from))
    }

    async fn insert_seed_votes(
        &self,
        group_id: GroupId,
        restaurant_ids: &[RestaurantId],
        now: DateTime<Utc>,
    ) -> AppResult<usize> {
        let mut conn = self.conn()?;
        let rows: Vec<NewVoteRow> = restaurant_ids
            .iter()
            .map(|restaurant_id| NewVoteRow {
                id: Uuid::new_v4(),
                group_id,
                restaurant_id: *restaurant_id,
                user_id: None,
                is_system_recommendation: true,
                created_at: now,
            })
            .collect();
        let inserted = diesel::insert_into(restaurant_votes::table)
            .values(&rows)
            .execute(&mut conn)?;
        Ok(inserted)
    }

    async fn insert_user_vote(
        &self,
        group_id: GroupId,
        user_id: UserId,
        restaurant_id: RestaurantId,
        now: DateTime<Utc>,
    ) -> AppResult<(RestaurantVote, bool)> {
        let mut conn = self.conn()?;
        // The partial unique index on (group_id, user_id) settles concurrent
        // first votes; the loser reads the winner's row back.
        let inserted = diesel::insert_into(restaurant_votes::table)
            .values(&NewVoteRow {
                id: Uuid::new_v4(),
                group_id,
                restaurant_id,
                user_id: Some(user_id),
                is_system_recommendation: false,
                created_at: now,
            })
            .on_conflict_do_nothing()
            .get_result::<VoteRow>(&mut conn)
            .optional()?;
        if let Some(row) = inserted {
            return Ok((row.into(), true));
        }

        let existing = restaurant_votes::table
            .filter(restaurant_votes::group_id.eq(group_id))
            .filter(restaurant_votes::user_id.eq(user_id))
            .first::<VoteRow>(&mut conn)?;
        Ok((existing.into(), false))
    }

    async fn load_votes(&self, group_id: GroupId) -> AppResult<Vec<RestaurantVote>> {
        let mut conn = self.conn()?;
        let rows = restaurant_votes::table
            .filter(restaurant_votes::group_id.eq(group_id))
            .order(restaurant_votes::created_at.asc())
            .load::<VoteRow>(&mut conn)?;
        Ok(rows.into_iter().map(RestaurantVote::from).collect())
    }

    async fn load_group_and_votes(&self, group_id: GroupId) -> AppResult<Option<GroupVotes>> {
        let mut conn = self.conn()?;
        let loaded = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let Some(group) = load_group_row(conn, group_id)? else {
                return Ok(None);
            };
            let votes = restaurant_votes::table
                .filter(restaurant_votes::group_id.eq(group_id))
                .order(restaurant_votes::created_at.asc())
                .load::<VoteRow>(conn)?;
            Ok(Some((group, votes)))
        })?;

        let Some((group, votes)) = loaded else {
            return Ok(None);
        };
        let votes: Vec<RestaurantVote> = votes.into_iter().map(RestaurantVote::from).collect();
        let voted_user_ids = votes.iter().filter_map(|v| v.user_id).collect();
        Ok(Some(GroupVotes {
            group: group.try_into()?,
            voted_user_ids,
            votes,
        }))
    }

    async fn create_event(&self, event: &NewDiningEvent) -> AppResult<(DiningEvent, bool)> {
        let mut conn = self.conn()?;
        let row = NewEventRow {
            id: Uuid::new_v4(),
            matching_group_id: event.group_id,
            restaurant_id: event.restaurant_id,
            candidate_restaurant_ids: &event.candidate_restaurant_ids,
            name: &event.name,
            date: event.date,
            status: EventStatus::PendingConfirmation.as_str(),
            description: event.description.as_deref(),
            attendee_count: event.attendee_count,
            status_change_time: event.created_at,
            created_at: event.created_at,
            updated_at: event.created_at,
        };

        let inserted = diesel::insert_into(dining_events::table)
            .values(&row)
            .on_conflict(dining_events::matching_group_id)
            .do_nothing()
            .get_result::<EventRow>(&mut conn)
            .optional()?;

        match inserted {
            Some(row) => Ok((row.try_into()?, true)),
            None => {
                let existing = dining_events::table
                    .filter(dining_events::matching_group_id.eq(event.group_id))
                    .first::<EventRow>(&mut conn)?;
                Ok((existing.try_into()?, false))
            }
        }
    }

    async fn load_event(&self, id: EventId) -> AppResult<Option<DiningEvent>> {
        let mut conn = self.conn()?;
        dining_events::table
            .find(id)
            .first::<EventRow>(&mut conn)
            .optional()?
            .map(DiningEvent::try_from)
            .transpose()
    }

    async fn event_for_group(&self, group_id: GroupId) -> AppResult<Option<DiningEvent>> {
        let mut conn = self.conn()?;
        dining_events::table
            .filter(dining_events::matching_group_id.eq(group_id))
            .first::<EventRow>(&mut conn)
            .optional()?
            .map(DiningEvent::try_from)
            .transpose()
    }

    async fn update_event(
        &self,
        id: EventId,
        patch: &EventPatch,
        only_if_status: Option<EventStatus>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DiningEvent>> {
        let mut conn = self.conn()?;
        let changes = changeset(patch, now);
        let target = dining_events::table.filter(dining_events::id.eq(id));

        let row = match only_if_status {
            Some(status) => diesel::update(target.filter(dining_events::status.eq(status.as_str())))
                .set(&changes)
                .get_result::<EventRow>(&mut conn)
                .optional()?,
            None => diesel::update(target)
                .set(&changes)
                .get_result::<EventRow>(&mut conn)
                .optional()?,
        };
        row.map(DiningEvent::try_from).transpose()
    }

    async fn events_with_status(&self, statuses: &[EventStatus]) -> AppResult<Vec<DiningEvent>> {
        let mut conn = self.conn()?;
        dining_events::table
            .filter(dining_events::status.eq_any(status_texts(statuses, EventStatus::as_str)))
            .order(dining_events::date.asc())
            .load::<EventRow>(&mut conn)?
            .into_iter()
            .map(DiningEvent::try_from)
            .collect()
    }

    async fn rating_session_for(&self, event_id: EventId, user_id: UserId) -> AppResult<Option<RatingSession>> {
        let mut conn = self.conn()?;
        rating_sessions::table
            .filter(rating_sessions::dining_event_id.eq(event_id))
            .filter(rating_sessions::from_user_id.eq(user_id))
            .first::<RatingSessionRow>(&mut conn)
            .optional()?
            .map(RatingSession::try_from)
            .transpose()
    }

    async fn rating_session_by_token(&self, token: &str) -> AppResult<Option<RatingSession>> {
        let mut conn = self.conn()?;
        rating_sessions::table
            .find(token)
            .first::<RatingSessionRow>(&mut conn)
            .optional()?
            .map(RatingSession::try_from)
            .transpose()
    }

    async fn save_rating_session(&self, session: &RatingSession, now: DateTime<Utc>) -> AppResult<RatingSession> {
        let encode = |e: serde_json::Error| AppError::Internal(anyhow::anyhow!("encode rating session: {e}"));
        let row = RatingSessionRow {
            session_token: session.token.clone(),
            dining_event_id: session.event_id,
            from_user_id: session.from_user_id,
            user_sequence: serde_json::to_value(&session.user_sequence).map_err(encode)?,
            user_mapping: serde_json::to_value(&session.user_mapping).map_err(encode)?,
            expires_at: session.expires_at,
            created_at: now,
        };

        let mut conn = self.conn()?;
        diesel::insert_into(rating_sessions::table)
            .values(&row)
            .on_conflict((rating_sessions::dining_event_id, rating_sessions::from_user_id))
            .do_nothing()
            .execute(&mut conn)?;

        let stored = rating_sessions::table
            .filter(rating_sessions::dining_event_id.eq(session.event_id))
            .filter(rating_sessions::from_user_id.eq(session.from_user_id))
            .first::<RatingSessionRow>(&mut conn)?;
        stored.try_into()
    }

    async fn extend_rating_session(&self, token: &str, expires_at: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(rating_sessions::table.find(token))
            .set(rating_sessions::expires_at.eq(expires_at))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn delete_rating_session(&self, token: &str) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(rating_sessions::table.find(token)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    async fn upsert_ratings(&self, ratings: &[UserRating]) -> AppResult<usize> {
        if ratings.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let rows: Vec<UserRatingRow> = ratings
            .iter()
            .map(|r| UserRatingRow {
                dining_event_id: r.event_id,
                from_user_id: r.from_user_id,
                to_user_id: r.to_user_id,
                rating_type: r.rating_type.as_str(),
                updated_at: r.updated_at,
            })
            .collect();
        let written = diesel::insert_into(user_ratings::table)
            .values(&rows)
            .on_conflict((
                user_ratings::dining_event_id,
                user_ratings::from_user_id,
                user_ratings::to_user_id,
            ))
            .do_update()
            .set((
                user_ratings::rating_type.eq(excluded(user_ratings::rating_type)),
                user_ratings::updated_at.eq(excluded(user_ratings::updated_at)),
            ))
            .execute(&mut conn)?;
        Ok(written)
    }

    async fn archive_cycle(&self, entries: &[ArchiveEntry], now: DateTime<Utc>) -> AppResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let event_ids: Vec<Uuid> = entries.iter().map(|e| e.event_id).collect();
        let group_ids: Vec<Uuid> = entries.iter().map(|e| e.group_id).collect();
        let member_ids: Vec<Uuid> = entries.iter().flat_map(|e| e.member_ids.iter().copied()).collect();
        let history: Vec<NewHistoryRow> = entries
            .iter()
            .map(|e| NewHistoryRow {
                id: Uuid::new_v4(),
                original_event_id: e.history.original_event_id,
                matching_group_id: e.history.group_id,
                restaurant_id: e.history.restaurant_id,
                restaurant_name: &e.history.restaurant_name,
                event_name: &e.history.event_name,
                event_date: e.history.event_date,
                attendee_count: e.history.attendee_count,
                user_ids: &e.history.user_ids,
                school_only: e.history.school_only,
                created_at: now,
            })
            .collect();

        let mut conn = self.conn()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::insert_into(dining_history::table)
                .values(&history)
                .on_conflict(dining_history::original_event_id)
                .do_nothing()
                .execute(conn)?;

            diesel::update(
                user_status::table
                    .filter(user_status::user_id.eq_any(&member_ids))
                    .filter(user_status::status.eq(UserStatus::Rating.as_str())),
            )
            .set((
                user_status::status.eq(UserStatus::Booking.as_str()),
                user_status::updated_at.eq(now),
            ))
            .execute(conn)?;

            diesel::delete(rating_sessions::table.filter(rating_sessions::dining_event_id.eq_any(&event_ids)))
                .execute(conn)?;
            diesel::delete(restaurant_votes::table.filter(restaurant_votes::group_id.eq_any(&group_ids)))
                .execute(conn)?;
            diesel::delete(
                user_matching_info::table.filter(user_matching_info::matching_group_id.eq_any(&group_ids)),
            )
            .execute(conn)?;
            diesel::delete(chat_messages::table.filter(chat_messages::dining_event_id.eq_any(&event_ids)))
                .execute(conn)?;
            diesel::delete(dining_events::table.filter(dining_events::id.eq_any(&event_ids)))
                .execute(conn)?;
            diesel::delete(matching_groups::table.filter(matching_groups::id.eq_any(&group_ids)))
                .execute(conn)?;
            Ok(())
        })?;

        Ok(entries.len())
    }

    async fn latest_schedule_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        let mut conn = self.conn()?;
        let latest = schedule_table::table
            .select(max(schedule_table::scheduled_time))
            .first::<Option<DateTime<Utc>>>(&mut conn)?;
        Ok(latest)
    }

    async fn upsert_schedule_rows(&self, rows: &[(TaskType, DateTime<Utc>)], now: DateTime<Utc>) -> AppResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let values: Vec<NewScheduleRow> = rows
            .iter()
            .map(|(task_type, scheduled_time)| NewScheduleRow {
                id: Uuid::new_v4(),
                task_type: task_type.as_str(),
                scheduled_time: *scheduled_time,
                status: TaskStatus::Pending.as_str(),
                updated_at: now,
            })
            .collect();
        let inserted = diesel::insert_into(schedule_table::table)
            .values(&values)
            .on_conflict((schedule_table::task_type, schedule_table::scheduled_time))
            .do_nothing()
            .execute(&mut conn)?;
        Ok(inserted)
    }

    async fn load_due_schedule_rows(&self, now: DateTime<Utc>) -> AppResult<Vec<ScheduleRow>> {
        let mut conn = self.conn()?;
        schedule_table::table
            .filter(schedule_table::status.eq(TaskStatus::Pending.as_str()))
            .filter(schedule_table::scheduled_time.le(now))
            .order(schedule_table::scheduled_time.asc())
            .load::<ScheduleRowRecord>(&mut conn)?
            .into_iter()
            .map(ScheduleRow::try_from)
            .collect()
    }

    async fn mark_row_done(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schedule_table::table.find(id))
            .set((
                schedule_table::status.eq(TaskStatus::Done.as_str()),
                schedule_table::error_message.eq(None::<String>),
                schedule_table::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn mark_row_failed(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::update(schedule_table::table.find(id))
            .set((
                schedule_table::status.eq(TaskStatus::Failed.as_str()),
                schedule_table::error_message.eq(Some(reason)),
                schedule_table::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    async fn insert_notification(&self, notification: &NewNotification, now: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(user_notifications::table)
            .values(&NewNotificationRow {
                id: Uuid::new_v4(),
                user_id: notification.user_id,
                title: &notification.title,
                body: &notification.body,
                data: Some(notification.data.clone()),
                created_at: now,
            })
            .execute(&mut conn)?;
        Ok(())
    }

    async fn device_tokens(&self, user_id: UserId) -> AppResult<Vec<String>> {
        let mut conn = self.conn()?;
        let tokens = user_device_tokens::table
            .filter(user_device_tokens::user_id.eq(user_id))
            .select(user_device_tokens::token)
            .load::<String>(&mut conn)?;
        Ok(tokens)
    }
}
