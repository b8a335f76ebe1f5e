use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::{
    dining_events, dining_history, matching_groups, rating_sessions, restaurant_votes, restaurants,
    schedule_table, user_matching_info, user_notifications, user_ratings, user_status,
};

// --- Users ---

#[derive(Debug, Insertable)]
#[diesel(table_name = user_status)]
pub struct UserStatusRow<'a> {
    pub user_id: Uuid,
    pub status: &'a str,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_matching_info)]
pub struct MatchingInfoRow {
    pub user_id: Uuid,
    pub matching_group_id: Uuid,
    pub confirmation_deadline: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- MatchingGroup ---

#[derive(Debug, Queryable, Identifiable, Clone)]
#[diesel(table_name = matching_groups)]
pub struct GroupRow {
    pub id: Uuid,
    pub user_ids: Vec<Uuid>,
    pub male_count: i32,
    pub female_count: i32,
    pub is_complete: bool,
    pub school_only: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = matching_groups)]
pub struct NewGroupRow<'a> {
    pub id: Uuid,
    pub user_ids: &'a [Uuid],
    pub male_count: i32,
    pub female_count: i32,
    pub is_complete: bool,
    pub school_only: bool,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Restaurant ---

#[derive(Debug, Queryable, Identifiable, Clone)]
#[diesel(table_name = restaurants)]
pub struct RestaurantRow {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<i32>,
    pub address: Option<String>,
    pub business_hours: Option<String>,
}

// --- RestaurantVote ---

#[derive(Debug, Queryable, Identifiable, Clone)]
#[diesel(table_name = restaurant_votes)]
pub struct VoteRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_system_recommendation: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = restaurant_votes)]
pub struct NewVoteRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_system_recommendation: bool,
    pub created_at: DateTime<Utc>,
}

// --- DiningEvent ---

#[derive(Debug, Queryable, Identifiable, Clone)]
#[diesel(table_name = dining_events)]
pub struct EventRow {
    pub id: Uuid,
    pub matching_group_id: Uuid,
    pub restaurant_id: Uuid,
    pub candidate_restaurant_ids: Vec<Uuid>,
    pub name: String,
    pub date: DateTime<Utc>,
    pub status: String,
    pub description: Option<String>,
    pub reservation_name: Option<String>,
    pub reservation_phone: Option<String>,
    pub attendee_count: i32,
    pub status_change_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dining_events)]
pub struct NewEventRow<'a> {
    pub id: Uuid,
    pub matching_group_id: Uuid,
    pub restaurant_id: Uuid,
    pub candidate_restaurant_ids: &'a [Uuid],
    pub name: &'a str,
    pub date: DateTime<Utc>,
    pub status: &'a str,
    pub description: Option<&'a str>,
    pub attendee_count: i32,
    pub status_change_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `None` fields are left untouched by diesel.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = dining_events)]
pub struct EventChangeset {
    pub restaurant_id: Option<Uuid>,
    pub candidate_restaurant_ids: Option<Vec<Uuid>>,
    pub status: Option<String>,
    pub description: Option<Option<String>>,
    pub reservation_name: Option<Option<String>>,
    pub reservation_phone: Option<Option<String>>,
    pub status_change_time: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Ratings ---

#[derive(Debug, Queryable, Insertable, Clone)]
#[diesel(table_name = rating_sessions)]
pub struct RatingSessionRow {
    pub session_token: String,
    pub dining_event_id: Uuid,
    pub from_user_id: Uuid,
    pub user_sequence: serde_json::Value,
    pub user_mapping: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_ratings)]
pub struct UserRatingRow<'a> {
    pub dining_event_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub rating_type: &'a str,
    pub updated_at: DateTime<Utc>,
}

// --- History ---

#[derive(Debug, Insertable)]
#[diesel(table_name = dining_history)]
pub struct NewHistoryRow<'a> {
    pub id: Uuid,
    pub original_event_id: Uuid,
    pub matching_group_id: Uuid,
    pub restaurant_id: Uuid,
    pub restaurant_name: &'a str,
    pub event_name: &'a str,
    pub event_date: DateTime<Utc>,
    pub attendee_count: i32,
    pub user_ids: &'a [Uuid],
    pub school_only: bool,
    pub created_at: DateTime<Utc>,
}

// --- Schedule ---

#[derive(Debug, Queryable, Identifiable, Clone)]
#[diesel(table_name = schedule_table)]
pub struct ScheduleRowRecord {
    pub id: Uuid,
    pub task_type: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: String,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = schedule_table)]
pub struct NewScheduleRow<'a> {
    pub id: Uuid,
    pub task_type: &'a str,
    pub scheduled_time: DateTime<Utc>,
    pub status: &'a str,
    pub updated_at: DateTime<Utc>,
}

// --- Notifications ---

#[derive(Debug, Insertable)]
#[diesel(table_name = user_notifications)]
pub struct NewNotificationRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: &'a str,
    pub body: &'a str,
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
