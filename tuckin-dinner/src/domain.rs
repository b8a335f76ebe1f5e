use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type EventId = Uuid;
pub type RestaurantId = Uuid;
pub type CategoryId = i32;

/// Enums persisted as text columns. Serialises as the stored text.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("unknown {}: {s}", stringify!($name))),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

text_enum!(Gender {
    Male => "male",
    Female => "female",
});

text_enum!(
    /// The four personality families produced by the onboarding quiz.
    Personality {
        Analytical => "A",
        Functional => "F",
        Intuitive => "I",
        Individual => "P",
    }
);

text_enum!(
    /// Per-user position in the dinner cycle.
    UserStatus {
        Booking => "booking",
        WaitingMatching => "waiting_matching",
        MatchingFailed => "matching_failed",
        WaitingRestaurant => "waiting_restaurant",
        WaitingOtherUsers => "waiting_other_users",
        WaitingAttendance => "waiting_attendance",
        ConfirmationTimeout => "confirmation_timeout",
        LowAttendance => "low_attendance",
        Rating => "rating",
    }
);

text_enum!(GroupStatus {
    WaitingRestaurant => "waiting_restaurant",
    WaitingAttendance => "waiting_attendance",
});

text_enum!(EventStatus {
    PendingConfirmation => "pending_confirmation",
    Confirming => "confirming",
    Confirmed => "confirmed",
    Completed => "completed",
});

text_enum!(RatingType {
    Like => "like",
    Dislike => "dislike",
    NoShow => "no_show",
});

text_enum!(TaskType {
    ReminderBooking => "reminder_booking",
    Match => "match",
    RestaurantVoteEnd => "restaurant_vote_end",
    ReminderAttendance => "reminder_attendance",
    EventEnd => "event_end",
    RatingEnd => "rating_end",
});

text_enum!(TaskStatus {
    Pending => "pending",
    Done => "done",
    Failed => "failed",
});

/// A user currently in `waiting_matching`, with everything the group former
/// and restaurant seeder need.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolUser {
    pub id: UserId,
    pub gender: Gender,
    pub personality: Personality,
    pub prefer_school_only: bool,
    pub food_preferences: Vec<CategoryId>,
}

/// Everyone in `waiting_matching` at snapshot time. `incomplete` holds the
/// users whose profile lacks a gender or personality result; they can't be
/// placed and fail the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaitingPool {
    pub users: Vec<PoolUser>,
    pub incomplete: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingGroup {
    pub id: GroupId,
    pub user_ids: Vec<UserId>,
    pub male_count: i32,
    pub female_count: i32,
    pub is_complete: bool,
    pub school_only: bool,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
}

impl MatchingGroup {
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.user_ids.contains(&user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGroup {
    pub user_ids: Vec<UserId>,
    pub male_count: i32,
    pub female_count: i32,
    pub school_only: bool,
}

impl NewGroup {
    pub fn is_complete(&self) -> bool {
        self.user_ids.len() >= 4
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub address: Option<String>,
    pub business_hours: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestaurantVote {
    pub id: Uuid,
    pub group_id: GroupId,
    pub restaurant_id: RestaurantId,
    pub user_id: Option<UserId>,
    pub is_system_recommendation: bool,
    pub created_at: DateTime<Utc>,
}

/// Atomic snapshot of a group's membership and its votes.
#[derive(Debug, Clone)]
pub struct GroupVotes {
    pub group: MatchingGroup,
    pub voted_user_ids: Vec<UserId>,
    pub votes: Vec<RestaurantVote>,
}

impl GroupVotes {
    pub fn all_voted(&self) -> bool {
        self.group
            .user_ids
            .iter()
            .all(|member| self.voted_user_ids.contains(member))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiningEvent {
    pub id: EventId,
    pub group_id: GroupId,
    pub restaurant_id: RestaurantId,
    pub candidate_restaurant_ids: Vec<RestaurantId>,
    pub name: String,
    pub date: DateTime<Utc>,
    pub status: EventStatus,
    pub description: Option<String>,
    pub reservation_name: Option<String>,
    pub reservation_phone: Option<String>,
    pub attendee_count: i32,
    pub status_change_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDiningEvent {
    pub group_id: GroupId,
    pub restaurant_id: RestaurantId,
    pub candidate_restaurant_ids: Vec<RestaurantId>,
    pub name: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub attendee_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a dining event. `status_change_time` is set whenever the
/// status changes or the confirmation lock is refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub restaurant_id: Option<RestaurantId>,
    pub candidate_restaurant_ids: Option<Vec<RestaurantId>>,
    pub status: Option<EventStatus>,
    pub description: Option<Option<String>>,
    pub reservation_name: Option<String>,
    pub reservation_phone: Option<String>,
    pub status_change_time: Option<DateTime<Utc>>,
}

impl EventPatch {
    pub fn status(status: EventStatus, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            status_change_time: Some(now),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub nickname: String,
    pub gender: Option<Gender>,
}

/// One anonymised peer on a rating form. Never carries the peer's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPeer {
    pub index: usize,
    pub nickname: String,
    pub gender: Option<Gender>,
    pub avatar_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSession {
    pub token: String,
    pub event_id: EventId,
    pub from_user_id: UserId,
    pub user_sequence: Vec<RatingPeer>,
    /// Positional index (as text) to peer user id. Server-side only.
    pub user_mapping: BTreeMap<String, UserId>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRating {
    pub event_id: EventId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub rating_type: RatingType,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiningHistory {
    pub original_event_id: EventId,
    pub group_id: GroupId,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub event_name: String,
    pub event_date: DateTime<Utc>,
    pub attendee_count: i32,
    pub user_ids: Vec<UserId>,
    pub school_only: bool,
}

/// Everything the store needs to archive one finished cycle of one group.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub event_id: EventId,
    pub group_id: GroupId,
    pub member_ids: Vec<UserId>,
    pub history: DiningHistory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    pub id: Uuid,
    pub task_type: TaskType,
    pub scheduled_time: DateTime<Utc>,
    pub status: TaskStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_round_trip_through_storage_text() {
        for status in UserStatus::ALL {
            assert_eq!(status.as_str().parse::<UserStatus>().unwrap(), *status);
        }
        assert_eq!("P".parse::<Personality>().unwrap(), Personality::Individual);
        assert!("unknown".parse::<EventStatus>().is_err());
    }

    #[test]
    fn text_enums_serialise_as_stored_text() {
        let value = serde_json::to_value(EventStatus::PendingConfirmation).unwrap();
        assert_eq!(value, "pending_confirmation");

        let rating: RatingType = serde_json::from_value(serde_json::json!("no_show")).unwrap();
        assert_eq!(rating, RatingType::NoShow);
    }

    #[test]
    fn group_completeness_follows_size() {
        let group = NewGroup {
            user_ids: vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()],
            male_count: 1,
            female_count: 2,
            school_only: false,
        };
        assert!(!group.is_complete());
    }
}
