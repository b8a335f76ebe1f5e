//! Anonymous peer ratings. A user sees their tablemates only by position;
//! which position maps to which user stays in the session row.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tuckin_shared::{AppError, AppResult, ErrorCode};

use crate::calendar::Clock;
use crate::domain::{DiningEvent, EventId, EventStatus, RatingPeer, RatingSession, RatingType, UserId, UserRating};
use crate::random::SharedRng;
use crate::store::Store;

const AVATAR_COUNT: usize = 6;

pub fn session_ttl() -> Duration {
    Duration::hours(24)
}

/// What the client gets: a token and the shuffled peers, never user ids.
#[derive(Debug, Clone, Serialize)]
pub struct RatingForm {
    pub session_token: String,
    pub dining_event_id: EventId,
    pub user_sequence: Vec<RatingPeer>,
    pub expires_at: DateTime<Utc>,
}

impl From<RatingSession> for RatingForm {
    fn from(session: RatingSession) -> Self {
        Self {
            session_token: session.token,
            dining_event_id: session.event_id,
            user_sequence: session.user_sequence,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingInput {
    pub index: usize,
    pub rating_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub recorded: usize,
    pub ignored: usize,
}

/// Bearer secret for the session, so it comes from the OS and never from the
/// seedable shared generator.
fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub struct RatingCollector {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    rng: Arc<SharedRng>,
}

impl RatingCollector {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, rng: Arc<SharedRng>) -> Self {
        Self { store, clock, rng }
    }

    async fn completed_event(&self, event_id: EventId) -> AppResult<DiningEvent> {
        let event = self
            .store
            .load_event(event_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::EventNotFound, "dining event not found"))?;
        if event.status != EventStatus::Completed {
            return Err(AppError::new(ErrorCode::InvalidEventStatus, "rating opens after the dinner"));
        }
        Ok(event)
    }

    /// Returns the caller's open session for the event, extending it, or
    /// mints a new one.
    pub async fn get_form(&self, event_id: EventId, caller: UserId) -> AppResult<RatingForm> {
        let event = self.completed_event(event_id).await?;
        let group = self
            .store
            .load_group(event.group_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound, "dining group not found"))?;
        if !group.has_member(caller) {
            return Err(AppError::new(ErrorCode::NotGroupMember, "not a member of this dinner"));
        }

        let now = self.clock.now();
        let expires_at = now + session_ttl();
        if let Some(mut session) = self.store.rating_session_for(event_id, caller).await? {
            self.store.extend_rating_session(&session.token, expires_at).await?;
            session.expires_at = expires_at;
            return Ok(session.into());
        }

        let mut peers: Vec<UserId> = group.user_ids.iter().copied().filter(|id| *id != caller).collect();
        let mut rng = self.rng.fork();
        peers.shuffle(&mut rng);

        let profiles: BTreeMap<UserId, _> = self
            .store
            .user_profiles(&peers)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect();

        let mut user_sequence = Vec::with_capacity(peers.len());
        let mut user_mapping = BTreeMap::new();
        for (index, peer) in peers.iter().enumerate() {
            let profile = profiles.get(peer);
            user_sequence.push(RatingPeer {
                index,
                nickname: profile.map(|p| p.nickname.clone()).unwrap_or_default(),
                gender: profile.and_then(|p| p.gender),
                avatar_index: index % AVATAR_COUNT + 1,
            });
            user_mapping.insert(index.to_string(), *peer);
        }

        let session = RatingSession {
            token: new_token(),
            event_id,
            from_user_id: caller,
            user_sequence,
            user_mapping,
            expires_at,
        };
        // A concurrent request may have stored its own session first.
        let stored = self.store.save_rating_session(&session, now).await?;
        tracing::info!(event_id = %event_id, peers = stored.user_sequence.len(), "rating session opened");
        Ok(stored.into())
    }

    pub async fn submit(&self, token: &str, caller: UserId, ratings: &[RatingInput]) -> AppResult<SubmitReport> {
        let session = self
            .store
            .rating_session_by_token(token)
            .await?
            .filter(|s| s.from_user_id == caller)
            .ok_or_else(|| AppError::new(ErrorCode::RatingSessionInvalid, "invalid rating session"))?;
        let now = self.clock.now();
        if session.expires_at <= now {
            return Err(AppError::new(ErrorCode::RatingSessionExpired, "rating session has expired"));
        }
        self.completed_event(session.event_id).await?;

        let mut rated: HashSet<UserId> = HashSet::new();
        let mut rows = Vec::with_capacity(ratings.len());
        for input in ratings {
            let Ok(rating_type) = input.rating_type.parse::<RatingType>() else {
                continue;
            };
            let Some(to_user_id) = session.user_mapping.get(&input.index.to_string()) else {
                continue;
            };
            if !rated.insert(*to_user_id) {
                continue;
            }
            rows.push(UserRating {
                event_id: session.event_id,
                from_user_id: caller,
                to_user_id: *to_user_id,
                rating_type,
                updated_at: now,
            });
        }

        let recorded = self.store.upsert_ratings(&rows).await?;
        self.store.delete_rating_session(token).await?;
        tracing::info!(event_id = %session.event_id, recorded, "ratings submitted");
        Ok(SubmitReport {
            recorded,
            ignored: ratings.len() - rows.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventPatch, Gender, NewDiningEvent, NewGroup, Personality, UserStatus};
    use crate::store::memory::MemoryStore;
    use crate::testing::{fixed_clock, pool_user, taipei, ManualClock};
    use uuid::Uuid;

    async fn completed_dinner(store: &MemoryStore, clock: &ManualClock, size: usize) -> (EventId, Vec<UserId>) {
        let users: Vec<_> = (0..size)
            .map(|i| pool_user(if i % 2 == 0 { Gender::Male } else { Gender::Female }, Personality::Analytical, false))
            .collect();
        for user in &users {
            store.add_pool_user(user, UserStatus::Rating);
        }
        let members: Vec<UserId> = users.iter().map(|u| u.id).collect();
        let group_id = store
            .create_group(
                &NewGroup { user_ids: members.clone(), male_count: 2, female_count: 1, school_only: false },
                clock.now(),
            )
            .await
            .unwrap();
        let (event, _) = store
            .create_event(&NewDiningEvent {
                group_id,
                restaurant_id: Uuid::new_v4(),
                candidate_restaurant_ids: vec![],
                name: "dinner".into(),
                date: taipei(2025, 1, 9, 18, 0),
                description: None,
                attendee_count: size as i32,
                created_at: clock.now(),
            })
            .await
            .unwrap();
        store
            .update_event(event.id, &EventPatch::status(EventStatus::Completed, clock.now()), None, clock.now())
            .await
            .unwrap();
        (event.id, members)
    }

    fn collector(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> RatingCollector {
        RatingCollector::new(store, clock, Arc::new(SharedRng::seeded(8)))
    }

    #[test]
    fn tokens_are_url_safe() {
        let token = new_token();
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn identically_seeded_collectors_mint_different_tokens() {
        let store = Arc::new(MemoryStore::new());
        let clock = fixed_clock();
        let (first, a) = completed_dinner(&store, &clock, 3).await;
        let (second, b) = completed_dinner(&store, &clock, 3).await;

        let one = collector(store.clone(), clock.clone()).get_form(first, a[0]).await.unwrap();
        let two = collector(store.clone(), clock.clone()).get_form(second, b[0]).await.unwrap();
        assert_ne!(one.session_token, two.session_token);

        let minted: HashSet<String> = (0..64).map(|_| new_token()).collect();
        assert_eq!(minted.len(), 64);
    }

    #[tokio::test]
    async fn form_hides_user_ids_and_is_reused() {
        let store = Arc::new(MemoryStore::new());
        let clock = fixed_clock();
        let (event_id, members) = completed_dinner(&store, &clock, 4).await;
        let ratings = collector(store.clone(), clock.clone());

        let form = ratings.get_form(event_id, members[0]).await.unwrap();
        assert_eq!(form.user_sequence.len(), 3);
        let indices: Vec<usize> = form.user_sequence.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        let avatars: Vec<usize> = form.user_sequence.iter().map(|p| p.avatar_index).collect();
        assert_eq!(avatars, vec![1, 2, 3]);

        let body = serde_json::to_string(&form).unwrap();
        for member in &members {
            assert!(!body.contains(&member.to_string()));
        }
        assert!(!body.contains("user_id"));

        clock.advance(Duration::hours(3));
        let again = ratings.get_form(event_id, members[0]).await.unwrap();
        assert_eq!(again.session_token, form.session_token);
        assert!(again.expires_at > form.expires_at);
    }

    #[tokio::test]
    async fn submit_maps_positions_and_closes_the_session() {
        let store = Arc::new(MemoryStore::new());
        let clock = fixed_clock();
        let (event_id, members) = completed_dinner(&store, &clock, 3).await;
        let ratings = collector(store.clone(), clock.clone());
        let form = ratings.get_form(event_id, members[0]).await.unwrap();

        let mapping = store.state().sessions[&form.session_token].user_mapping.clone();
        let input = vec![
            RatingInput { index: 0, rating_type: "like".into() },
            RatingInput { index: 1, rating_type: "no_show".into() },
            RatingInput { index: 1, rating_type: "like".into() },
            RatingInput { index: 7, rating_type: "like".into() },
            RatingInput { index: 0, rating_type: "meh".into() },
        ];
        let report = ratings.submit(&form.session_token, members[0], &input).await.unwrap();
        assert_eq!(report.recorded, 2);
        assert_eq!(report.ignored, 3);

        let state = store.state();
        let to_first = state.ratings[&(event_id, members[0], mapping["0"])].rating_type;
        let to_second = state.ratings[&(event_id, members[0], mapping["1"])].rating_type;
        assert_eq!((to_first, to_second), (RatingType::Like, RatingType::NoShow));
        assert!(state.sessions.is_empty());
        drop(state);

        let err = ratings.submit(&form.session_token, members[0], &input).await.unwrap_err();
        assert!(err.is(ErrorCode::RatingSessionInvalid));
    }

    #[tokio::test]
    async fn sessions_belong_to_their_owner_and_expire() {
        let store = Arc::new(MemoryStore::new());
        let clock = fixed_clock();
        let (event_id, members) = completed_dinner(&store, &clock, 3).await;
        let ratings = collector(store.clone(), clock.clone());
        let form = ratings.get_form(event_id, members[0]).await.unwrap();

        let err = ratings.submit(&form.session_token, members[1], &[]).await.unwrap_err();
        assert!(err.is(ErrorCode::RatingSessionInvalid));

        clock.advance(Duration::hours(25));
        let err = ratings.submit(&form.session_token, members[0], &[]).await.unwrap_err();
        assert!(err.is(ErrorCode::RatingSessionExpired));
    }

    #[tokio::test]
    async fn only_completed_events_open_rating() {
        let store = Arc::new(MemoryStore::new());
        let clock = fixed_clock();
        let (event_id, members) = completed_dinner(&store, &clock, 3).await;
        store
            .update_event(event_id, &EventPatch::status(EventStatus::Confirmed, clock.now()), None, clock.now())
            .await
            .unwrap();

        let err = collector(store.clone(), clock.clone()).get_form(event_id, members[0]).await.unwrap_err();
        assert!(err.is(ErrorCode::InvalidEventStatus));

        store
            .update_event(event_id, &EventPatch::status(EventStatus::Completed, clock.now()), None, clock.now())
            .await
            .unwrap();
        let err = collector(store, clock).get_form(event_id, Uuid::new_v4()).await.unwrap_err();
        assert!(err.is(ErrorCode::NotGroupMember));
    }
}
