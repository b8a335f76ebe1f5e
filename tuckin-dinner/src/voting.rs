//! Restaurant voting per group and the hand-off to a dining event.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::json;
use tuckin_shared::{AppError, AppResult, ErrorCode};

use crate::calendar::{upcoming_dinner_instant, Clock};
use crate::domain::{
    DiningEvent, EventPatch, EventStatus, GroupId, GroupStatus, GroupVotes, MatchingGroup, NewDiningEvent,
    RestaurantId, RestaurantVote, UserId, UserStatus,
};
use crate::notifier::{NotificationKind, Notifier};
use crate::random::SharedRng;
use crate::store::Store;

/// Appended to the description of events finalised by the vote deadline.
/// Its presence means the members have not been told about the result yet.
pub const FORCED_MARKER: &str = " (投票時間已到自動選出)";

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub vote: RestaurantVote,
    pub all_voted: bool,
    pub event: Option<DiningEvent>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct VoteEndReport {
    pub finalized: usize,
    pub failed: usize,
    pub notified_events: usize,
}

/// Winner and runner-up list from the group's votes: most user votes wins,
/// ties go to the smallest restaurant id.
fn tally(votes: &[RestaurantVote]) -> (Option<RestaurantId>, Vec<RestaurantId>, Vec<RestaurantId>) {
    let mut counts: BTreeMap<RestaurantId, usize> = BTreeMap::new();
    let mut seeds: Vec<RestaurantId> = Vec::new();
    for vote in votes {
        if vote.user_id.is_some() {
            *counts.entry(vote.restaurant_id).or_default() += 1;
        } else if vote.is_system_recommendation && !seeds.contains(&vote.restaurant_id) {
            seeds.push(vote.restaurant_id);
        }
    }

    let mut ranked: Vec<(RestaurantId, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let voted: Vec<RestaurantId> = ranked.into_iter().map(|(id, _)| id).collect();
    (voted.first().copied(), voted, seeds)
}

fn candidate_list(winner: RestaurantId, voted: &[RestaurantId], seeds: &[RestaurantId]) -> Vec<RestaurantId> {
    let mut candidates: Vec<RestaurantId> = voted.iter().copied().filter(|id| *id != winner).collect();
    for seed in seeds {
        if *seed != winner && !candidates.contains(seed) {
            candidates.push(*seed);
        }
    }
    candidates
}

pub struct VoteCoordinator {
    store: Arc<dyn Store>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    rng: Arc<SharedRng>,
}

impl VoteCoordinator {
    pub fn new(store: Arc<dyn Store>, notifier: Notifier, clock: Arc<dyn Clock>, rng: Arc<SharedRng>) -> Self {
        Self { store, notifier, clock, rng }
    }

    pub async fn cast_vote(&self, restaurant_id: RestaurantId, user_id: UserId) -> AppResult<VoteOutcome> {
        if self.store.load_restaurant(restaurant_id).await?.is_none() {
            return Err(AppError::new(ErrorCode::RestaurantNotFound, "restaurant not found"));
        }
        let group = self
            .store
            .group_for_user(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound, "you are not in a dinner group"))?;
        if !group.has_member(user_id) {
            return Err(AppError::new(ErrorCode::NotGroupMember, "not a member of this group"));
        }
        if group.status != GroupStatus::WaitingRestaurant {
            return Err(AppError::new(ErrorCode::VotingClosed, "voting has ended for this group"));
        }

        let now = self.clock.now();
        let (vote, created) = self
            .store
            .insert_user_vote(group.id, user_id, restaurant_id, now)
            .await?;
        if !created && vote.restaurant_id != restaurant_id {
            return Err(AppError::with_details(
                ErrorCode::AlreadyVoted,
                "you have already voted",
                json!({ "restaurant_id": vote.restaurant_id }),
            ));
        }
        if created {
            self.store
                .transition_users(&[user_id], UserStatus::WaitingRestaurant, UserStatus::WaitingOtherUsers)
                .await?;
            tracing::info!(group_id = %group.id, user_id = %user_id, restaurant_id = %restaurant_id, "vote recorded");
        }

        let snapshot = self
            .store
            .load_group_and_votes(group.id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound, "group disappeared"))?;
        let all_voted = snapshot.all_voted();
        let event = if all_voted {
            Some(self.finalize_snapshot(snapshot, false).await?)
        } else {
            None
        };

        Ok(VoteOutcome { vote, all_voted, event })
    }

    /// Closes voting for a group and creates its dining event. Safe to call
    /// more than once; later calls return the event already created.
    pub async fn finalize(&self, group_id: GroupId, forced: bool) -> AppResult<DiningEvent> {
        let snapshot = self
            .store
            .load_group_and_votes(group_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::GroupNotFound, "group not found"))?;
        self.finalize_snapshot(snapshot, forced).await
    }

    async fn finalize_snapshot(&self, snapshot: GroupVotes, forced: bool) -> AppResult<DiningEvent> {
        let group = snapshot.group;
        // An earlier run may have created the event and stopped before the
        // transitions, so those are replayed either way.
        let (event, created) = match self.store.event_for_group(group.id).await? {
            Some(existing) => (existing, false),
            None => {
                let new_event = self.build_event(&group, &snapshot.votes, forced).await?;
                self.store.create_event(&new_event).await?
            }
        };

        self.store
            .transition_group(group.id, GroupStatus::WaitingRestaurant, GroupStatus::WaitingAttendance)
            .await?;
        self.store
            .set_user_status(&group.user_ids, UserStatus::WaitingAttendance)
            .await?;

        if created {
            tracing::info!(group_id = %group.id, event_id = %event.id, restaurant_id = %event.restaurant_id, forced, "dining event created");
            if !forced {
                self.announce(&event, &group.user_ids).await;
            }
        }
        Ok(event)
    }

    async fn build_event(
        &self,
        group: &MatchingGroup,
        votes: &[RestaurantVote],
        forced: bool,
    ) -> AppResult<NewDiningEvent> {
        let (top, voted, seeds) = tally(votes);
        let winner = match top {
            Some(winner) => winner,
            None => self.fallback_winner(&seeds).await?,
        };
        let name = self
            .store
            .load_restaurant(winner)
            .await?
            .map(|r| format!("{} 聚餐", r.name))
            .unwrap_or_else(|| "TuckIn 聚餐".to_string());

        let now = self.clock.now();
        Ok(NewDiningEvent {
            group_id: group.id,
            restaurant_id: winner,
            candidate_restaurant_ids: candidate_list(winner, &voted, &seeds),
            name,
            date: upcoming_dinner_instant(now)?,
            description: forced.then(|| FORCED_MARKER.to_string()),
            attendee_count: group.user_ids.len() as i32,
            created_at: now,
        })
    }

    async fn fallback_winner(&self, seeds: &[RestaurantId]) -> AppResult<RestaurantId> {
        if let Some(seed) = seeds.choose(&mut self.rng.fork()) {
            return Ok(*seed);
        }
        let all = self.store.list_restaurants().await?;
        all.choose(&mut self.rng.fork())
            .map(|r| r.id)
            .ok_or_else(|| AppError::new(ErrorCode::NoCandidates, "no restaurant to choose from"))
    }

    async fn announce(&self, event: &DiningEvent, members: &[UserId]) -> usize {
        self.notifier
            .notify_group(
                members,
                "餐廳已選定",
                &format!("{}，記得確認訂位喔！", event.name),
                NotificationKind::VoteResult.payload(json!({
                    "dining_event_id": event.id,
                    "matching_group_id": event.group_id,
                })),
            )
            .await
    }

    /// Deadline path: finalise every group still voting, then tell members of
    /// each auto-chosen event and clear its marker.
    pub async fn end_voting(&self) -> AppResult<VoteEndReport> {
        let mut report = VoteEndReport::default();
        for group in self.store.groups_with_status(GroupStatus::WaitingRestaurant).await? {
            match self.finalize(group.id, true).await {
                Ok(_) => report.finalized += 1,
                Err(e) if e.is(ErrorCode::NoCandidates) || e.is(ErrorCode::GroupNotFound) => {
                    tracing::warn!(group_id = %group.id, error = %e, "forced finalize skipped");
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        report.notified_events = self.notify_forced_events().await?;
        Ok(report)
    }

    pub async fn notify_forced_events(&self) -> AppResult<usize> {
        let now = self.clock.now();
        let pending = self
            .store
            .events_with_status(&[EventStatus::PendingConfirmation])
            .await?;

        let mut notified = 0;
        for event in pending {
            let Some(description) = event.description.as_deref() else {
                continue;
            };
            if !description.contains(FORCED_MARKER) {
                continue;
            }
            let Some(group) = self.store.load_group(event.group_id).await? else {
                continue;
            };

            let cleaned = description.replace(FORCED_MARKER, "").trim().to_string();
            let patch = EventPatch {
                description: Some((!cleaned.is_empty()).then_some(cleaned)),
                ..EventPatch::default()
            };
            // The guard keeps two overlapping runs from both announcing.
            let Some(updated) = self
                .store
                .update_event(event.id, &patch, Some(EventStatus::PendingConfirmation), now)
                .await?
            else {
                continue;
            };
            self.announce(&updated, &group.user_ids).await;
            notified += 1;
        }
        Ok(notified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn vote(restaurant_id: RestaurantId, user: bool) -> RestaurantVote {
        RestaurantVote {
            id: Uuid::new_v4(),
            group_id: Uuid::nil(),
            restaurant_id,
            user_id: user.then(Uuid::new_v4),
            is_system_recommendation: !user,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn most_votes_win_and_ties_go_to_smallest_id() {
        let mut ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        ids.sort();
        let votes = [vote(ids[2], true), vote(ids[1], true), vote(ids[2], true), vote(ids[0], false)];
        let (winner, voted, seeds) = tally(&votes);
        assert_eq!(winner, Some(ids[2]));
        assert_eq!(voted, vec![ids[2], ids[1]]);
        assert_eq!(seeds, vec![ids[0]]);

        let tied = [vote(ids[2], true), vote(ids[1], true)];
        assert_eq!(tally(&tied).0, Some(ids[1]));
    }

    #[test]
    fn seeds_never_count_as_votes() {
        let seed = Uuid::new_v4();
        let (winner, voted, seeds) = tally(&[vote(seed, false), vote(seed, false)]);
        assert_eq!(winner, None);
        assert!(voted.is_empty());
        assert_eq!(seeds, vec![seed]);
    }

    #[test]
    fn candidates_follow_votes_then_seeds() {
        let (w, a, b, s) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(candidate_list(w, &[w, a, b], &[b, s, w]), vec![a, b, s]);
    }
}
