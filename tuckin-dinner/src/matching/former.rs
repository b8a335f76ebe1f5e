use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use tuckin_shared::{AppError, AppResult};

use crate::calendar::{upcoming_dinner_instant, Clock};
use crate::domain::{CategoryId, Gender, GroupId, NewGroup, PoolUser, UserId, UserStatus, WaitingPool};
use crate::notifier::{NotificationKind, Notifier};
use crate::random::SharedRng;
use crate::restaurants::RestaurantSeeder;
use crate::store::Store;

use super::history::PairHistory;
use super::search::pick_group;
use super::sizes::group_sizes;

/// Hours members have to act on a fresh match.
const CONFIRMATION_WINDOW_HOURS: i64 = 24;
const MIN_GROUP_SIZE: usize = 3;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MatchOutcome {
    pub groups: Vec<NewGroup>,
    pub failed: Vec<UserId>,
}

/// Partitions the pool into groups of 3 to 5. School-only users are grouped
/// among themselves; any subpool too small to form a group fails as a whole.
pub fn form_groups<R: Rng + ?Sized>(pool: Vec<PoolUser>, history: &PairHistory, rng: &mut R) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    if pool.len() < 3 {
        outcome.failed = pool.into_iter().map(|u| u.id).collect();
        return outcome;
    }

    let (school_only, mixed): (Vec<PoolUser>, Vec<PoolUser>) =
        pool.into_iter().partition(|u| u.prefer_school_only);

    for (subpool, flag) in [(school_only, true), (mixed, false)] {
        group_subpool(subpool, flag, history, rng, &mut outcome);
    }
    outcome
}

fn group_subpool<R: Rng + ?Sized>(
    mut remaining: Vec<PoolUser>,
    school_only: bool,
    history: &PairHistory,
    rng: &mut R,
    outcome: &mut MatchOutcome,
) {
    let Some(sizes) = group_sizes(remaining.len()) else {
        outcome.failed.extend(remaining.iter().map(|u| u.id));
        return;
    };

    for size in sizes {
        let picked = pick_group(&remaining, size, history, rng);
        // Remove from the back so earlier indices stay valid.
        let mut members: Vec<PoolUser> = picked.iter().rev().map(|&i| remaining.swap_remove(i)).collect();
        members.reverse();

        let male_count = members.iter().filter(|u| u.gender == Gender::Male).count() as i32;
        outcome.groups.push(NewGroup {
            user_ids: members.iter().map(|u| u.id).collect(),
            male_count,
            female_count: members.len() as i32 - male_count,
            school_only,
        });
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MatchReport {
    pub pool_size: usize,
    pub groups: Vec<GroupId>,
    pub failed: Vec<UserId>,
}

/// Drives one matching batch: snapshot the pool, search, persist, notify and
/// seed restaurants.
pub struct GroupFormer {
    store: Arc<dyn Store>,
    notifier: Notifier,
    seeder: Arc<RestaurantSeeder>,
    clock: Arc<dyn Clock>,
    rng: Arc<SharedRng>,
}

impl GroupFormer {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Notifier,
        seeder: Arc<RestaurantSeeder>,
        clock: Arc<dyn Clock>,
        rng: Arc<SharedRng>,
    ) -> Self {
        Self { store, notifier, seeder, clock, rng }
    }

    pub async fn run(&self) -> AppResult<MatchReport> {
        let now = self.clock.now();
        let WaitingPool { users: pool, incomplete } = self.store.waiting_users().await?;
        let mut report = MatchReport {
            pool_size: pool.len() + incomplete.len(),
            ..MatchReport::default()
        };
        if report.pool_size == 0 {
            tracing::info!("matching pool is empty");
            return Ok(report);
        }
        if !incomplete.is_empty() {
            tracing::warn!(count = incomplete.len(), "waiting users with incomplete profiles fail this batch");
        }

        let ids: Vec<UserId> = pool.iter().map(|u| u.id).collect();
        let history = PairHistory::from_groups(&self.store.dining_history_groups(&ids).await?);
        let preferences: HashMap<UserId, Vec<CategoryId>> = pool
            .iter()
            .map(|u| (u.id, u.food_preferences.clone()))
            .collect();
        let genders: HashMap<UserId, Gender> = pool.iter().map(|u| (u.id, u.gender)).collect();

        let mut rng = self.rng.fork();
        let outcome = tokio::task::spawn_blocking(move || form_groups(pool, &history, &mut rng))
            .await
            .map_err(|e| AppError::internal(format!("group search task failed: {e}")))?;

        tracing::info!(
            pool = report.pool_size,
            groups = outcome.groups.len(),
            failed = outcome.failed.len(),
            "group search finished"
        );

        let mut failed = incomplete;
        failed.extend(outcome.failed);

        let dinner = upcoming_dinner_instant(now)?;
        for group in &outcome.groups {
            let (group_id, group) = match self.persist_group(group, &genders, now).await? {
                Persisted::Formed(group_id, group) => (group_id, group),
                Persisted::TooFew(leftovers) => {
                    failed.extend(leftovers);
                    continue;
                }
            };
            report.groups.push(group_id);

            let categories: Vec<CategoryId> = group
                .user_ids
                .iter()
                .filter_map(|id| preferences.get(id))
                .flatten()
                .copied()
                .collect();
            if let Err(e) = self.seeder.seed(group_id, &categories, dinner).await {
                tracing::warn!(group_id = %group_id, error = %e, "restaurant seeding failed");
            }
        }
        metrics::counter!("matching_groups_formed_total").increment(report.groups.len() as u64);

        if !failed.is_empty() {
            let failed = self
                .store
                .transition_users(&failed, UserStatus::WaitingMatching, UserStatus::MatchingFailed)
                .await?;
            self.notifier
                .notify_group(
                    &failed,
                    "這次沒有配對成功",
                    "本週報名人數不足，下次聚餐再試試看吧！",
                    NotificationKind::MatchingFailed.payload(json!({})),
                )
                .await;
            report.failed = failed;
        }

        Ok(report)
    }

    /// Writes the group, then moves its members. Members who left the pool
    /// mid-run are dropped: the row is rewritten from whoever moved, and if
    /// fewer than three did, they go back to `waiting_matching` and come out
    /// as leftovers.
    async fn persist_group(
        &self,
        planned: &NewGroup,
        genders: &HashMap<UserId, Gender>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Persisted> {
        let mut group_id = self.store.create_group(planned, now).await?;
        let moved = self
            .store
            .transition_users(&planned.user_ids, UserStatus::WaitingMatching, UserStatus::WaitingRestaurant)
            .await?;
        if moved.len() == planned.user_ids.len() {
            return self.announce(group_id, planned.clone(), now).await;
        }

        tracing::warn!(group_id = %group_id, moved = moved.len(), size = planned.user_ids.len(), "some members left the pool mid-run");
        self.store.delete_groups(&[group_id]).await?;
        if moved.len() < MIN_GROUP_SIZE {
            let back = self
                .store
                .transition_users(&moved, UserStatus::WaitingRestaurant, UserStatus::WaitingMatching)
                .await?;
            return Ok(Persisted::TooFew(back));
        }

        let male_count = moved.iter().filter(|id| genders.get(id) == Some(&Gender::Male)).count() as i32;
        let group = NewGroup {
            male_count,
            female_count: moved.len() as i32 - male_count,
            user_ids: moved,
            school_only: planned.school_only,
        };
        group_id = self.store.create_group(&group, now).await?;
        self.announce(group_id, group, now).await
    }

    async fn announce(
        &self,
        group_id: GroupId,
        group: NewGroup,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Persisted> {
        self.store
            .upsert_matching_info(&group.user_ids, group_id, now + Duration::hours(CONFIRMATION_WINDOW_HOURS))
            .await?;
        self.notifier
            .notify_group(
                &group.user_ids,
                "配對成功",
                "你的聚餐小組已經成立，快去選擇想去的餐廳吧！",
                NotificationKind::MatchingSuccess.payload(json!({ "matching_group_id": group_id })),
            )
            .await;

        tracing::info!(group_id = %group_id, size = group.user_ids.len(), school_only = group.school_only, "group formed");
        Ok(Persisted::Formed(group_id, group))
    }
}

enum Persisted {
    Formed(GroupId, NewGroup),
    TooFew(Vec<UserId>),
}
