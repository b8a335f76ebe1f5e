use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tuckin_shared::{AppError, AppResult, ErrorCode};

use crate::calendar::{Clock, LOCAL_TZ};
use crate::domain::{CategoryId, GroupId, Restaurant, RestaurantId};
use crate::random::SharedRng;
use crate::store::Store;

use super::hours::RestaurantProvider;

/// System recommendations written per group.
pub const SEED_COUNT: usize = 2;

/// Picks up to `SEED_COUNT` restaurants from `open`, one per category in order
/// of how many members asked for it, then tops up at random.
pub fn choose_seeds<R: Rng + ?Sized>(
    preferences: &[CategoryId],
    open: &[Restaurant],
    rng: &mut R,
) -> Vec<RestaurantId> {
    let mut counts: BTreeMap<CategoryId, usize> = BTreeMap::new();
    for category in preferences {
        *counts.entry(*category).or_default() += 1;
    }
    let mut ranked: Vec<(CategoryId, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen: Vec<RestaurantId> = Vec::with_capacity(SEED_COUNT);
    for (category, _) in ranked {
        if chosen.len() == SEED_COUNT {
            break;
        }
        let in_category: Vec<&Restaurant> = open
            .iter()
            .filter(|r| r.category_id == Some(category) && !chosen.contains(&r.id))
            .collect();
        if let Some(pick) = in_category.choose(rng) {
            chosen.push(pick.id);
        }
    }

    if chosen.len() < SEED_COUNT {
        let rest: Vec<RestaurantId> = open
            .iter()
            .map(|r| r.id)
            .filter(|id| !chosen.contains(id))
            .collect();
        let missing = SEED_COUNT - chosen.len();
        chosen.extend(rest.choose_multiple(rng, missing).copied());
    }
    chosen
}

pub struct RestaurantSeeder {
    store: Arc<dyn Store>,
    provider: Arc<dyn RestaurantProvider>,
    clock: Arc<dyn Clock>,
    rng: Arc<SharedRng>,
}

impl RestaurantSeeder {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn RestaurantProvider>,
        clock: Arc<dyn Clock>,
        rng: Arc<SharedRng>,
    ) -> Self {
        Self { store, provider, clock, rng }
    }

    /// Writes the system recommendations for a group, or returns the ones
    /// already there.
    pub async fn seed(
        &self,
        group_id: GroupId,
        preferences: &[CategoryId],
        dinner: DateTime<Utc>,
    ) -> AppResult<Vec<RestaurantId>> {
        let existing: Vec<RestaurantId> = self
            .store
            .load_votes(group_id)
            .await?
            .into_iter()
            .filter(|v| v.is_system_recommendation)
            .map(|v| v.restaurant_id)
            .collect();
        if !existing.is_empty() {
            tracing::debug!(group_id = %group_id, "group already seeded");
            return Ok(existing);
        }

        let local = dinner.with_timezone(&LOCAL_TZ);
        let weekday = local.weekday().num_days_from_sunday();
        let minute = local.hour() * 60 + local.minute();

        let open: Vec<Restaurant> = self
            .store
            .list_restaurants()
            .await?
            .into_iter()
            .filter(|r| self.provider.is_open(r, weekday, minute))
            .collect();
        if open.is_empty() {
            return Err(AppError::new(
                ErrorCode::NoOpenRestaurants,
                format!("no restaurant open at {local}"),
            ));
        }

        let chosen = choose_seeds(preferences, &open, &mut self.rng.fork());
        self.store
            .insert_seed_votes(group_id, &chosen, self.clock.now())
            .await?;
        tracing::info!(group_id = %group_id, seeds = chosen.len(), "restaurants seeded");
        Ok(chosen)
    }
}
