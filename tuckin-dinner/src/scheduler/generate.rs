use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tuckin_shared::AppResult;

use crate::calendar::{derived_instants, local_date, week_dinner_instant, week_monday};
use crate::domain::TaskType;
use crate::store::Store;

/// Rows are topped up once the furthest one is closer than this.
pub fn refill_threshold() -> Duration {
    Duration::days(14)
}

/// How far ahead a top-up reaches.
pub fn horizon() -> Duration {
    Duration::days(30)
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct GenerateReport {
    pub skipped: bool,
    pub candidates: usize,
    pub inserted: usize,
}

/// Task rows for every cycle whose matching instant falls before
/// `now + horizon`. Rows already in the past are left out, and when
/// `fresh_start` is set a cycle that has already begun is left out entirely.
pub fn planned_rows(now: DateTime<Utc>, fresh_start: bool) -> AppResult<Vec<(TaskType, DateTime<Utc>)>> {
    let end = now + horizon();
    let last_monday = week_monday(local_date(end));
    let mut monday = week_monday(local_date(now));
    let mut rows = Vec::new();

    while monday <= last_monday {
        let instants = derived_instants(week_dinner_instant(monday)?)?;
        monday += Duration::weeks(1);

        if instants.matching > end || (fresh_start && instants.matching <= now) {
            continue;
        }
        rows.extend(instants.tasks().into_iter().filter(|(_, at)| *at > now));
    }
    Ok(rows)
}

pub async fn generate(store: &dyn Store, now: DateTime<Utc>) -> AppResult<GenerateReport> {
    let latest = store.latest_schedule_time().await?;
    if latest.is_some_and(|latest| latest >= now + refill_threshold()) {
        tracing::debug!(latest = ?latest, "schedule is far enough ahead");
        return Ok(GenerateReport {
            skipped: true,
            ..GenerateReport::default()
        });
    }

    let rows = planned_rows(now, latest.is_none())?;
    let inserted = store.upsert_schedule_rows(&rows, now).await?;
    tracing::info!(candidates = rows.len(), inserted, "schedule generated");
    Ok(GenerateReport {
        skipped: false,
        candidates: rows.len(),
        inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{dinner_weekday, LOCAL_TZ};
    use crate::store::memory::MemoryStore;
    use crate::testing::taipei;
    use chrono::{Datelike, Timelike};

    #[test]
    fn fresh_table_starts_at_the_next_match() {
        // Wednesday 2025-01-08: the Thursday cycle's match ran on Tuesday.
        let now = taipei(2025, 1, 8, 12, 0);
        let rows = planned_rows(now, true).unwrap();

        let first_match = rows.iter().find(|(t, _)| *t == TaskType::Match).unwrap().1;
        assert_eq!(first_match, taipei(2025, 1, 11, 6, 0));
        let first = rows.iter().map(|(_, at)| *at).min().unwrap();
        assert_eq!(first, taipei(2025, 1, 10, 9, 0));
        assert!(rows.iter().all(|(_, at)| *at > now));
    }

    #[test]
    fn existing_table_keeps_the_running_cycle() {
        let now = taipei(2025, 1, 8, 12, 0);
        let rows = planned_rows(now, false).unwrap();
        assert!(rows.contains(&(TaskType::EventEnd, taipei(2025, 1, 9, 22, 0))));
        assert!(!rows.contains(&(TaskType::Match, taipei(2025, 1, 7, 6, 0))));
    }

    #[test]
    fn every_dinner_lands_on_its_parity_weekday() {
        let now = taipei(2025, 3, 3, 0, 0);
        for (task, at) in planned_rows(now, true).unwrap() {
            if task == TaskType::EventEnd {
                let local = at.with_timezone(&LOCAL_TZ);
                assert_eq!(local.hour(), 22);
                assert_eq!(local.weekday(), dinner_weekday(local.date_naive()));
            }
        }
    }

    #[tokio::test]
    async fn generation_is_idempotent_and_lazy() {
        let store = MemoryStore::new();
        let now = taipei(2025, 1, 6, 0, 0);

        let first = generate(&store, now).await.unwrap();
        assert!(!first.skipped);
        assert!(first.inserted > 0);
        assert_eq!(first.inserted, first.candidates);

        // The horizon reaches past the refill threshold, so the next call is a no-op.
        let second = generate(&store, now).await.unwrap();
        assert!(second.skipped);

        let later = now + Duration::days(20);
        let third = generate(&store, later).await.unwrap();
        assert!(!third.skipped);
        assert!(third.inserted < third.candidates);
        assert_eq!(store.state().schedule.len(), first.inserted + third.inserted);
    }
}
