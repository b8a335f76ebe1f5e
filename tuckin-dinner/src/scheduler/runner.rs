use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tuckin_shared::{AppError, AppResult};

use crate::calendar::Clock;
use crate::dining::{Archiver, EventLifecycle};
use crate::domain::TaskType;
use crate::matching::GroupFormer;
use crate::store::Store;
use crate::voting::VoteCoordinator;

use super::generate::{generate, GenerateReport};
use super::reminders::{ReminderKind, ReminderOptions, ReminderService};

#[derive(Debug, Default, Clone, Serialize)]
pub struct TickReport {
    pub fired: usize,
    pub failed: usize,
}

/// Fires schedule rows. Every action it drives is status-guarded, so a row
/// that runs twice does no harm.
pub struct Scheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    former: Arc<GroupFormer>,
    voting: Arc<VoteCoordinator>,
    lifecycle: Arc<EventLifecycle>,
    archiver: Arc<Archiver>,
    reminders: Arc<ReminderService>,
    jobs: Arc<Semaphore>,
}

fn to_value<T: Serialize>(report: T) -> AppResult<Value> {
    serde_json::to_value(report).map_err(|e| AppError::Internal(e.into()))
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        former: Arc<GroupFormer>,
        voting: Arc<VoteCoordinator>,
        lifecycle: Arc<EventLifecycle>,
        archiver: Arc<Archiver>,
        reminders: Arc<ReminderService>,
        pool_size: usize,
    ) -> Self {
        Self {
            store,
            clock,
            former,
            voting,
            lifecycle,
            archiver,
            reminders,
            jobs: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    pub async fn execute(&self, task_type: TaskType) -> AppResult<Value> {
        match task_type {
            TaskType::ReminderBooking => to_value(
                self.reminders
                    .send(ReminderKind::Booking, &ReminderOptions::default())
                    .await?,
            ),
            TaskType::Match => to_value(self.former.run().await?),
            TaskType::RestaurantVoteEnd => to_value(self.voting.end_voting().await?),
            TaskType::ReminderAttendance => to_value(
                self.reminders
                    .send(ReminderKind::Attendance, &ReminderOptions::default())
                    .await?,
            ),
            TaskType::EventEnd => to_value(self.lifecycle.age_out().await?),
            TaskType::RatingEnd => to_value(self.archiver.archive().await?),
        }
    }

    pub async fn generate(&self) -> AppResult<GenerateReport> {
        generate(self.store.as_ref(), self.clock.now()).await
    }

    /// Runs every due pending row in order and records the outcome on it.
    pub async fn fire_due(&self) -> AppResult<TickReport> {
        let mut report = TickReport::default();
        let due = self.store.load_due_schedule_rows(self.clock.now()).await?;

        for row in due {
            let _permit = self
                .jobs
                .acquire()
                .await
                .map_err(|e| AppError::internal(format!("job pool closed: {e}")))?;
            let task = row.task_type.as_str();
            tracing::info!(row_id = %row.id, task_type = task, scheduled_time = %row.scheduled_time, "firing task");

            match self.execute(row.task_type).await {
                Ok(_) => {
                    self.store.mark_row_done(row.id, self.clock.now()).await?;
                    metrics::counter!("scheduler_tasks_total", "task_type" => task, "outcome" => "done").increment(1);
                    report.fired += 1;
                }
                Err(e) => {
                    tracing::error!(row_id = %row.id, task_type = task, error = %e, "task failed");
                    self.store
                        .mark_row_failed(row.id, &e.to_string(), self.clock.now())
                        .await?;
                    metrics::counter!("scheduler_tasks_total", "task_type" => task, "outcome" => "failed").increment(1);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Starts one task in the background, bounded by the job pool.
    pub fn spawn_task(self: &Arc<Self>, task_type: TaskType) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let Ok(_permit) = scheduler.jobs.clone().acquire_owned().await else {
                return;
            };
            match scheduler.execute(task_type).await {
                Ok(result) => tracing::info!(task_type = task_type.as_str(), result = %result, "manual task finished"),
                Err(e) => tracing::error!(task_type = task_type.as_str(), error = %e, "manual task failed"),
            }
        });
    }

    pub async fn sweep_locks(&self) -> AppResult<usize> {
        self.lifecycle.sweep_locks().await
    }
}

/// Spawns the scheduler loop: top up the schedule and fire due rows every
/// tick, and sweep stale confirmation locks on their own interval.
pub fn spawn_scheduler_loop(scheduler: Arc<Scheduler>, tick: Duration, sweep: Duration) {
    tokio::spawn(async move {
        let mut tick_interval = tokio::time::interval(tick);
        let mut sweep_interval = tokio::time::interval(sweep);
        tracing::info!(tick_secs = tick.as_secs(), sweep_secs = sweep.as_secs(), "scheduler loop started");

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Err(e) = scheduler.generate().await {
                        tracing::error!(error = %e, "schedule generation failed");
                    }
                    match scheduler.fire_due().await {
                        Ok(report) if report.fired + report.failed > 0 => {
                            tracing::info!(fired = report.fired, failed = report.failed, "scheduler tick");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "scheduler tick failed"),
                    }
                }
                _ = sweep_interval.tick() => {
                    match scheduler.sweep_locks().await {
                        Ok(0) => {}
                        Ok(released) => tracing::info!(released, "stale confirmation locks released"),
                        Err(e) => tracing::error!(error = %e, "lock sweep failed"),
                    }
                }
            }
        }
    });
}
