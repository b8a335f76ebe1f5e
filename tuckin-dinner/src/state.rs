use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::calendar::Clock;
use crate::dining::{Archiver, EventLifecycle, ObjectStore};
use crate::matching::GroupFormer;
use crate::notifier::{Notifier, PushSink};
use crate::random::SharedRng;
use crate::rating::RatingCollector;
use crate::restaurants::{RestaurantProvider, RestaurantSeeder};
use crate::scheduler::{ReminderService, Scheduler};
use crate::store::Store;
use crate::voting::VoteCoordinator;

/// The outside world the services run against.
pub struct Ports {
    pub store: Arc<dyn Store>,
    pub push: Arc<dyn PushSink>,
    pub objects: Arc<dyn ObjectStore>,
    pub hours: Arc<dyn RestaurantProvider>,
    pub clock: Arc<dyn Clock>,
    pub rng: Arc<SharedRng>,
}

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub voting: Arc<VoteCoordinator>,
    pub lifecycle: Arc<EventLifecycle>,
    pub ratings: Arc<RatingCollector>,
    pub reminders: Arc<ReminderService>,
    pub scheduler: Arc<Scheduler>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn assemble(ports: Ports, task_pool_size: usize, metrics_handle: PrometheusHandle) -> Self {
        let Ports {
            store,
            push,
            objects,
            hours,
            clock,
            rng,
        } = ports;
        let notifier = Notifier::new(store.clone(), push, clock.clone());

        let seeder = Arc::new(RestaurantSeeder::new(store.clone(), hours, clock.clone(), rng.clone()));
        let former = Arc::new(GroupFormer::new(
            store.clone(),
            notifier.clone(),
            seeder,
            clock.clone(),
            rng.clone(),
        ));
        let voting = Arc::new(VoteCoordinator::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
            rng.clone(),
        ));
        let lifecycle = Arc::new(EventLifecycle::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
            rng.clone(),
        ));
        let ratings = Arc::new(RatingCollector::new(store.clone(), clock.clone(), rng));
        let archiver = Arc::new(Archiver::new(store.clone(), objects, clock.clone()));
        let reminders = Arc::new(ReminderService::new(store.clone(), notifier));

        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            clock.clone(),
            former,
            voting.clone(),
            lifecycle.clone(),
            archiver,
            reminders.clone(),
            task_pool_size,
        ));

        Self {
            store,
            clock,
            voting,
            lifecycle,
            ratings,
            reminders,
            scheduler,
            metrics_handle,
        }
    }
}
