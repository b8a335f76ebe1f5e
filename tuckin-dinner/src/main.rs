use std::sync::Arc;
use std::time::Duration;

use tuckin_dinner::calendar::SystemClock;
use tuckin_dinner::config::AppConfig;
use tuckin_dinner::notifier::FcmPushSink;
use tuckin_dinner::random::SharedRng;
use tuckin_dinner::restaurants::BusinessHoursProvider;
use tuckin_dinner::routes;
use tuckin_dinner::scheduler::spawn_scheduler_loop;
use tuckin_dinner::state::{AppState, Ports};
use tuckin_dinner::store::{PgStore, Store};
use tuckin_shared::clients::db::create_pool;
use tuckin_shared::clients::fcm::FcmClient;
use tuckin_shared::clients::object_store::ObjectStoreClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tuckin_shared::middleware::init_tracing("tuckin-dinner");
    let metrics_handle = tuckin_shared::middleware::init_metrics()?;

    let config = AppConfig::load()?;
    let port = config.port;

    // The request extractors read these from the environment.
    std::env::set_var("JWT_SECRET", &config.jwt_secret);
    if config.cron_api_key.is_empty() {
        tracing::warn!("cron api key is not set, scheduler endpoints will reject every call");
    } else {
        std::env::set_var("CRON_API_KEY", &config.cron_api_key);
    }

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));

    let fcm = FcmClient::new(&config.fcm_endpoint, &config.fcm_server_key);
    let objects = ObjectStoreClient::new(
        &config.object_store_endpoint,
        &config.object_store_access_key,
        &config.object_store_secret_key,
        &config.object_store_bucket,
    );

    let ports = Ports {
        store: store.clone(),
        push: Arc::new(FcmPushSink::new(fcm, store)),
        objects: Arc::new(objects),
        hours: Arc::new(BusinessHoursProvider),
        clock: Arc::new(SystemClock),
        rng: Arc::new(SharedRng::from_entropy()),
    };
    let state = Arc::new(AppState::assemble(ports, config.task_pool_size, metrics_handle));

    spawn_scheduler_loop(
        state.scheduler.clone(),
        Duration::from_secs(config.scheduler_tick_secs.max(1)),
        Duration::from_secs(config.lock_sweep_secs.max(1)),
    );

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "tuckin-dinner starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
