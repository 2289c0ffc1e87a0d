use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courier_server::clock::{Clock, SystemClock};
use courier_server::config::{ServerConfig, StoreBackend};
use courier_server::router::build_router;
use courier_server::shutdown::{shutdown_signal, ShutdownHandle};
use courier_server::state::AppState;
use courier_server::store::memory::MemoryStore;
use courier_server::store::postgres::PgStore;
use courier_server::store::Store;
use courier_server::tasks::cleanup::spawn_maintenance;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let store: Arc<dyn Store> = match config.store.backend {
        StoreBackend::Postgres => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.max_db_connections)
                .acquire_timeout(config.store.timeout())
                .connect(&config.database_url)
                .await?;
            sqlx::migrate!().run(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let addr = format!("{}:{}", config.host, config.port);
    let maintenance = config.maintenance.clone();
    let state = AppState::new(config, store, clock.clone())?;

    let shutdown = ShutdownHandle::new();
    let maintenance_task = spawn_maintenance(
        state.services.clone(),
        clock,
        maintenance,
        shutdown.subscribe(),
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.trigger();
        })
        .await?;

    if let Err(e) = maintenance_task.await {
        tracing::warn!(error = %e, "maintenance task ended abnormally");
    }
    tracing::info!("Server shut down");
    Ok(())
}
