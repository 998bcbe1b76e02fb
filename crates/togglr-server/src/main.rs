use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use togglr_server::api::{AppState, router};
use togglr_server::audit::AuditLogger;
use togglr_server::cache::CacheCoordinator;
use togglr_server::config::{load_config, resolve_config_path};
use togglr_server::scheduler::ScheduledTransitionRunner;
use togglr_server::service::ToggleService;
use togglr_server::{metrics, observability};

use togglr_cache::create_redis_pool;
use togglr_db_postgres::PostgresStore;
use togglr_storage::{AuditStore, MemoryStore, ToggleStore, UserListStore};

#[tokio::main]
async fn main() {
    // Load .env if present; environment variables may carry the config path.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    observability::init_tracing();

    if let Err(e) = run().await {
        eprintln!("Server error: {e:#}");
        std::process::exit(2);
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path = resolve_config_path();
    let config = load_config(&config_path).context("configuration error")?;

    tracing::info!(path = %config_path, "Configuration loaded");
    observability::apply_logging_level(&config.logging.level);
    metrics::init_metrics();

    let toggles: Arc<dyn ToggleStore>;
    let lists: Arc<dyn UserListStore>;
    let audit_store: Arc<dyn AuditStore>;
    match config.storage.postgres {
        Some(ref pg) => {
            let store = Arc::new(
                PostgresStore::connect(pg)
                    .await
                    .context("PostgreSQL initialization failed")?,
            );
            toggles = store.clone();
            lists = store.clone();
            audit_store = store;
        }
        None => {
            tracing::warn!("No storage.postgres configured, using the in-memory store");
            let store = Arc::new(MemoryStore::new());
            toggles = store.clone();
            lists = store.clone();
            audit_store = store;
        }
    }

    let redis_pool = create_redis_pool(&config.redis).await;
    let coordinator = Arc::new(CacheCoordinator::new(
        &config.redis,
        Duration::from_secs(config.cache.ttl_seconds),
        redis_pool,
        Arc::clone(&toggles),
        Arc::clone(&lists),
    ));
    coordinator.subscribe();

    let service = Arc::new(ToggleService::new(
        Arc::clone(&toggles),
        lists,
        Arc::clone(&audit_store),
        Arc::clone(&coordinator),
    ));

    let scheduler_shutdown = if config.scheduler.enabled {
        let runner = ScheduledTransitionRunner::new(
            &config.scheduler,
            toggles,
            Arc::clone(&coordinator),
            AuditLogger::new(audit_store),
        );
        Some(runner.start())
    } else {
        tracing::info!("Scheduled-transition runner disabled");
        None
    };

    let addr = config.addr();
    let app = router(AppState { service });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(shutdown) = scheduler_shutdown {
        let _ = shutdown.send(true);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
