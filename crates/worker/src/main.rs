use std::sync::Arc;
use std::time::Duration;

use beacon_events::{DispatchQueue, PendingSweeper, PushServices};
use beacon_worker::WorkerConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "beacon_worker=debug,beacon_events=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        retry_min_age_secs = config.retry_min_age.as_secs(),
        workers = config.push.dispatch_workers,
        max_attempts = config.push.max_delivery_attempts,
        "Worker starting"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = beacon_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    beacon_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // --- Push pipeline ---
    let services =
        PushServices::new(pool, &config.push).expect("Failed to build push HTTP clients");

    let cancel = CancellationToken::new();
    let (queue, dispatch_handles) = DispatchQueue::start(
        Arc::clone(&services.dispatcher),
        config.push.dispatch_workers,
        config.push.queue_capacity,
        cancel.clone(),
    );

    let sweeper = PendingSweeper::new(
        Arc::new(services.store.clone()),
        queue,
        config.push.max_delivery_attempts,
    )
    .with_interval(config.sweep_interval)
    .with_min_age(config.retry_min_age)
    .with_batch(config.sweep_batch);

    let sweeper_cancel = cancel.clone();
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(sweeper_cancel).await;
    });

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    for handle in dispatch_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
