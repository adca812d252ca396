//! Rifa dev server
//!
//! Serves the raffle API over the in-memory backend with the demo raffle
//! published, so the storefront (or `curl`) can run a full checkout locally.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! curl http://localhost:8080/api/raffles/7d4f3a2e-9b1c-4e8a-b5d6-0f1e2a3b4c5d
//! ```

use rifa_core::environment::{Clock, SystemClock};
use rifa_storefront::{
    fixtures::demo_raffle,
    metrics,
    server::{build_router, AppState},
    Config, InMemoryRaffleService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.server.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    metrics::register_business_metrics();
    info!("Starting rifa dev server");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = InMemoryRaffleService::new(Arc::clone(&clock))
        .with_payment_window(config.storefront.payment_window())
        .with_max_hold(config.storefront.reservation_ttl());
    let raffle = demo_raffle(clock.now());
    info!(raffle_id = %raffle.id, title = %raffle.title, "Publishing demo raffle");
    service.add_raffle(raffle).await?;

    // Holds expire lazily on access; the sweep keeps counters fresh for idle raffles
    let sweeper = {
        let service = service.clone();
        let period = Duration::from_secs(config.server.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                service.sweep_expired().await;
            }
        })
    };

    let app = build_router(AppState::new(service, clock.now()));

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
