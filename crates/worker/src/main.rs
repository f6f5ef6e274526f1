//! Saga worker entry point.

use std::sync::Arc;

use saga::{InMemoryBroker, InMemoryServices, SagaWorker};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::config::{Config, LogFormat};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let store = worker::create_store(&config)
        .await
        .expect("failed to open saga state store");
    let services = InMemoryServices::new();
    let dispatcher = worker::create_dispatcher(store, services.services(), config.retry_policy());

    let (broker, deliveries) = InMemoryBroker::new(config.broker_capacity);
    let broker = Arc::new(broker);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let saga_worker = SagaWorker::new(dispatcher.clone(), broker.clone());
    let worker_task = tokio::spawn(saga_worker.run(deliveries, shutdown_rx));

    let state = Arc::new(worker::AppState::new(dispatcher, broker));
    let app = worker::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, retry = ?config.retry_policy(), "starting saga worker");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(error) = worker_task.await {
        tracing::error!(%error, "saga worker task failed");
    }
    tracing::info!("saga worker shut down gracefully");
}
