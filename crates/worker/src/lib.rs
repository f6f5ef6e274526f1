//! Saga worker process.
//!
//! Consumes step messages from the broker and hands them to the
//! [`StepDispatcher`], and exposes the upstream triggers that start a saga
//! over HTTP next to health and Prometheus endpoints.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    AccountDeletionSaga, Broker, CheckoutSaga, RetryPolicy, Services, StepDispatcher,
};
use saga_store::{InMemorySagaStateCache, InMemorySagaStateRepository, PostgresSagaStateRepository, SagaStateStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub dispatcher: StepDispatcher,
    pub broker: Arc<dyn Broker>,
}

impl AppState {
    pub fn new(dispatcher: StepDispatcher, broker: Arc<dyn Broker>) -> Self {
        Self { dispatcher, broker }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/webhooks/payment-completed",
            post(routes::webhooks::payment_completed),
        )
        .route("/users/{id}", delete(routes::users::delete))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the saga state store: PostgreSQL when `DATABASE_URL` is set,
/// in-memory otherwise, always fronted by the TTL cache.
pub async fn create_store(config: &Config) -> saga_store::Result<SagaStateStore> {
    let cache = Arc::new(InMemorySagaStateCache::new(config.cache_ttl));
    match &config.database_url {
        Some(url) => {
            let repository = PostgresSagaStateRepository::connect(url, 10).await?;
            Ok(SagaStateStore::new(Arc::new(repository), cache))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, saga state is kept in memory");
            Ok(SagaStateStore::new(
                Arc::new(InMemorySagaStateRepository::new()),
                cache,
            ))
        }
    }
}

/// Wires both sagas over the same collaborators and retry policy.
pub fn create_dispatcher(
    store: SagaStateStore,
    services: Services,
    retry: RetryPolicy,
) -> StepDispatcher {
    StepDispatcher::new(
        CheckoutSaga::new(store, services.clone(), retry),
        AccountDeletionSaga::new(services, retry),
    )
}
