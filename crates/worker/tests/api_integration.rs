//! Integration tests for the worker's HTTP surface.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{CartItem, Money, Product, User};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryBroker, InMemoryServices, RetryPolicy, SagaMessage, Step, Subject};
use saga_store::SagaStateStore;
use tokio::sync::mpsc;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    services: InMemoryServices,
    deliveries: mpsc::Receiver<String>,
}

fn setup() -> TestApp {
    let services = InMemoryServices::new();
    let dispatcher = worker::create_dispatcher(
        SagaStateStore::in_memory(),
        services.services(),
        RetryPolicy::new(2, Duration::ZERO),
    );
    let (broker, deliveries) = InMemoryBroker::new(16);
    let state = Arc::new(worker::AppState::new(dispatcher, Arc::new(broker)));
    let app = worker::create_app(state, get_metrics_handle());
    TestApp {
        app,
        services,
        deliveries,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn payment_completed(buyer: &User, cents: i64) -> Request<Body> {
    let body = serde_json::json!({
        "buyerId": buyer.id,
        "amountTotal": cents,
    });
    Request::builder()
        .method("POST")
        .uri("/webhooks/payment-completed")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let TestApp { app, .. } = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let TestApp { app, .. } = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_payment_completed_publishes_first_step() {
    let TestApp {
        app,
        services,
        mut deliveries,
    } = setup();
    let buyer = User::new("Ada Buyer", "ada@example.com", Money::from_cents(10_000));
    let seller = User::new("Sam Seller", "sam@example.com", Money::zero());
    let widget = Product::new(seller.id, "Widget", Money::from_cents(1000), 5);
    services.identity.add(buyer.clone()).await;
    services.identity.add(seller).await;
    services.catalog.add(widget.clone()).await;
    services.cart.add(CartItem::new(buyer.id, widget.id, 2)).await;

    let response = app.oneshot(payment_completed(&buyer, 2000)).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let saga_state_id = json["sagaStateId"].as_str().unwrap().to_string();

    let raw = deliveries.recv().await.unwrap();
    let published = SagaMessage::from_json(&raw).unwrap();
    assert_eq!(published.step, Step::UpdateQuantities);
    assert_eq!(published.envelope.retry_count, 0);
    match published.envelope.subject {
        Subject::SagaState(id) => assert_eq!(id.to_string(), saga_state_id),
        other => panic!("unexpected subject {other}"),
    }
}

#[tokio::test]
async fn test_payment_completed_with_empty_cart_is_rejected() {
    let TestApp {
        app,
        services,
        mut deliveries,
    } = setup();
    let buyer = User::new("Ada Buyer", "ada@example.com", Money::from_cents(10_000));
    services.identity.add(buyer.clone()).await;

    let response = app.oneshot(payment_completed(&buyer, 0)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
    assert!(deliveries.try_recv().is_err());
}

#[tokio::test]
async fn test_malformed_trigger_is_rejected() {
    let TestApp { app, .. } = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payment-completed")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"buyerId": "not-a-uuid"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user_publishes_clear_cart() {
    let TestApp {
        app,
        mut deliveries,
        ..
    } = setup();
    let user = User::new("Sam Seller", "sam@example.com", Money::zero());

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/users/{}", user.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let published = SagaMessage::from_json(&deliveries.recv().await.unwrap()).unwrap();
    assert_eq!(published, SagaMessage::for_user(Step::ClearCart, user.id));
}

#[tokio::test]
async fn test_delete_user_with_invalid_id() {
    let TestApp { app, .. } = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
