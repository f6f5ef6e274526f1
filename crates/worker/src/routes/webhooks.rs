//! Upstream triggers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::SagaStateId;
use saga::PaymentCompleted;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStarted {
    pub saga_state_id: SagaStateId,
}

/// POST /webhooks/payment-completed: starts the checkout saga for a paid
/// cart and publishes its first step.
pub async fn payment_completed(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PaymentCompleted>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutStarted>), ApiError> {
    let Json(trigger) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let first = state.dispatcher.checkout().start(trigger).await?;
    state.broker.publish(first).await?;

    let saga_state_id = first
        .saga_state_id()
        .ok_or_else(|| ApiError::Internal("checkout started without saga state".to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(CheckoutStarted { saga_state_id })))
}
