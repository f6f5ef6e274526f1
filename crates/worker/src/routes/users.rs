//! Account endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::UserId;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionStarted {
    pub user_id: UserId,
}

/// DELETE /users/{id}: starts the account deletion saga.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<DeletionStarted>), ApiError> {
    let user_id: UserId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user ID: {id}")))?;

    let first = state.dispatcher.deletion().start(user_id);
    state.broker.publish(first).await?;

    Ok((StatusCode::ACCEPTED, Json(DeletionStarted { user_id })))
}
