//! Ping handlers. All return `204 No Content` and are idempotent.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
};
use lifeline_core::remote::Remote;
use uuid::Uuid;

use crate::error::{ApiError, from_remote};

/// `POST /users/{id}/contacts/{peer}/ping`
pub async fn send<S: Remote>(
  State(store): State<Arc<S>>,
  Path((id, peer)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
  store.ping_dependent(id, peer).await.map_err(from_remote)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/{id}/contacts/{peer}/ping`
pub async fn clear<S: Remote>(
  State(store): State<Arc<S>>,
  Path((id, peer)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
  store.clear_ping(id, peer).await.map_err(from_remote)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /users/{id}/contacts/{peer}/respond`
pub async fn respond<S: Remote>(
  State(store): State<Arc<S>>,
  Path((id, peer)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
  store.respond_to_ping(id, peer).await.map_err(from_remote)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /users/{id}/pings/respond`
pub async fn respond_all<S: Remote>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  store.respond_to_all_pings(id).await.map_err(from_remote)?;
  Ok(StatusCode::NO_CONTENT)
}
