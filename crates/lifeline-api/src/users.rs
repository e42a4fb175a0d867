//! Handlers for `/users/{id}` and `/lookup/{qr_code}`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/users/{id}` | 404 if not found |
//! | `PATCH` | `/users/{id}` | Body: a partial user; returns the updated user |
//! | `GET`   | `/lookup/{qr_code}` | Public profile of the code's owner |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use lifeline_core::{
  remote::Remote,
  user::{PeerProfile, User, UserPatch},
};
use uuid::Uuid;

use crate::error::{ApiError, from_remote};

/// `GET /users/{id}`
pub async fn get_one<S: Remote>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
  let user = store.load_user(id).await.map_err(from_remote)?;
  Ok(Json(user))
}

/// `PATCH /users/{id}`
pub async fn patch<S: Remote>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
  if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  let user = store.update_user(id, patch).await.map_err(from_remote)?;
  Ok(Json(user))
}

/// `GET /lookup/{qr_code}`
pub async fn lookup<S: Remote>(
  State(store): State<Arc<S>>,
  Path(qr_code): Path<Uuid>,
) -> Result<Json<PeerProfile>, ApiError> {
  let profile = store
    .lookup_user_by_code(qr_code)
    .await
    .map_err(from_remote)?
    .ok_or_else(|| ApiError::NotFound(format!("no user with code {qr_code}")))?;
  Ok(Json(profile))
}
