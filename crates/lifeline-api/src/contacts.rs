//! Handlers for `/users/{id}/contacts`.
//!
//! Relationship writes touch both edges; see [`lifeline_core::remote`].

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use lifeline_core::{
  contact::{Contact, Roles},
  remote::Remote,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, from_remote};

/// Role flags as sent by clients. Validated into [`Roles`] so that an edge
/// with neither role is a 400 rather than a body rejection.
#[derive(Debug, Deserialize)]
pub struct RolesBody {
  pub is_responder: bool,
  pub is_dependent: bool,
}

impl RolesBody {
  fn roles(&self) -> Result<Roles, ApiError> {
    Ok(Roles::new(self.is_responder, self.is_dependent)?)
  }
}

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub peer_id: Uuid,
  #[serde(flatten)]
  pub roles:   RolesBody,
}

/// `GET /users/{id}/contacts`
pub async fn list<S: Remote>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Contact>>, ApiError> {
  let contacts = store.load_contacts(id).await.map_err(from_remote)?;
  Ok(Json(contacts))
}

/// `POST /users/{id}/contacts`, body: `{"peer_id":..,"is_responder":..,"is_dependent":..}`
pub async fn add<S: Remote>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AddBody>,
) -> Result<StatusCode, ApiError> {
  let roles = body.roles.roles()?;
  store
    .add_contact_relation(id, body.peer_id, roles)
    .await
    .map_err(from_remote)?;
  Ok(StatusCode::CREATED)
}

/// `PUT /users/{id}/contacts/{peer}`
pub async fn update_roles<S: Remote>(
  State(store): State<Arc<S>>,
  Path((id, peer)): Path<(Uuid, Uuid)>,
  Json(body): Json<RolesBody>,
) -> Result<StatusCode, ApiError> {
  let roles = body.roles()?;
  store.update_contact_roles(id, peer, roles).await.map_err(from_remote)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/{id}/contacts/{peer}`
pub async fn remove<S: Remote>(
  State(store): State<Arc<S>>,
  Path((id, peer)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
  store.delete_contact_relation(id, peer).await.map_err(from_remote)?;
  Ok(StatusCode::NO_CONTENT)
}
