//! JSON REST API for Lifeline.
//!
//! Exposes an axum [`Router`] backed by any [`lifeline_core::remote::Remote`].
//! Every route names the acting user in its path; authentication is the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", lifeline_api::api_router(store.clone()))
//! ```

pub mod contacts;
pub mod error;
pub mod pings;
pub mod users;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use lifeline_core::{interval::CheckInInterval, remote::Remote};
use serde::Deserialize;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LIFELINE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  /// Interval given to accounts provisioned with `--create-user`.
  pub default_interval_secs: i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_string(),
      port:                  8080,
      store_path:            PathBuf::from("lifeline.db"),
      default_interval_secs: CheckInInterval::DEFAULT.as_secs(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `store`.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: Remote + 'static,
{
  Router::new()
    // Users
    .route("/users/{id}", get(users::get_one::<S>).patch(users::patch::<S>))
    .route("/lookup/{qr_code}", get(users::lookup::<S>))
    // Contacts
    .route("/users/{id}/contacts", get(contacts::list::<S>).post(contacts::add::<S>))
    .route(
      "/users/{id}/contacts/{peer}",
      put(contacts::update_roles::<S>).delete(contacts::remove::<S>),
    )
    // Pings
    .route(
      "/users/{id}/contacts/{peer}/ping",
      post(pings::send::<S>).delete(pings::clear::<S>),
    )
    .route("/users/{id}/contacts/{peer}/respond", post(pings::respond::<S>))
    .route("/users/{id}/pings/respond", post(pings::respond_all::<S>))
    .with_state(store)
}
