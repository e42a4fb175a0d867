//! Async HTTP client wrapping the Lifeline JSON API.
//!
//! [`HttpRemote`] implements [`Remote`] so a [`lifeline_sync::Session`] can
//! drive a server over the network. The API has no push channel; streams
//! poll and yield only when the fetched document differs from the last one.

use std::{future::Future, time::Duration};

use futures::{Stream, stream};
use lifeline_core::{
  contact::{Contact, Roles},
  document::{self, Document},
  remote::Remote,
  user::{PeerProfile, User, UserPatch},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("server returned {status}: {message}")]
  Status { status: StatusCode, message: String },

  #[error(transparent)]
  Core(#[from] lifeline_core::Error),
}

impl From<ClientError> for lifeline_core::Error {
  fn from(e: ClientError) -> Self {
    match e {
      ClientError::Core(inner) => inner,
      ClientError::Status { status, message } => match status {
        StatusCode::NOT_FOUND => Self::NotFound(message),
        StatusCode::CONFLICT => Self::AlreadyExists(message),
        StatusCode::BAD_REQUEST => Self::InvalidInput(message),
        StatusCode::UNAUTHORIZED => Self::Unauthenticated,
        _ => Self::remote(ClientError::Status { status, message }),
      },
      other => Self::remote(other),
    }
  }
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpRemote {
  client:        Client,
  base_url:      String,
  poll_interval: Duration,
}

impl HttpRemote {
  pub fn new(base_url: impl Into<String>, poll_interval: Duration) -> Result<Self, ClientError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, base_url: base_url.into(), poll_interval })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  /// Turn a non-2xx response into [`ClientError::Status`], keeping the
  /// server's `{"error": ..}` message when there is one.
  async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
      .map(|b| b.error)
      .unwrap_or(text);
    Err(ClientError::Status { status, message })
  }

  async fn fetch<T: Document>(&self, req: RequestBuilder) -> Result<T, ClientError> {
    let resp = Self::check(req.send().await?).await?;
    let bytes = resp.bytes().await?;
    Ok(document::decode_slice(&bytes)?)
  }

  async fn execute(&self, req: RequestBuilder) -> Result<(), ClientError> {
    Self::check(req.send().await?).await?;
    Ok(())
  }

  /// Poll `load` every `poll_interval`, yielding the first result and then
  /// every result that differs from the previous one. Errors are always
  /// yielded.
  fn poll<T, F, Fut>(&self, load: F) -> impl Stream<Item = Result<T, ClientError>> + Send + 'static
  where
    T: PartialEq + Clone + Send + 'static,
    F: Fn(HttpRemote) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send,
  {
    let period = self.poll_interval;
    let init = (self.clone(), load, None::<T>, true);
    stream::unfold(init, move |(remote, load, mut last, mut first)| async move {
      loop {
        if !first {
          tokio::time::sleep(period).await;
        }
        first = false;
        match load(remote.clone()).await {
          Ok(value) if last.as_ref() == Some(&value) => continue,
          Ok(value) => {
            last = Some(value.clone());
            return Some((Ok(value), (remote, load, last, false)));
          }
          Err(e) => return Some((Err(e), (remote, load, last, false))),
        }
      }
    })
  }
}

impl Remote for HttpRemote {
  type Error = ClientError;

  // ── Self record ─────────────────────────────────────────────────────────

  async fn load_user(&self, user_id: Uuid) -> Result<User, ClientError> {
    self.fetch(self.client.get(self.url(&format!("/users/{user_id}")))).await
  }

  async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User, ClientError> {
    let req = self.client.patch(self.url(&format!("/users/{user_id}"))).json(&patch);
    self.fetch(req).await
  }

  fn stream_user(
    &self,
    user_id: Uuid,
  ) -> impl Stream<Item = Result<User, ClientError>> + Send + 'static {
    self.poll(move |remote| async move { remote.load_user(user_id).await })
  }

  // ── Contacts ────────────────────────────────────────────────────────────

  async fn load_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>, ClientError> {
    self.fetch(self.client.get(self.url(&format!("/users/{user_id}/contacts")))).await
  }

  fn stream_contacts(
    &self,
    user_id: Uuid,
  ) -> impl Stream<Item = Result<Vec<Contact>, ClientError>> + Send + 'static {
    self.poll(move |remote| async move { remote.load_contacts(user_id).await })
  }

  async fn lookup_user_by_code(&self, qr_code: Uuid) -> Result<Option<PeerProfile>, ClientError> {
    let req = self.client.get(self.url(&format!("/lookup/{qr_code}")));
    match self.fetch(req).await {
      Ok(profile) => Ok(Some(profile)),
      Err(ClientError::Status { status: StatusCode::NOT_FOUND, .. }) => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn add_contact_relation(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
    roles: Roles,
  ) -> Result<(), ClientError> {
    let body = json!({
      "peer_id": peer_id,
      "is_responder": roles.is_responder(),
      "is_dependent": roles.is_dependent(),
    });
    let req = self.client.post(self.url(&format!("/users/{user_id}/contacts"))).json(&body);
    self.execute(req).await
  }

  async fn update_contact_roles(
    &self,
    user_id: Uuid,
    peer_id: Uuid,
    roles: Roles,
  ) -> Result<(), ClientError> {
    let body = json!({
      "is_responder": roles.is_responder(),
      "is_dependent": roles.is_dependent(),
    });
    let req = self
      .client
      .put(self.url(&format!("/users/{user_id}/contacts/{peer_id}")))
      .json(&body);
    self.execute(req).await
  }

  async fn delete_contact_relation(&self, user_id: Uuid, peer_id: Uuid) -> Result<(), ClientError> {
    let req = self.client.delete(self.url(&format!("/users/{user_id}/contacts/{peer_id}")));
    self.execute(req).await
  }

  // ── Pings ───────────────────────────────────────────────────────────────

  async fn ping_dependent(&self, user_id: Uuid, peer_id: Uuid) -> Result<(), ClientError> {
    let req = self.client.post(self.url(&format!("/users/{user_id}/contacts/{peer_id}/ping")));
    self.execute(req).await
  }

  async fn clear_ping(&self, user_id: Uuid, peer_id: Uuid) -> Result<(), ClientError> {
    let req = self.client.delete(self.url(&format!("/users/{user_id}/contacts/{peer_id}/ping")));
    self.execute(req).await
  }

  async fn respond_to_ping(&self, user_id: Uuid, peer_id: Uuid) -> Result<(), ClientError> {
    let req =
      self.client.post(self.url(&format!("/users/{user_id}/contacts/{peer_id}/respond")));
    self.execute(req).await
  }

  async fn respond_to_all_pings(&self, user_id: Uuid) -> Result<(), ClientError> {
    let req = self.client.post(self.url(&format!("/users/{user_id}/pings/respond")));
    self.execute(req).await
  }
}
