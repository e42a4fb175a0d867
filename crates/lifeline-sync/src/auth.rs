//! [`LocalAuth`]: an in-process [`Auth`] implementation.
//!
//! Holds the signed-in user id behind a watch channel. Whatever performs the
//! real sign-in flow calls [`LocalAuth::sign_in`] with the id it obtained.

use std::sync::Arc;

use futures::{Stream, stream};
use lifeline_core::auth::Auth;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Clone)]
pub struct LocalAuth {
  state: Arc<watch::Sender<Option<Uuid>>>,
}

impl LocalAuth {
  pub fn signed_out() -> Self {
    let (state, _) = watch::channel(None);
    Self { state: Arc::new(state) }
  }

  pub fn signed_in(user_id: Uuid) -> Self {
    let auth = Self::signed_out();
    auth.sign_in(user_id);
    auth
  }

  pub fn sign_in(&self, user_id: Uuid) {
    tracing::info!(%user_id, "signed in");
    self.state.send_replace(Some(user_id));
  }
}

impl Auth for LocalAuth {
  fn current_user_id(&self) -> Option<Uuid> { *self.state.borrow() }

  fn sign_out(&self) {
    tracing::info!("signed out");
    self.state.send_replace(None);
  }

  fn auth_changes(&self) -> impl Stream<Item = Option<Uuid>> + Send + 'static {
    let rx = self.state.subscribe();
    stream::unfold((rx, true), |(mut rx, first)| async move {
      if !first && rx.changed().await.is_err() {
        return None;
      }
      let current = *rx.borrow_and_update();
      Some((current, (rx, false)))
    })
  }
}
