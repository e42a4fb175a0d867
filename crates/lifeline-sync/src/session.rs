//! [`Session`]: the signed-in user's handle on the mirror and the remote.

use std::{
  fmt::Display,
  sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use futures::{Stream, StreamExt as _};
use lifeline_core::{
  Error, Result,
  auth::Auth,
  checkin::{
    CheckInStatus, NotificationPreferences, ScheduledReminder, reminder_schedule,
  },
  clock::{Clock, SystemClock},
  contact::{Contact, Roles},
  event::Event,
  interval::CheckInInterval,
  remote::Remote,
  user::{User, UserPatch},
};
use tokio::{
  sync::{broadcast, watch},
  task::JoinHandle,
  time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  config::SessionConfig,
  expiry::ExpiryTracker,
  mirror::Mirror,
  state::{Action, State},
};

/// Owns the mirror and drives every user operation against the remote.
///
/// Cloning is cheap; clones share the mirror and the background tasks.
/// Background tasks are cancelled when the last clone is dropped.
pub struct Session<R, A> {
  inner: Arc<Inner<R, A>>,
}

struct Inner<R, A> {
  remote:   Arc<R>,
  auth:     Arc<A>,
  clock:    Arc<dyn Clock>,
  mirror:   Mirror,
  config:   SessionConfig,
  tracker:  Arc<Mutex<ExpiryTracker>>,
  tasks:    Mutex<Option<StreamTasks>>,
  follower: CancellationToken,
}

struct StreamTasks {
  cancel:  CancellationToken,
  handles: Vec<JoinHandle<()>>,
}

impl<R, A> Clone for Session<R, A> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<R, A> Drop for Inner<R, A> {
  fn drop(&mut self) {
    self.follower.cancel();
    let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
    if let Some(tasks) = tasks.take() {
      tasks.cancel.cancel();
    }
  }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn classify<E: Into<Error>>(e: E) -> Error { e.into() }

impl<R: Remote + 'static, A: Auth + 'static> Session<R, A> {
  pub fn new(remote: Arc<R>, auth: Arc<A>, config: SessionConfig) -> Self {
    Self::with_clock(remote, auth, Arc::new(SystemClock), config)
  }

  pub fn with_clock(
    remote: Arc<R>,
    auth: Arc<A>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
  ) -> Self {
    let mirror = Mirror::new(config.event_capacity);
    Self {
      inner: Arc::new(Inner {
        remote,
        auth,
        clock,
        mirror,
        config,
        tracker: Arc::new(Mutex::new(ExpiryTracker::default())),
        tasks: Mutex::new(None),
        follower: CancellationToken::new(),
      }),
    }
  }

  /// The signed-in user, or [`Error::Unauthenticated`].
  pub fn user_id(&self) -> Result<Uuid> {
    self.inner.auth.current_user_id().ok_or(Error::Unauthenticated)
  }

  pub fn now(&self) -> chrono::DateTime<chrono::Utc> { self.inner.clock.now() }

  // ─── Observation ───────────────────────────────────────────────────────

  pub fn state(&self) -> State { self.inner.mirror.snapshot() }

  pub fn subscribe(&self) -> watch::Receiver<State> { self.inner.mirror.subscribe() }

  pub fn events(&self) -> broadcast::Receiver<Event> { self.inner.mirror.events() }

  pub fn status(&self) -> Option<CheckInStatus> {
    let now = self.now();
    self.state().user.map(|u| u.status(now))
  }

  pub fn reminder_schedule(&self) -> Vec<ScheduledReminder> {
    let now = self.now();
    match self.state().user {
      Some(u) => reminder_schedule(&u.window(), &u.preferences(), now),
      None => Vec::new(),
    }
  }

  pub fn pending_pings_count(&self) -> usize { self.state().pending_pings_count() }

  pub fn non_responsive_dependents_count(&self) -> usize {
    self.state().non_responsive_dependents_count(self.now())
  }

  // ─── Loading ───────────────────────────────────────────────────────────

  pub async fn load_self(&self) -> Result<User> {
    let user_id = self.user_id()?;
    self.fetch_self(user_id).await
  }

  pub async fn load_contacts(&self) -> Result<Vec<Contact>> {
    let user_id = self.user_id()?;
    self.fetch_contacts(user_id).await
  }

  async fn fetch_self(&self, user_id: Uuid) -> Result<User> {
    let user = self.inner.remote.load_user(user_id).await.map_err(classify)?;
    self.inner.mirror.dispatch(Action::SelfLoaded(user.clone()));
    Ok(user)
  }

  async fn fetch_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>> {
    let contacts = self.inner.remote.load_contacts(user_id).await.map_err(classify)?;
    self.inner.mirror.dispatch(Action::ContactsLoaded(contacts.clone()));
    Ok(contacts)
  }

  async fn recover_self(&self, user_id: Uuid, err: Error) -> Error {
    tracing::warn!(%user_id, error = %err, "self write failed, reloading");
    if let Err(reload) = self.fetch_self(user_id).await {
      tracing::error!(%user_id, error = %reload, "reload after failed write");
    }
    err
  }

  async fn recover_contacts(&self, user_id: Uuid, err: Error) -> Error {
    tracing::warn!(%user_id, error = %err, "contact write failed, reloading");
    if let Err(reload) = self.fetch_contacts(user_id).await {
      tracing::error!(%user_id, error = %reload, "reload after failed write");
    }
    err
  }

  // ─── Self record ───────────────────────────────────────────────────────

  async fn patch_self(&self, patch: UserPatch) -> Result<()> {
    let user_id = self.user_id()?;
    self.inner.mirror.dispatch(Action::SelfPatched(patch.clone()));
    match self.inner.remote.update_user(user_id, patch).await {
      Ok(user) => {
        self.inner.mirror.dispatch(Action::SelfLoaded(user));
        Ok(())
      }
      Err(e) => Err(self.recover_self(user_id, classify(e)).await),
    }
  }

  /// Start a new check-in cycle at the current time.
  pub async fn check_in(&self) -> Result<()> {
    let now = self.now();
    tracing::info!(at = %now, "check in");
    self.patch_self(UserPatch::check_in(now)).await
  }

  /// May flip the current status retroactively; the window is re-derived
  /// from the existing `last_checked_in`.
  pub async fn update_check_in_interval(&self, interval: CheckInInterval) -> Result<()> {
    tracing::info!(%interval, "update interval");
    self.patch_self(UserPatch::interval(interval)).await
  }

  pub async fn update_notification_preferences(
    &self,
    prefs: NotificationPreferences,
  ) -> Result<()> {
    self.patch_self(UserPatch::preferences(prefs)).await
  }

  pub async fn set_manual_alert(&self, active: bool) -> Result<()> {
    tracing::info!(active, "manual alert");
    self.patch_self(UserPatch::manual_alert(active, self.now())).await
  }

  /// Profile edits. A blank name is rejected; setting a name also marks the
  /// profile complete.
  pub async fn update_fields(&self, mut patch: UserPatch) -> Result<()> {
    if let Some(name) = &patch.name {
      let name = name.trim();
      if name.is_empty() {
        return Err(Error::InvalidInput("name must not be empty".into()));
      }
      patch.name = Some(name.to_owned());
      patch.profile_complete = Some(true);
    }
    if patch.is_empty() {
      return Ok(());
    }
    self.patch_self(patch).await
  }

  // ─── Contacts ──────────────────────────────────────────────────────────

  /// Resolve `qr_code` and create the relationship in both directions.
  pub async fn add_contact(&self, qr_code: Uuid, roles: Roles) -> Result<Contact> {
    let user_id = self.user_id()?;
    let profile = self
      .inner
      .remote
      .lookup_user_by_code(qr_code)
      .await
      .map_err(classify)?
      .ok_or_else(|| Error::NotFound(format!("no user with code {qr_code}")))?;

    let peer_id = profile.user_id;
    if peer_id == user_id {
      return Err(Error::InvalidInput("cannot add yourself as a contact".into()));
    }
    if self.state().contact(peer_id).is_some() {
      return Err(Error::AlreadyExists(format!("contact {peer_id}")));
    }

    let contact = Contact::from_profile(&profile, roles, self.now());
    self.inner.mirror.dispatch(Action::ContactAdded(contact.clone()));
    if let Err(e) = self.inner.remote.add_contact_relation(user_id, peer_id, roles).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    tracing::info!(%user_id, %peer_id, ?roles, "contact added");

    // Pick up the peer's check-in fields the lookup does not carry.
    if let Err(e) = self.fetch_contacts(user_id).await {
      tracing::warn!(%user_id, error = %e, "refresh after add failed");
    }
    Ok(self.state().contact(peer_id).cloned().unwrap_or(contact))
  }

  pub async fn update_roles(
    &self,
    peer_id: Uuid,
    is_responder: bool,
    is_dependent: bool,
  ) -> Result<()> {
    let roles = Roles::new(is_responder, is_dependent)?;
    let user_id = self.user_id()?;
    let current = self.local_contact(peer_id)?;
    if current.roles == roles {
      return Ok(());
    }

    self.inner.mirror.dispatch(Action::RolesChanged { peer_id, roles });
    if let Err(e) = self.inner.remote.update_contact_roles(user_id, peer_id, roles).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    tracing::info!(%user_id, %peer_id, ?roles, "roles updated");
    Ok(())
  }

  pub async fn remove_contact(&self, peer_id: Uuid) -> Result<()> {
    let user_id = self.user_id()?;
    self.inner.mirror.dispatch(Action::ContactRemoved(peer_id));
    if let Err(e) = self.inner.remote.delete_contact_relation(user_id, peer_id).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    tracing::info!(%user_id, %peer_id, "contact removed");
    Ok(())
  }

  fn local_contact(&self, peer_id: Uuid) -> Result<Contact> {
    self
      .state()
      .contact(peer_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("contact {peer_id}")))
  }

  // ─── Pings ─────────────────────────────────────────────────────────────

  /// Ask a dependent to check in. A second ping while one is pending is a
  /// no-op.
  pub async fn ping_dependent(&self, peer_id: Uuid) -> Result<()> {
    let user_id = self.user_id()?;
    let contact = self.local_contact(peer_id)?;
    if !contact.is_dependent() {
      return Err(Error::InvalidInput(format!("{} is not a dependent", contact.name)));
    }
    if contact.has_outgoing_ping {
      tracing::debug!(%peer_id, "ping already pending");
      return Ok(());
    }

    self.inner.mirror.dispatch(Action::PingSent { peer_id, at: self.now() });
    if let Err(e) = self.inner.remote.ping_dependent(user_id, peer_id).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    tracing::info!(%user_id, %peer_id, "pinged");
    Ok(())
  }

  /// Cancel an outgoing ping.
  pub async fn clear_ping(&self, peer_id: Uuid) -> Result<()> {
    let user_id = self.user_id()?;
    if !self.local_contact(peer_id)?.has_outgoing_ping {
      return Ok(());
    }

    self.inner.mirror.dispatch(Action::PingCleared(peer_id));
    if let Err(e) = self.inner.remote.clear_ping(user_id, peer_id).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    Ok(())
  }

  /// Answer an incoming ping from `peer_id`.
  pub async fn respond_to_ping(&self, peer_id: Uuid) -> Result<()> {
    let user_id = self.user_id()?;
    if !self.local_contact(peer_id)?.has_incoming_ping {
      return Ok(());
    }

    self.inner.mirror.dispatch(Action::PingAnswered(peer_id));
    if let Err(e) = self.inner.remote.respond_to_ping(user_id, peer_id).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    tracing::info!(%user_id, %peer_id, "responded to ping");
    Ok(())
  }

  /// Answer every incoming ping in one remote call.
  pub async fn respond_to_all_pings(&self) -> Result<()> {
    let user_id = self.user_id()?;
    self.inner.mirror.dispatch(Action::AllPingsAnswered);
    if let Err(e) = self.inner.remote.respond_to_all_pings(user_id).await {
      return Err(self.recover_contacts(user_id, classify(e)).await);
    }
    tracing::info!(%user_id, "responded to all pings");
    Ok(())
  }

  // ─── Background tasks ──────────────────────────────────────────────────

  /// Re-derive time-driven transitions now and publish any new events.
  pub fn poll_expiry(&self) -> Vec<Event> {
    observe_expiry(&self.inner.mirror, &self.inner.tracker, self.now())
  }

  /// Spawn the user stream, contacts stream and expiry watcher, replacing
  /// any that are already running.
  pub fn start_streams(&self) -> Result<()> {
    let user_id = self.user_id()?;
    let inner = &self.inner;
    let mut tasks = lock(&inner.tasks);
    if let Some(previous) = tasks.take() {
      previous.cancel.cancel();
    }

    let cancel = CancellationToken::new();
    let handles = vec![
      spawn_stream(
        "user",
        cancel.child_token(),
        inner.remote.stream_user(user_id),
        inner.mirror.clone(),
        Action::SelfLoaded,
      ),
      spawn_stream(
        "contacts",
        cancel.child_token(),
        inner.remote.stream_contacts(user_id),
        inner.mirror.clone(),
        Action::ContactsLoaded,
      ),
      spawn_expiry_watcher(
        cancel.child_token(),
        inner.mirror.clone(),
        inner.tracker.clone(),
        inner.clock.clone(),
        inner.config.expiry_poll_interval(),
      ),
    ];
    tracing::info!(%user_id, "streams started");
    *tasks = Some(StreamTasks { cancel, handles });
    Ok(())
  }

  pub fn is_streaming(&self) -> bool { lock(&self.inner.tasks).is_some() }

  /// Cancel the background tasks and wait for them to exit.
  pub async fn stop_streams(&self) {
    let Some(tasks) = lock(&self.inner.tasks).take() else { return };
    tasks.cancel.cancel();
    for handle in tasks.handles {
      if let Err(e) = handle.await {
        tracing::warn!(error = %e, "stream task did not exit cleanly");
      }
    }
    tracing::info!("streams stopped");
  }

  /// Load everything and start listening. Used at startup when a user is
  /// already signed in, and after every sign-in.
  pub async fn resume(&self) -> Result<()> {
    let user_id = self.user_id()?;
    self.fetch_self(user_id).await?;
    self.fetch_contacts(user_id).await?;
    self.start_streams()
  }

  pub async fn sign_out(&self) {
    self.teardown().await;
    self.inner.auth.sign_out();
  }

  async fn teardown(&self) {
    self.stop_streams().await;
    lock(&self.inner.tracker).reset();
    self.inner.mirror.dispatch(Action::SignedOut);
  }

  /// React to auth changes: resume on sign-in, tear down on sign-out.
  ///
  /// The task holds only a weak reference and ends with the session.
  pub fn follow_auth(&self) -> JoinHandle<()> {
    let weak: Weak<Inner<R, A>> = Arc::downgrade(&self.inner);
    let changes = self.inner.auth.auth_changes();
    let cancel = self.inner.follower.clone();

    tokio::spawn(async move {
      let mut changes = std::pin::pin!(changes);
      loop {
        let change = tokio::select! {
          _ = cancel.cancelled() => break,
          change = changes.next() => change,
        };
        let Some(change) = change else { break };
        let Some(inner) = weak.upgrade() else { break };
        let session = Session { inner };

        match change {
          Some(user_id) => {
            // A different account: nothing of the previous one may survive.
            if session.state().user.map(|u| u.user_id) != Some(user_id) {
              session.teardown().await;
            }
            if let Err(e) = session.resume().await {
              tracing::error!(%user_id, error = %e, "failed to resume after sign-in");
            }
          }
          None => session.teardown().await,
        }
      }
      tracing::debug!("auth follower stopped");
    })
  }
}

// ─── Task bodies ─────────────────────────────────────────────────────────────

fn observe_expiry(
  mirror: &Mirror,
  tracker: &Mutex<ExpiryTracker>,
  now: chrono::DateTime<chrono::Utc>,
) -> Vec<Event> {
  // Snapshot under the tracker lock so observations are never reordered.
  let mut tracker = lock(tracker);
  let events = tracker.observe(&mirror.snapshot(), now);
  for event in &events {
    mirror.publish(event.clone());
  }
  events
}

fn spawn_stream<S, T, E, F>(
  name: &'static str,
  cancel: CancellationToken,
  stream: S,
  mirror: Mirror,
  to_action: F,
) -> JoinHandle<()>
where
  S: Stream<Item = std::result::Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Display + Send + 'static,
  F: Fn(T) -> Action + Send + 'static,
{
  tokio::spawn(async move {
    let mut stream = std::pin::pin!(stream);
    loop {
      let item = tokio::select! {
        _ = cancel.cancelled() => break,
        item = stream.next() => item,
      };
      match item {
        Some(Ok(value)) => mirror.dispatch(to_action(value)),
        // Keep listening; the next delivery replaces whatever was missed.
        Some(Err(e)) => tracing::warn!(stream = name, error = %e, "stream error"),
        None => {
          tracing::debug!(stream = name, "stream ended");
          break;
        }
      }
    }
  })
}

fn spawn_expiry_watcher(
  cancel: CancellationToken,
  mirror: Mirror,
  tracker: Arc<Mutex<ExpiryTracker>>,
  clock: Arc<dyn Clock>,
  period: std::time::Duration,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut state = mirror.subscribe();
    loop {
      tokio::select! {
        _ = cancel.cancelled() => break,
        _ = ticker.tick() => {}
        changed = state.changed() => {
          if changed.is_err() {
            break;
          }
        }
      }
      observe_expiry(&mirror, &tracker, clock.now());
    }
  })
}
