//! [`SqliteStore`]: the SQLite implementation of [`Remote`].

use std::path::Path;

use chrono::Utc;
use futures::{Stream, stream};
use lifeline_core::{
  contact::{Contact, Roles},
  remote::Remote,
  user::{NewUser, PeerProfile, User, UserPatch},
};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    CONTACT_COLUMNS, RawContact, RawUser, USER_COLUMNS, decode_uuid, encode_dt, encode_patch,
    encode_uuid,
  },
  notify::ChangeHub,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Lifeline backend stored in a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change hub are
/// reference-counted, and clones share both.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: ChangeHub,
}

/// Result of the existence checks run inside the add-contact transaction.
enum AddOutcome {
  Added,
  UserMissing(Uuid),
  Exists,
}

/// Result of the checks run inside the ping transaction.
enum PingOutcome {
  Sent,
  AlreadyPending,
  Missing,
  NotDependent,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, changes: ChangeHub::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, changes: ChangeHub::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Provision an account. The store assigns the user id and QR code; the
  /// first check-in is the moment of creation.
  pub async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = Utc::now();
    let user = User {
      user_id:               Uuid::new_v4(),
      profile_complete:      !input.name.trim().is_empty(),
      name:                  input.name,
      phone_number:          input.phone_number,
      phone_region:          input.phone_region,
      note:                  String::new(),
      qr_code_id:            Uuid::new_v4(),
      last_checked_in:       now,
      check_in_interval:     input.check_in_interval,
      notify_30_min_before:  true,
      notify_2_hours_before: false,
      manual_alert_active:   false,
      manual_alert_at:       None,
      notification_enabled:  true,
      last_updated:          now,
    };

    let id_str   = encode_uuid(user.user_id);
    let qr_str   = encode_uuid(user.qr_code_id);
    let now_str  = encode_dt(now);
    let name     = user.name.clone();
    let phone    = user.phone_number.clone();
    let region   = user.phone_region.clone();
    let interval = user.check_in_interval.as_secs();
    let complete = user.profile_complete;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (
             user_id, name, phone_number, phone_region, qr_code_id,
             last_checked_in, check_in_interval_secs, profile_complete,
             created_at, last_updated
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?6, ?6)",
          rusqlite::params![id_str, name, phone, region, qr_str, now_str, interval, complete],
        )?;
        Ok(())
      })
      .await?;

    tracing::info!(user_id = %user.user_id, "created user");
    Ok(user)
  }

  /// Change stream shared by [`Remote::stream_user`] and
  /// [`Remote::stream_contacts`]: yield `load(store)` now and after every
  /// change notification for `user_id`.
  fn watch<T, F, Fut>(&self, user_id: Uuid, load: F) -> impl Stream<Item = Result<T>> + Send + 'static
  where
    T: Send + 'static,
    F: Fn(SqliteStore) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let rx = self.changes.subscribe(user_id);
    stream::unfold((self.clone(), rx, true), move |(store, mut rx, first)| {
      let next = load(store.clone());
      async move {
        if !first && rx.changed().await.is_err() {
          return None;
        }
        let _seen = *rx.borrow_and_update();
        let item = next.await;
        Some((item, (store, rx, false)))
      }
    })
  }
}

// ─── SQL helpers ─────────────────────────────────────────────────────────────

fn user_exists(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM users WHERE user_id = ?1", [id], |_| Ok(true))
      .optional()?
      .unwrap_or(false),
  )
}

/// Insert an edge, or overwrite the roles of an existing one.
fn upsert_edge(
  conn:  &rusqlite::Connection,
  owner: &str,
  peer:  &str,
  roles: Roles,
  now:   &str,
) -> rusqlite::Result<usize> {
  conn.execute(
    "INSERT INTO contacts (owner_id, peer_id, is_responder, is_dependent, added_at, last_updated)
     VALUES (?1, ?2, ?3, ?4, ?5, ?5)
     ON CONFLICT (owner_id, peer_id) DO UPDATE SET
       is_responder = excluded.is_responder,
       is_dependent = excluded.is_dependent,
       last_updated = excluded.last_updated",
    rusqlite::params![owner, peer, roles.is_responder(), roles.is_dependent(), now],
  )
}

/// Drop ping flags the current roles no longer allow: only a dependent can
/// be pinged, so only a responder can have pinged us.
fn clear_stale_pings(conn: &rusqlite::Connection, a: &str, b: &str) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE contacts SET has_outgoing_ping = 0, outgoing_ping_at = NULL
     WHERE is_dependent = 0 AND has_outgoing_ping = 1
       AND ((owner_id = ?1 AND peer_id = ?2) OR (owner_id = ?2 AND peer_id = ?1))",
    [a, b],
  )?;
  conn.execute(
    "UPDATE contacts SET has_incoming_ping = 0, incoming_ping_at = NULL
     WHERE is_responder = 0 AND has_incoming_ping = 1
       AND ((owner_id = ?1 AND peer_id = ?2) OR (owner_id = ?2 AND peer_id = ?1))",
    [a, b],
  )?;
  Ok(())
}

/// Clear a ping from `sender` to `receiver` on both edges. Returns the
/// number of rows that actually changed.
fn clear_ping_pair(
  conn:     &rusqlite::Connection,
  sender:   &str,
  receiver: &str,
  now:      &str,
) -> rusqlite::Result<usize> {
  let outgoing = conn.execute(
    "UPDATE contacts SET has_outgoing_ping = 0, outgoing_ping_at = NULL, last_updated = ?3
     WHERE owner_id = ?1 AND peer_id = ?2 AND has_outgoing_ping = 1",
    [sender, receiver, now],
  )?;
  let incoming = conn.execute(
    "UPDATE contacts SET has_incoming_ping = 0, incoming_ping_at = NULL, last_updated = ?3
     WHERE owner_id = ?2 AND peer_id = ?1 AND has_incoming_ping = 1",
    [sender, receiver, now],
  )?;
  Ok(outgoing + incoming)
}

impl SqliteStore {
  async fn clear_ping_between(&self, sender: Uuid, receiver: Uuid) -> Result<()> {
    let sender_str   = encode_uuid(sender);
    let receiver_str = encode_uuid(receiver);
    let now_str      = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = clear_ping_pair(&tx, &sender_str, &receiver_str, &now_str)?;
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    if changed > 0 {
      tracing::debug!(%sender, %receiver, "cleared ping");
      self.changes.notify([sender, receiver]);
    }
    Ok(())
  }
}

// ─── Remote impl ─────────────────────────────────────────────────────────────

impl Remote for SqliteStore {
  type Error = Error;

  // ── Self record ───────────────────────────────────────────────────────────

  async fn load_user(&self, user_id: Uuid) -> Result<User> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              [id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.ok_or(Error::UserNotFound(user_id))?.into_user()
  }

  async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User> {
    let cols    = encode_patch(&patch);
    let id_str  = encode_uuid(user_id);
    let now_str = encode_dt(Utc::now());

    let watchers: Option<Vec<String>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut assignments: Vec<String> = cols
          .iter()
          .enumerate()
          .map(|(i, (col, _))| format!("{col} = ?{}", i + 1))
          .collect();
        assignments.push(format!("last_updated = ?{}", cols.len() + 1));
        let sql = format!(
          "UPDATE users SET {} WHERE user_id = ?{}",
          assignments.join(", "),
          cols.len() + 2
        );

        let mut values: Vec<Value> = cols.into_iter().map(|(_, v)| v).collect();
        values.push(Value::Text(now_str));
        values.push(Value::Text(id_str.clone()));

        if tx.execute(&sql, rusqlite::params_from_iter(values))? == 0 {
          return Ok(None);
        }

        // Everyone holding an edge to this user sees the change in their
        // cached contact snapshot.
        let owners = {
          let mut stmt = tx.prepare("SELECT owner_id FROM contacts WHERE peer_id = ?1")?;
          stmt
            .query_map([&id_str], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok(Some(owners))
      })
      .await?;

    let watchers = watchers.ok_or(Error::UserNotFound(user_id))?;
    let mut notify = vec![user_id];
    for owner in &watchers {
      notify.push(decode_uuid(owner)?);
    }
    self.changes.notify(notify);

    tracing::debug!(%user_id, ?patch, "updated user");
    self.load_user(user_id).await
  }

  fn stream_user(&self, user_id: Uuid) -> impl Stream<Item = Result<User>> + Send + 'static {
    self.watch(user_id, move |store| async move { store.load_user(user_id).await })
  }

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn load_contacts(&self, user_id: Uuid) -> Result<Vec<Contact>> {
    let id_str = encode_uuid(user_id);

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLUMNS}
           FROM contacts c
           JOIN users u ON u.user_id = c.peer_id
           WHERE c.owner_id = ?1
           ORDER BY c.added_at, c.peer_id"
        ))?;
        let rows = stmt
          .query_map([id_str], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }

  fn stream_contacts(
    &self,
    user_id: Uuid,
  ) -> impl Stream<Item = Result<Vec<Contact>>> + Send + 'static {
    self.watch(user_id, move |store| async move { store.load_contacts(user_id).await })
  }

  async fn lookup_user_by_code(&self, qr_code: Uuid) -> Result<Option<PeerProfile>> {
    let code_str = encode_uuid(qr_code);

    let raw: Option<(String, String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, name, phone_number, note FROM users WHERE qr_code_id = ?1",
              [code_str],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(user_id, name, phone_number, note)| {
        Ok(PeerProfile { user_id: decode_uuid(&user_id)?, name, phone_number, note })
      })
      .transpose()
  }

  async fn add_contact_relation(&self, user_id: Uuid, peer_id: Uuid, roles: Roles) -> Result<()> {
    if user_id == peer_id {
      return Err(Error::SelfRelation);
    }

    let owner_str = encode_uuid(user_id);
    let peer_str  = encode_uuid(peer_id);
    let now_str   = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !user_exists(&tx, &owner_str)? {
          return Ok(AddOutcome::UserMissing(user_id));
        }
        if !user_exists(&tx, &peer_str)? {
          return Ok(AddOutcome::UserMissing(peer_id));
        }

        let exists = tx
          .query_row(
            "SELECT 1 FROM contacts WHERE owner_id = ?1 AND peer_id = ?2",
            [&owner_str, &peer_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          return Ok(AddOutcome::Exists);
        }

        upsert_edge(&tx, &owner_str, &peer_str, roles, &now_str)?;
        upsert_edge(&tx, &peer_str, &owner_str, roles.mirrored(), &now_str)?;
        clear_stale_pings(&tx, &owner_str, &peer_str)?;

        tx.commit()?;
        Ok(AddOutcome::Added)
      })
      .await?;

    match outcome {
      AddOutcome::Added => {
        tracing::info!(%user_id, %peer_id, ?roles, "added contact relation");
        self.changes.notify([user_id, peer_id]);
        Ok(())
      }
      AddOutcome::UserMissing(id) => Err(Error::UserNotFound(id)),
      AddOutcome::Exists => Err(Error::ContactExists { owner: user_id, peer: peer_id }),
    }
  }

  async fn update_contact_roles(&self, user_id: Uuid, peer_id: Uuid, roles: Roles) -> Result<()> {
    let owner_str = encode_uuid(user_id);
    let peer_str  = encode_uuid(peer_id);
    let now_str   = encode_dt(Utc::now());

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let changed = tx.execute(
          "UPDATE contacts SET is_responder = ?3, is_dependent = ?4, last_updated = ?5
           WHERE owner_id = ?1 AND peer_id = ?2",
          rusqlite::params![
            owner_str,
            peer_str,
            roles.is_responder(),
            roles.is_dependent(),
            now_str
          ],
        )?;
        if changed == 0 {
          return Ok(false);
        }

        upsert_edge(&tx, &peer_str, &owner_str, roles.mirrored(), &now_str)?;
        clear_stale_pings(&tx, &owner_str, &peer_str)?;

        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::ContactNotFound { owner: user_id, peer: peer_id });
    }

    tracing::info!(%user_id, %peer_id, ?roles, "updated contact roles");
    self.changes.notify([user_id, peer_id]);
    Ok(())
  }

  async fn delete_contact_relation(&self, user_id: Uuid, peer_id: Uuid) -> Result<()> {
    let owner_str = encode_uuid(user_id);
    let peer_str  = encode_uuid(peer_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM contacts
           WHERE (owner_id = ?1 AND peer_id = ?2) OR (owner_id = ?2 AND peer_id = ?1)",
          [owner_str, peer_str],
        )?)
      })
      .await?;

    if deleted > 0 {
      tracing::info!(%user_id, %peer_id, "deleted contact relation");
      self.changes.notify([user_id, peer_id]);
    }
    Ok(())
  }

  // ── Pings ─────────────────────────────────────────────────────────────────

  async fn ping_dependent(&self, user_id: Uuid, peer_id: Uuid) -> Result<()> {
    let owner_str = encode_uuid(user_id);
    let peer_str  = encode_uuid(peer_id);
    let now_str   = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let edge: Option<(bool, bool)> = tx
          .query_row(
            "SELECT is_dependent, has_outgoing_ping FROM contacts
             WHERE owner_id = ?1 AND peer_id = ?2",
            [&owner_str, &peer_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        let outcome = match edge {
          None => PingOutcome::Missing,
          Some((false, _)) => PingOutcome::NotDependent,
          Some((true, true)) => PingOutcome::AlreadyPending,
          Some((true, false)) => {
            tx.execute(
              "UPDATE contacts SET has_outgoing_ping = 1, outgoing_ping_at = ?3, last_updated = ?3
               WHERE owner_id = ?1 AND peer_id = ?2",
              [&owner_str, &peer_str, &now_str],
            )?;
            tx.execute(
              "UPDATE contacts SET has_incoming_ping = 1, incoming_ping_at = ?3, last_updated = ?3
               WHERE owner_id = ?2 AND peer_id = ?1",
              [&owner_str, &peer_str, &now_str],
            )?;
            PingOutcome::Sent
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    match outcome {
      PingOutcome::Sent => {
        tracing::info!(%user_id, %peer_id, "pinged dependent");
        self.changes.notify([user_id, peer_id]);
        Ok(())
      }
      PingOutcome::AlreadyPending => Ok(()),
      PingOutcome::Missing => Err(Error::ContactNotFound { owner: user_id, peer: peer_id }),
      PingOutcome::NotDependent => Err(Error::NotDependent { owner: user_id, peer: peer_id }),
    }
  }

  async fn clear_ping(&self, user_id: Uuid, peer_id: Uuid) -> Result<()> {
    self.clear_ping_between(user_id, peer_id).await
  }

  async fn respond_to_ping(&self, user_id: Uuid, peer_id: Uuid) -> Result<()> {
    self.clear_ping_between(peer_id, user_id).await
  }

  async fn respond_to_all_pings(&self, user_id: Uuid) -> Result<()> {
    let owner_str = encode_uuid(user_id);
    let now_str   = encode_dt(Utc::now());

    let senders: Vec<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let senders = {
          let mut stmt = tx.prepare(
            "SELECT peer_id FROM contacts WHERE owner_id = ?1 AND has_incoming_ping = 1",
          )?;
          stmt
            .query_map([&owner_str], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        for sender in &senders {
          clear_ping_pair(&tx, sender, &owner_str, &now_str)?;
        }

        tx.commit()?;
        Ok(senders)
      })
      .await?;

    if senders.is_empty() {
      return Ok(());
    }

    let mut notify = vec![user_id];
    for sender in &senders {
      notify.push(decode_uuid(sender)?);
    }
    tracing::info!(%user_id, count = senders.len(), "responded to all pings");
    self.changes.notify(notify);
    Ok(())
  }
}
