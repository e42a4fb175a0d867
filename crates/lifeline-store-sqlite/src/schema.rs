//! SQL schema for the Lifeline SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id                TEXT PRIMARY KEY,
    name                   TEXT NOT NULL,
    phone_number           TEXT NOT NULL DEFAULT '',
    phone_region           TEXT NOT NULL DEFAULT 'US',
    note                   TEXT NOT NULL DEFAULT '',
    qr_code_id             TEXT NOT NULL UNIQUE,
    last_checked_in        TEXT NOT NULL,   -- RFC 3339 UTC
    check_in_interval_secs INTEGER NOT NULL CHECK (check_in_interval_secs > 0),
    notify_30_min_before   INTEGER NOT NULL DEFAULT 1,
    notify_2_hours_before  INTEGER NOT NULL DEFAULT 0,
    manual_alert_active    INTEGER NOT NULL DEFAULT 0,
    manual_alert_at        TEXT,
    notification_enabled   INTEGER NOT NULL DEFAULT 1,
    profile_complete       INTEGER NOT NULL DEFAULT 0,
    created_at             TEXT NOT NULL,
    last_updated           TEXT NOT NULL
);

-- One row per directional edge. The peer's display fields are joined from
-- `users` at read time rather than copied.
CREATE TABLE IF NOT EXISTS contacts (
    owner_id          TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    peer_id           TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    is_responder      INTEGER NOT NULL,
    is_dependent      INTEGER NOT NULL,
    has_incoming_ping INTEGER NOT NULL DEFAULT 0,
    incoming_ping_at  TEXT,
    has_outgoing_ping INTEGER NOT NULL DEFAULT 0,
    outgoing_ping_at  TEXT,
    added_at          TEXT NOT NULL,
    last_updated      TEXT NOT NULL,
    PRIMARY KEY (owner_id, peer_id),
    CHECK (is_responder OR is_dependent),
    CHECK (owner_id != peer_id)
);

CREATE INDEX IF NOT EXISTS contacts_peer_idx ON contacts(peer_id);

PRAGMA user_version = 1;
";
