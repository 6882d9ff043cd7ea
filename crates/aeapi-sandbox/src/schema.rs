//! SQL schema for the sandbox CRM.
//!
//! Table names follow the CRM's own so journal entries and ad-hoc queries read
//! familiarly.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS civicrm_extension (
    full_name  TEXT PRIMARY KEY,
    is_active  INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS civicrm_country (
    id        INTEGER PRIMARY KEY,
    iso_code  TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS civicrm_contact (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_type  TEXT NOT NULL,
    display_name  TEXT,
    email         TEXT,
    attributes    TEXT NOT NULL,   -- JSON object, exactly as created
    created_date  TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE TABLE IF NOT EXISTS civicrm_group (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name   TEXT NOT NULL UNIQUE,
    title  TEXT
);

CREATE TABLE IF NOT EXISTS civicrm_group_contact (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id  INTEGER NOT NULL REFERENCES civicrm_contact(id),
    group_id    INTEGER NOT NULL REFERENCES civicrm_group(id),
    status      TEXT NOT NULL,
    UNIQUE (contact_id, group_id)
);

CREATE TABLE IF NOT EXISTS civicrm_subscription_event (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id  INTEGER NOT NULL REFERENCES civicrm_contact(id),
    group_id    INTEGER NOT NULL REFERENCES civicrm_group(id),
    email       TEXT NOT NULL,
    hash        TEXT NOT NULL,
    time_stamp  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS civicrm_activity (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    source_contact_id  INTEGER NOT NULL REFERENCES civicrm_contact(id),
    activity_type      TEXT NOT NULL,
    subject            TEXT NOT NULL,
    status             TEXT NOT NULL,
    activity_date_time TEXT NOT NULL
);

-- One row per API call, in call order. Append-only.
CREATE TABLE IF NOT EXISTS api_journal (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    entity      TEXT NOT NULL,
    action      TEXT NOT NULL,
    params      TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

PRAGMA user_version = 1;
";
