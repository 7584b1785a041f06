//! v001 -- Initial schema creation.
//!
//! Creates the `documents` table that backs every collection, plus the
//! `accounts` and `auth_tokens` tables used by the local identity provider.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Documents
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS documents (
    path       TEXT PRIMARY KEY NOT NULL,   -- full document path
    collection TEXT NOT NULL,               -- path minus the last segment
    doc_id     TEXT NOT NULL,               -- last path segment
    data       TEXT NOT NULL,               -- JSON object
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

CREATE INDEX IF NOT EXISTS idx_documents_collection
    ON documents(collection);

-- ----------------------------------------------------------------
-- Accounts (local identity provider)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    uid           TEXT PRIMARY KEY NOT NULL,
    email         TEXT UNIQUE,                -- NULL for anonymous accounts
    display_name  TEXT,
    password_salt TEXT,                       -- hex
    password_hash TEXT,                       -- hex BLAKE3
    is_anonymous  INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS auth_tokens (
    token     TEXT PRIMARY KEY NOT NULL,
    uid       TEXT NOT NULL,
    issued_at TEXT NOT NULL,

    FOREIGN KEY (uid) REFERENCES accounts(uid) ON DELETE CASCADE
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
