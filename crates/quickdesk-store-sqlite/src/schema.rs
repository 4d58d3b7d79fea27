//! SQL schema for the QuickDesk SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,              -- argon2 PHC string
    role          TEXT NOT NULL DEFAULT 'requester',
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    category_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE COLLATE NOCASE
);

-- vote_count is derived: it always equals SUM(votes.value) for the ticket
-- and is only ever adjusted inside the same transaction as the vote row.
CREATE TABLE IF NOT EXISTS tickets (
    ticket_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    subject         TEXT NOT NULL,
    description     TEXT NOT NULL,
    category_id     INTEGER NOT NULL REFERENCES categories(category_id),
    created_by      INTEGER NOT NULL REFERENCES users(user_id),
    assigned_to     INTEGER REFERENCES users(user_id),
    status          TEXT NOT NULL DEFAULT 'open'
                    CHECK (status IN ('open', 'in_progress', 'resolved', 'closed')),
    attachment_path TEXT,
    vote_count      INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    updated_at      TEXT NOT NULL
);

-- At most one vote per (ticket, user); a repeated vote replaces the row.
CREATE TABLE IF NOT EXISTS votes (
    ticket_id  INTEGER NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    user_id    INTEGER NOT NULL REFERENCES users(user_id),
    value      INTEGER NOT NULL CHECK (value IN (-1, 1)),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (ticket_id, user_id)
);

-- Comments are strictly append-only.
-- No UPDATE is ever issued against this table.
CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id  INTEGER NOT NULL REFERENCES tickets(ticket_id) ON DELETE CASCADE,
    author_id  INTEGER NOT NULL REFERENCES users(user_id),
    message    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS tickets_updated_idx  ON tickets(updated_at, ticket_id);
CREATE INDEX IF NOT EXISTS tickets_status_idx   ON tickets(status);
CREATE INDEX IF NOT EXISTS tickets_creator_idx  ON tickets(created_by);
CREATE INDEX IF NOT EXISTS comments_ticket_idx  ON comments(ticket_id, comment_id);

PRAGMA user_version = 1;
";
