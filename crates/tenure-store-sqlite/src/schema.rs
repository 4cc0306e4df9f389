//! SQL schema for the tenure SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS entities (
    entity_id  TEXT PRIMARY KEY,
    kind       TEXT NOT NULL,   -- 'wrestler' | 'tag_team' | 'manager' | 'stable' | 'title'
    status     TEXT NOT NULL DEFAULT 'unemployed',  -- cached derived status
    created_at TEXT NOT NULL
);

-- Periods are inserted open; the only mutation a row ever receives is its
-- ended_at being set. History rows are never rewritten.
CREATE TABLE IF NOT EXISTS periods (
    period_id  TEXT PRIMARY KEY,
    owner_id   TEXT NOT NULL REFERENCES entities(entity_id) ON DELETE CASCADE,
    owner_kind TEXT NOT NULL,
    kind       TEXT NOT NULL,   -- discriminant of PeriodKind
    group_id   TEXT REFERENCES entities(entity_id),  -- membership counterpart
    started_at TEXT NOT NULL,   -- ISO 8601 UTC
    ended_at   TEXT             -- NULL while the period is open
);

-- At most one open period per (owner, kind, group). This is the invariant
-- the whole engine leans on; the index makes it hold even under concurrent
-- writers the engine never saw.
CREATE UNIQUE INDEX IF NOT EXISTS periods_open_idx
    ON periods(owner_id, kind, COALESCE(group_id, ''))
    WHERE ended_at IS NULL;

CREATE INDEX IF NOT EXISTS periods_owner_idx ON periods(owner_id, kind);
CREATE INDEX IF NOT EXISTS periods_group_idx ON periods(group_id)
    WHERE group_id IS NOT NULL;

PRAGMA user_version = 1;
";
