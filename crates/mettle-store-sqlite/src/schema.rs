//! SQL schema for the score store.
//!
//! `PRAGMA user_version` gates initialization: 0 means a fresh file, 1 means
//! this schema. [`SqliteStore::create`](crate::SqliteStore::create) refuses
//! to run against anything but a fresh file.

/// Schema version written after DDL execution.
pub const SCHEMA_VERSION: i64 = 1;

/// Full schema DDL. Dimension tables (repositories, package_systems,
/// check_names) normalise the strings the fact tables join on; fact tables
/// carry natural keys only.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE repositories (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE    -- canonical host/org/name
);

CREATE TABLE package_systems (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE    -- 'go' | 'npm' | 'cargo' | ...
);

-- A package may map to several repositories; the key is the whole triple.
-- Rows are never updated or deleted outside a wholesale rebuild.
CREATE TABLE packages (
    system_id     INTEGER NOT NULL REFERENCES package_systems(id),
    name          TEXT    NOT NULL,
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    PRIMARY KEY (system_id, name, repository_id)
);

-- At most one aggregate score per repository; later writes replace.
CREATE TABLE scores (
    repository_id INTEGER PRIMARY KEY REFERENCES repositories(id),
    score         REAL NOT NULL
);

CREATE TABLE check_names (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- One value per (check, repository); later writes replace.
CREATE TABLE check_scores (
    check_name_id INTEGER NOT NULL REFERENCES check_names(id),
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    score         INTEGER NOT NULL,
    PRIMARY KEY (check_name_id, repository_id)
);

CREATE INDEX packages_identity_idx ON packages(system_id, name);

PRAGMA user_version = 1;
";
