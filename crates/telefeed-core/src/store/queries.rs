//! SQL for each supported database.
//!
//! Timestamps are `BIGINT` Unix milliseconds. Upserts keep timestamps strictly
//! increasing per row (`max(new, old + 1)`), so a later write always wins.

use super::backend::DatabaseType;

/// One statement in both dialects.
#[derive(Clone, Copy, Debug)]
pub struct Sql {
    pub pg: &'static str,
    pub sqlite: &'static str,
}

impl Sql {
    pub fn get(&self, db: DatabaseType) -> &'static str {
        match db {
            DatabaseType::PostgreSQL => self.pg,
            DatabaseType::SQLite => self.sqlite,
        }
    }
}

pub const SCHEMA_PG: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS user_licenses (
    user_id BIGINT PRIMARY KEY,
    license_code VARCHAR(255) NOT NULL,
    validated_at BIGINT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE
)"#,
    r#"
CREATE TABLE IF NOT EXISTS user_connections (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    connected_at BIGINT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    UNIQUE (user_id, phone_number)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS redirections (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    source_chat_id BIGINT NOT NULL,
    destination_chat_id BIGINT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at BIGINT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS transformations (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    transformation_type VARCHAR(50) NOT NULL,
    settings JSONB NOT NULL DEFAULT '{}'::jsonb,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at BIGINT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS whitelist_filters (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    filter_name VARCHAR(100) NOT NULL,
    filter_value TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at BIGINT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS blacklist_filters (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    filter_name VARCHAR(100) NOT NULL,
    filter_value TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at BIGINT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS user_sessions (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    phone_number VARCHAR(20) NOT NULL,
    session_file VARCHAR(255) NOT NULL,
    last_activity BIGINT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    UNIQUE (user_id, phone_number)
)"#,
    "CREATE INDEX IF NOT EXISTS idx_redirections_user ON redirections (user_id, active)",
];

pub const SCHEMA_SQLITE: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS user_licenses (
    user_id INTEGER PRIMARY KEY,
    license_code TEXT NOT NULL,
    validated_at INTEGER NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1
)"#,
    r#"
CREATE TABLE IF NOT EXISTS user_connections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    connected_at INTEGER NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    UNIQUE (user_id, phone_number)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS redirections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    source_chat_id INTEGER NOT NULL,
    destination_chat_id INTEGER NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS transformations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    transformation_type TEXT NOT NULL,
    settings TEXT NOT NULL DEFAULT '{}',
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS whitelist_filters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    filter_name TEXT NOT NULL,
    filter_value TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS blacklist_filters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    filter_name TEXT NOT NULL,
    filter_value TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    phone_number TEXT NOT NULL,
    session_file TEXT NOT NULL,
    last_activity INTEGER NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    UNIQUE (user_id, phone_number)
)"#,
    "CREATE INDEX IF NOT EXISTS idx_redirections_user ON redirections (user_id, active)",
];

pub const PING: Sql = Sql {
    pg: "SELECT 1",
    sqlite: "SELECT 1",
};

// Licenses

pub const UPSERT_LICENSE: Sql = Sql {
    pg: r#"
INSERT INTO user_licenses (user_id, license_code, validated_at, active)
VALUES ($1, $2, $3, TRUE)
ON CONFLICT (user_id) DO UPDATE SET
    license_code = EXCLUDED.license_code,
    validated_at = EXCLUDED.validated_at,
    active = EXCLUDED.active
"#,
    sqlite: r#"
INSERT INTO user_licenses (user_id, license_code, validated_at, active)
VALUES (?, ?, ?, 1)
ON CONFLICT (user_id) DO UPDATE SET
    license_code = excluded.license_code,
    validated_at = excluded.validated_at,
    active = excluded.active
"#,
};

pub const FIND_LICENSE: Sql = Sql {
    pg: "SELECT user_id, license_code, validated_at, active FROM user_licenses WHERE user_id = $1",
    sqlite: "SELECT user_id, license_code, validated_at, active FROM user_licenses WHERE user_id = ?",
};

pub const SET_LICENSE_ACTIVE: Sql = Sql {
    pg: "UPDATE user_licenses SET active = $1 WHERE user_id = $2",
    sqlite: "UPDATE user_licenses SET active = ? WHERE user_id = ?",
};

// Connections

pub const UPSERT_CONNECTION: Sql = Sql {
    pg: r#"
INSERT INTO user_connections (user_id, phone_number, connected_at, active)
VALUES ($1, $2, $3, TRUE)
ON CONFLICT (user_id, phone_number) DO UPDATE SET
    connected_at = GREATEST(EXCLUDED.connected_at, user_connections.connected_at + 1),
    active = TRUE
"#,
    sqlite: r#"
INSERT INTO user_connections (user_id, phone_number, connected_at, active)
VALUES (?, ?, ?, 1)
ON CONFLICT (user_id, phone_number) DO UPDATE SET
    connected_at = MAX(excluded.connected_at, user_connections.connected_at + 1),
    active = 1
"#,
};

pub const FIND_CONNECTION: Sql = Sql {
    pg: r#"
SELECT user_id, phone_number, connected_at, active
FROM user_connections
WHERE user_id = $1 AND phone_number = $2
"#,
    sqlite: r#"
SELECT user_id, phone_number, connected_at, active
FROM user_connections
WHERE user_id = ? AND phone_number = ?
"#,
};

pub const ACTIVE_CONNECTIONS: Sql = Sql {
    pg: r#"
SELECT user_id, phone_number, connected_at, active
FROM user_connections
WHERE user_id = $1 AND active = TRUE
ORDER BY id
"#,
    sqlite: r#"
SELECT user_id, phone_number, connected_at, active
FROM user_connections
WHERE user_id = ? AND active = 1
ORDER BY id
"#,
};

pub const DEACTIVATE_CONNECTION: Sql = Sql {
    pg: "UPDATE user_connections SET active = FALSE WHERE user_id = $1 AND phone_number = $2 AND active = TRUE",
    sqlite: "UPDATE user_connections SET active = 0 WHERE user_id = ? AND phone_number = ? AND active = 1",
};

// Redirections

pub const INSERT_REDIRECTION: Sql = Sql {
    pg: r#"
INSERT INTO redirections (user_id, phone_number, source_chat_id, destination_chat_id, active, created_at)
VALUES ($1, $2, $3, $4, TRUE, $5)
RETURNING id
"#,
    sqlite: r#"
INSERT INTO redirections (user_id, phone_number, source_chat_id, destination_chat_id, active, created_at)
VALUES (?, ?, ?, ?, 1, ?)
RETURNING id
"#,
};

pub const ACTIVE_REDIRECTIONS: Sql = Sql {
    pg: r#"
SELECT id, user_id, phone_number, source_chat_id, destination_chat_id, active, created_at
FROM redirections
WHERE user_id = $1 AND active = TRUE
ORDER BY id
"#,
    sqlite: r#"
SELECT id, user_id, phone_number, source_chat_id, destination_chat_id, active, created_at
FROM redirections
WHERE user_id = ? AND active = 1
ORDER BY id
"#,
};

pub const DEACTIVATE_REDIRECTION: Sql = Sql {
    pg: "UPDATE redirections SET active = FALSE WHERE id = $1 AND user_id = $2 AND active = TRUE",
    sqlite: "UPDATE redirections SET active = 0 WHERE id = ? AND user_id = ? AND active = 1",
};

// Transformations

pub const INSERT_TRANSFORMATION: Sql = Sql {
    pg: r#"
INSERT INTO transformations (user_id, phone_number, transformation_type, settings, active, created_at)
VALUES ($1, $2, $3, $4::jsonb, TRUE, $5)
RETURNING id
"#,
    sqlite: r#"
INSERT INTO transformations (user_id, phone_number, transformation_type, settings, active, created_at)
VALUES (?, ?, ?, ?, 1, ?)
RETURNING id
"#,
};

pub const ACTIVE_TRANSFORMATIONS: Sql = Sql {
    pg: r#"
SELECT id, user_id, phone_number, transformation_type, settings::text AS settings, active, created_at
FROM transformations
WHERE user_id = $1 AND phone_number = $2 AND active = TRUE
ORDER BY id
"#,
    sqlite: r#"
SELECT id, user_id, phone_number, transformation_type, settings, active, created_at
FROM transformations
WHERE user_id = ? AND phone_number = ? AND active = 1
ORDER BY id
"#,
};

pub const DEACTIVATE_TRANSFORMATION: Sql = Sql {
    pg: "UPDATE transformations SET active = FALSE WHERE id = $1 AND user_id = $2 AND active = TRUE",
    sqlite: "UPDATE transformations SET active = 0 WHERE id = ? AND user_id = ? AND active = 1",
};

// Filters. `{table}` is replaced with a `FilterList` table name.

pub const INSERT_FILTER: Sql = Sql {
    pg: r#"
INSERT INTO {table} (user_id, phone_number, filter_name, filter_value, active, created_at)
VALUES ($1, $2, $3, $4, TRUE, $5)
RETURNING id
"#,
    sqlite: r#"
INSERT INTO {table} (user_id, phone_number, filter_name, filter_value, active, created_at)
VALUES (?, ?, ?, ?, 1, ?)
RETURNING id
"#,
};

pub const ACTIVE_FILTERS: Sql = Sql {
    pg: r#"
SELECT id, user_id, phone_number, filter_name, filter_value, active, created_at
FROM {table}
WHERE user_id = $1 AND phone_number = $2 AND active = TRUE
ORDER BY id
"#,
    sqlite: r#"
SELECT id, user_id, phone_number, filter_name, filter_value, active, created_at
FROM {table}
WHERE user_id = ? AND phone_number = ? AND active = 1
ORDER BY id
"#,
};

pub const DEACTIVATE_FILTER: Sql = Sql {
    pg: "UPDATE {table} SET active = FALSE WHERE id = $1 AND user_id = $2 AND active = TRUE",
    sqlite: "UPDATE {table} SET active = 0 WHERE id = ? AND user_id = ? AND active = 1",
};

// Sessions

pub const UPSERT_SESSION: Sql = Sql {
    pg: r#"
INSERT INTO user_sessions (user_id, phone_number, session_file, last_activity, active)
VALUES ($1, $2, $3, $4, TRUE)
ON CONFLICT (user_id, phone_number) DO UPDATE SET
    session_file = EXCLUDED.session_file,
    last_activity = GREATEST(EXCLUDED.last_activity, user_sessions.last_activity + 1),
    active = TRUE
"#,
    sqlite: r#"
INSERT INTO user_sessions (user_id, phone_number, session_file, last_activity, active)
VALUES (?, ?, ?, ?, 1)
ON CONFLICT (user_id, phone_number) DO UPDATE SET
    session_file = excluded.session_file,
    last_activity = MAX(excluded.last_activity, user_sessions.last_activity + 1),
    active = 1
"#,
};

pub const FIND_SESSION: Sql = Sql {
    pg: r#"
SELECT user_id, phone_number, session_file, last_activity, active
FROM user_sessions
WHERE user_id = $1 AND phone_number = $2
"#,
    sqlite: r#"
SELECT user_id, phone_number, session_file, last_activity, active
FROM user_sessions
WHERE user_id = ? AND phone_number = ?
"#,
};

pub const ACTIVE_SESSIONS: Sql = Sql {
    pg: r#"
SELECT user_id, phone_number, session_file, last_activity, active
FROM user_sessions
WHERE user_id = $1 AND active = TRUE
ORDER BY id
"#,
    sqlite: r#"
SELECT user_id, phone_number, session_file, last_activity, active
FROM user_sessions
WHERE user_id = ? AND active = 1
ORDER BY id
"#,
};

pub const TOUCH_SESSION: Sql = Sql {
    pg: r#"
UPDATE user_sessions
SET last_activity = GREATEST($1, last_activity + 1)
WHERE user_id = $2 AND phone_number = $3 AND active = TRUE
"#,
    sqlite: r#"
UPDATE user_sessions
SET last_activity = MAX(?, last_activity + 1)
WHERE user_id = ? AND phone_number = ? AND active = 1
"#,
};
