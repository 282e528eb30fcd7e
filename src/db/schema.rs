//! SQL DDL for initializing the user store.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `id` INTEGER PRIMARY KEY AUTOINCREMENT
/// - `username` UNIQUE (creates an index implicitly)
/// - `role` stored by ordinal (0=STUDENT, 1=INSTRUCTOR, 2=FACULTY)
/// - Timestamps as RFC3339 text
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    last_login_at TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
"#;
