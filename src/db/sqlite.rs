use crate::db::models::{DbUser, NewUser};
use crate::db::schema::SQLITE_INIT;
use crate::error::GateError;
use crate::types::auth::Role;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

/// Open (creating if missing) the database behind `database_url` and run the
/// bundled DDL.
pub async fn connect(database_url: &str) -> Result<UserStorage, GateError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    let storage = UserStorage::new(pool);
    storage.init_schema().await?;
    Ok(storage)
}

#[derive(Clone)]
pub struct UserStorage {
    pool: SqlitePool,
}

impl UserStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), GateError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert a new user. A username collision surfaces as
    /// [`GateError::UsernameTaken`] so the handler can keep its 400 contract
    /// even when two registrations race.
    pub async fn insert_user(&self, user: NewUser) -> Result<i64, GateError> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"INSERT INTO users (username, password_hash, role, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.ordinal())
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(GateError::UsernameTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<DbUser>, GateError> {
        let row = sqlx::query(
            r#"SELECT id, username, password_hash, role, created_at, last_login_at
               FROM users WHERE username = ?"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, GateError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(1) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0 > 0)
    }

    pub async fn record_login(&self, id: i64) -> Result<(), GateError> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_model(row: SqliteRow) -> Result<DbUser, GateError> {
        let id: i64 = row.try_get("id")?;
        let username: String = row.try_get("username")?;
        let password_hash: String = row.try_get("password_hash")?;
        let role_ordinal: i64 = row.try_get("role")?;
        let created_at_str: String = row.try_get("created_at")?;
        let last_login_at_str: Option<String> = row.try_get("last_login_at")?;

        let role = Role::from_ordinal(role_ordinal).ok_or_else(|| {
            sqlx::Error::Decode(format!("invalid role ordinal {role_ordinal}").into())
        })?;
        let created_at = parse_timestamp(&created_at_str)?;
        let last_login_at = last_login_at_str
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(DbUser {
            id,
            username,
            password_hash,
            role,
            created_at,
            last_login_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
