//! Registered accounts

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use super::DbPool;
use crate::{Error, Result};

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; never serialized
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl std::fmt::Debug for UserRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRepo").finish_non_exhaustive()
    }
}

const USER_COLUMNS: &str = "id, username, email, password, created_at";

impl UserRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new account
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` if the username or email is taken
    pub fn create(&self, new: &NewUser<'_>) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let inserted = conn.execute(
            "INSERT INTO users (username, email, password) VALUES (?1, ?2, ?3)",
            rusqlite::params![new.username, new.email, new.password_hash],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let field = msg
                    .as_deref()
                    .and_then(|m| m.rsplit("users.").next())
                    .unwrap_or("user")
                    .to_string();
                return Err(Error::Conflict(field));
            }
            Err(e) => return Err(Error::Database(e.to_string())),
        }

        let id = conn.last_insert_rowid();
        drop(conn);

        self.find_by_id(id)?
            .ok_or_else(|| Error::Database(format!("user {id} vanished after insert")))
    }

    /// Look up an account by email (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            email,
        )
    }

    /// Look up an account by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.find_one(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), id)
    }

    fn find_one(&self, sql: &str, param: impl rusqlite::ToSql) -> Result<Option<User>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        match conn.query_row(sql, [param], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

/// Parse `SQLite` `datetime('now')` output, falling back to RFC 3339
fn parse_datetime(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| Utc::now())
}
