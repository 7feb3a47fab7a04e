//! libSQL backend: async `ProfileStore` implementation.
//!
//! Supports local file and in-memory databases. Every statement is a static
//! parameterized query; optional fields are bound as NULL and resolved with
//! `COALESCE` / `IS NULL` in SQL rather than by building column lists.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::model::{ProfileUpdate, SearchCriteria, UserId, UserProfile};
use crate::store::traits::ProfileStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_profiles(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut profiles = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => profiles.push(
                    row_to_profile(&row)
                        .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?,
                ),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{op}: {e}"))),
            }
        }
        Ok(profiles)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a UserProfile.
///
/// Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, libsql::Error> {
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(UserProfile {
        user_id: row.get(0)?,
        handle: row.get(1)?,
        department: row.get(2)?,
        profession: row.get(3)?,
        experience: row.get(4)?,
        portfolio: row.get(5)?,
        location: row.get(6)?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "user_id, handle, department, profession, experience, portfolio, location, created_at, updated_at";

const JOINED_PROFILE_COLUMNS: &str = "u.user_id, u.handle, u.department, u.profession, u.experience, u.portfolio, u.location, u.created_at, u.updated_at";

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn upsert(&self, user_id: UserId, handle: &str) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO users (user_id, handle, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![user_id, handle, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert: {e}")))?;

        if inserted > 0 {
            debug!(user_id, "Profile created");
        }
        Ok(())
    }

    async fn update_fields(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn()
            .execute(
                "UPDATE users SET
                    department = COALESCE(?2, department),
                    profession = COALESCE(?3, profession),
                    experience = COALESCE(?4, experience),
                    portfolio = COALESCE(?5, portfolio),
                    location = COALESCE(?6, location),
                    updated_at = ?7
                 WHERE user_id = ?1",
                params![
                    user_id,
                    opt_text(update.department.as_deref()),
                    opt_text(update.profession.as_deref()),
                    opt_text(update.experience.as_deref()),
                    opt_text(update.portfolio.as_deref()),
                    opt_text(update.location.as_deref()),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_fields: {e}")))?;

        debug!(user_id, affected, "Profile fields updated");
        Ok(affected > 0)
    }

    async fn get(&self, user_id: UserId) -> Result<Option<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let profile = row_to_profile(&row)
                    .map_err(|e| DatabaseError::Query(format!("get row parse: {e}")))?;
                Ok(Some(profile))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get: {e}"))),
        }
    }

    async fn search_by(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<UserProfile>, DatabaseError> {
        self.query_profiles(
            "search_by",
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM users
                 WHERE (?1 IS NULL OR department = ?1)
                   AND (?2 IS NULL OR profession = ?2)
                   AND (?3 IS NULL OR experience = ?3)
                   AND (?4 IS NULL OR location = ?4)
                 ORDER BY created_at, user_id"
            ),
            params![
                opt_text(criteria.department.as_deref()),
                opt_text(criteria.profession.as_deref()),
                opt_text(criteria.experience.as_deref()),
                opt_text(criteria.location.as_deref()),
            ],
        )
        .await
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, DatabaseError> {
        // Favorite edges go with the row via trg_users_delete_favorites, so the
        // profile and its edges disappear in one statement.
        let deleted = self
            .conn()
            .execute("DELETE FROM users WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete: {e}")))?;

        info!(user_id, deleted = deleted > 0, "Profile deleted");
        Ok(deleted > 0)
    }

    // ── Favorites ───────────────────────────────────────────────────

    async fn add_favorite(&self, owner: UserId, target: UserId) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO favorites (owner_id, target_id, created_at)
                 SELECT ?1, ?2, ?3
                 WHERE EXISTS (SELECT 1 FROM users WHERE user_id = ?1)
                   AND EXISTS (SELECT 1 FROM users WHERE user_id = ?2)",
                params![owner, target, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_favorite: {e}")))?;

        if inserted > 0 {
            debug!(owner, target, "Favorite added");
            return Ok(true);
        }
        // Nothing inserted: either the edge already exists or a profile is missing.
        self.is_favorite(owner, target).await
    }

    async fn remove_favorite(&self, owner: UserId, target: UserId) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM favorites WHERE owner_id = ?1 AND target_id = ?2",
                params![owner, target],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("remove_favorite: {e}")))?;

        debug!(owner, target, "Favorite removed");
        Ok(())
    }

    async fn list_favorites(&self, owner: UserId) -> Result<Vec<UserProfile>, DatabaseError> {
        self.query_profiles(
            "list_favorites",
            &format!(
                "SELECT {JOINED_PROFILE_COLUMNS} FROM users u
                 JOIN favorites f ON u.user_id = f.target_id
                 WHERE f.owner_id = ?1
                 ORDER BY f.created_at, u.user_id"
            ),
            params![owner],
        )
        .await
    }

    async fn is_favorite(&self, owner: UserId, target: UserId) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT 1 FROM favorites WHERE owner_id = ?1 AND target_id = ?2",
                params![owner, target],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("is_favorite: {e}")))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(DatabaseError::Query(format!("is_favorite: {e}"))),
        }
    }
}
