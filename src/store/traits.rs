//! `ProfileStore` trait: the single async interface for profile persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::store::model::{ProfileUpdate, SearchCriteria, UserId, UserProfile};

/// Backend-agnostic store for profiles and the favorites relation.
///
/// Every call is atomic on its own; callers never need to wrap calls in a
/// transaction.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Insert a bare profile if absent. Never overwrites an existing handle.
    async fn upsert(&self, user_id: UserId, handle: &str) -> Result<(), DatabaseError>;

    /// Apply a partial update. Returns `false` if the profile does not exist.
    async fn update_fields(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<bool, DatabaseError>;

    async fn get(&self, user_id: UserId) -> Result<Option<UserProfile>, DatabaseError>;

    /// Exact-match conjunction over the set criteria, oldest profiles first.
    async fn search_by(&self, criteria: &SearchCriteria)
    -> Result<Vec<UserProfile>, DatabaseError>;

    /// Remove a profile together with every favorite edge touching it.
    /// Returns `false` if no profile was stored under `user_id`.
    async fn delete(&self, user_id: UserId) -> Result<bool, DatabaseError>;

    // ── Favorites ───────────────────────────────────────────────────

    /// Bookmark `target` for `owner`. Idempotent.
    /// Returns `false` if either profile does not exist.
    async fn add_favorite(&self, owner: UserId, target: UserId) -> Result<bool, DatabaseError>;

    /// Remove a bookmark. Removing a missing edge is not an error.
    async fn remove_favorite(&self, owner: UserId, target: UserId) -> Result<(), DatabaseError>;

    /// Profiles bookmarked by `owner`, in the order they were added.
    async fn list_favorites(&self, owner: UserId) -> Result<Vec<UserProfile>, DatabaseError>;

    async fn is_favorite(&self, owner: UserId, target: UserId) -> Result<bool, DatabaseError>;
}
