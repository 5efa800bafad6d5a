//! The Store trait that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// The storage trait the server depends on.
///
/// All entry methods take the owning user as an explicit parameter. The owner
/// comes from the authenticated request context, never from a request payload,
/// and backends must answer [`StoreError::NotFound`] for an id that exists
/// under a different owner.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    /// Create a new user. The id and both timestamps are assigned here.
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

    /// Get user by username (case-sensitive).
    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError>;

    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError>;

    // ───────────────────────────────────── Entries ────────────────────────────────────────

    /// Create a new entry for the owner. Assigns a fresh id, sets both
    /// timestamps to now and the version to 1, atomically.
    async fn create_entry(&self, owner: &UserId, entry: &NewEntry) -> Result<Entry, StoreError>;

    /// Get an entry by id, scoped to the owner.
    async fn get_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<Entry, StoreError>;

    /// List the owner's entries, newest first, optionally filtered by kind.
    /// `limit`/`offset` are advisory and applied verbatim when present.
    async fn list_entries(
        &self,
        owner: &UserId,
        kind: Option<EntryKind>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Entry>, StoreError>;

    /// Optimistic-concurrency update. Succeeds only when the stored version
    /// equals `update.expected_version`; on success the version is bumped by
    /// one and `updated_at` is set to now. A concurrent writer that lost the
    /// race gets [`StoreError::VersionMismatch`] and no state changes.
    async fn update_entry(&self, owner: &UserId, update: &EntryUpdate) -> Result<Entry, StoreError>;

    /// Delete an entry and record a tombstone for it in one transaction.
    async fn delete_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<(), StoreError>;

    // ───────────────────────────────────── Sync ───────────────────────────────────────────

    /// Incremental change set: live entries updated after `cursor` (oldest
    /// first) and ids tombstoned after `cursor`. Both reads observe the same
    /// committed snapshot.
    async fn changed_since(
        &self,
        owner: &UserId,
        cursor: DateTime<Utc>,
    ) -> Result<ChangeSet, StoreError>;

    /// Close the underlying pool. Called once during shutdown.
    async fn close(&self);
}
