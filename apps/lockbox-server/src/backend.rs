//! StoreBackend abstracts over the SQLite and PostgreSQL implementations.
//! The backend is chosen from the database URL scheme at startup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lockbox_storage::*;
use lockbox_store_postgres::PostgresStore;
use lockbox_store_sqlite::SqliteStore;

#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Arc<SqliteStore>),
    Postgres(Arc<PostgresStore>),
}

impl StoreBackend {
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        if database_url.starts_with("postgres:") {
            Ok(StoreBackend::Postgres(Arc::new(
                PostgresStore::open(database_url).await?,
            )))
        } else {
            Ok(StoreBackend::Sqlite(Arc::new(
                SqliteStore::open(database_url).await?,
            )))
        }
    }
}

#[async_trait::async_trait]
impl Store for StoreBackend {
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_user(user).await,
            StoreBackend::Postgres(s) => s.create_user(user).await,
        }
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_user_by_username(username).await,
            StoreBackend::Postgres(s) => s.get_user_by_username(username).await,
        }
    }

    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_user_by_id(user_id).await,
            StoreBackend::Postgres(s) => s.get_user_by_id(user_id).await,
        }
    }

    async fn create_entry(&self, owner: &UserId, entry: &NewEntry) -> Result<Entry, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_entry(owner, entry).await,
            StoreBackend::Postgres(s) => s.create_entry(owner, entry).await,
        }
    }

    async fn get_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<Entry, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_entry(owner, entry_id).await,
            StoreBackend::Postgres(s) => s.get_entry(owner, entry_id).await,
        }
    }

    async fn list_entries(
        &self,
        owner: &UserId,
        kind: Option<EntryKind>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Entry>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.list_entries(owner, kind, limit, offset).await,
            StoreBackend::Postgres(s) => s.list_entries(owner, kind, limit, offset).await,
        }
    }

    async fn update_entry(&self, owner: &UserId, update: &EntryUpdate) -> Result<Entry, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.update_entry(owner, update).await,
            StoreBackend::Postgres(s) => s.update_entry(owner, update).await,
        }
    }

    async fn delete_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<(), StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.delete_entry(owner, entry_id).await,
            StoreBackend::Postgres(s) => s.delete_entry(owner, entry_id).await,
        }
    }

    async fn changed_since(
        &self,
        owner: &UserId,
        cursor: DateTime<Utc>,
    ) -> Result<ChangeSet, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.changed_since(owner, cursor).await,
            StoreBackend::Postgres(s) => s.changed_since(owner, cursor).await,
        }
    }

    async fn close(&self) {
        match self {
            StoreBackend::Sqlite(s) => s.close().await,
            StoreBackend::Postgres(s) => s.close().await,
        }
    }
}
