//! SQLite storage backend.
//!
//! Used for tests and single-node deployments. Semantics are identical to the
//! Postgres backend: owner scoping on every query, a version-predicated
//! UPDATE for optimistic concurrency, and delete+tombstone in one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use lockbox_storage::{
    ChangeSet, Entry, EntryId, EntryKind, EntryUpdate, NewEntry, NewUser, Store, StoreError, User,
    UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn backend_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Unique-violation inspection happens once, here; everything else escalates
/// as a backend error.
fn insert_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        _ => StoreError::Backend(e.to_string()),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn from_micros(m: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(m)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {m}")))
}

type EntryRow = (
    String,
    String,
    String,
    String,
    String,
    Vec<u8>,
    String,
    i64,
    i64,
    i64,
);

fn entry_from_row(row: EntryRow) -> Result<Entry, StoreError> {
    let (id, owner, kind, name, description, ciphertext, metadata, created_at, updated_at, version) =
        row;
    Ok(Entry {
        id: EntryId(parse_uuid(&id)?),
        owner: UserId(parse_uuid(&owner)?),
        kind: EntryKind::parse(&kind)
            .ok_or_else(|| StoreError::Backend(format!("unknown entry kind: {kind}")))?,
        name,
        description,
        ciphertext,
        metadata,
        created_at: from_micros(created_at)?,
        updated_at: from_micros(updated_at)?,
        version,
    })
}

const ENTRY_COLUMNS: &str =
    "id, owner, kind, name, description, ciphertext, metadata, created_at, updated_at, version";

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users(id, username, password_verifier, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&user.username)
        .bind(&user.password_verifier)
        .bind(now.timestamp_micros())
        .bind(now.timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(User {
            id: UserId(id),
            username: user.username.clone(),
            password_verifier: user.password_verifier.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT id, username, password_verifier, created_at, updated_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            id: UserId(parse_uuid(&row.0)?),
            username: row.1,
            password_verifier: row.2,
            created_at: from_micros(row.3)?,
            updated_at: from_micros(row.4)?,
        })
    }

    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, i64)>(
            "SELECT id, username, password_verifier, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            id: UserId(parse_uuid(&row.0)?),
            username: row.1,
            password_verifier: row.2,
            created_at: from_micros(row.3)?,
            updated_at: from_micros(row.4)?,
        })
    }

    // ───────────────────────────────────── Entries ────────────────────────────────────────

    async fn create_entry(&self, owner: &UserId, entry: &NewEntry) -> Result<Entry, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO entries(id, owner, kind, name, description, ciphertext, metadata,
                                 created_at, updated_at, version)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(id.to_string())
        .bind(owner.0.to_string())
        .bind(entry.kind.as_str())
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(&entry.ciphertext)
        .bind(&entry.metadata)
        .bind(now.timestamp_micros())
        .bind(now.timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(insert_err)?;

        Ok(Entry {
            id: EntryId(id),
            owner: owner.clone(),
            kind: entry.kind,
            name: entry.name.clone(),
            description: entry.description.clone(),
            ciphertext: entry.ciphertext.clone(),
            metadata: entry.metadata.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    async fn get_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<Entry, StoreError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ? AND owner = ?"
        ))
        .bind(entry_id.0.to_string())
        .bind(owner.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?;

        entry_from_row(row)
    }

    async fn list_entries(
        &self,
        owner: &UserId,
        kind: Option<EntryKind>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Entry>, StoreError> {
        // LIMIT -1 means "no limit" in SQLite.
        let rows = if let Some(kind) = kind {
            sqlx::query_as::<_, EntryRow>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE owner = ? AND kind = ?
                 ORDER BY created_at DESC
                 LIMIT COALESCE(?, -1) OFFSET COALESCE(?, 0)"
            ))
            .bind(owner.0.to_string())
            .bind(kind.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?
        } else {
            sqlx::query_as::<_, EntryRow>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE owner = ?
                 ORDER BY created_at DESC
                 LIMIT COALESCE(?, -1) OFFSET COALESCE(?, 0)"
            ))
            .bind(owner.0.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?
        };

        rows.into_iter().map(entry_from_row).collect()
    }

    async fn update_entry(&self, owner: &UserId, update: &EntryUpdate) -> Result<Entry, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE entries
             SET name = ?, description = ?, ciphertext = ?, metadata = ?,
                 updated_at = ?, version = version + 1
             WHERE id = ? AND owner = ? AND version = ?",
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.ciphertext)
        .bind(&update.metadata)
        .bind(now.timestamp_micros())
        .bind(update.id.0.to_string())
        .bind(owner.0.to_string())
        .bind(update.expected_version)
        .execute(&mut *tx)
        .await
        .map_err(insert_err)?;

        if result.rows_affected() == 0 {
            // Resolve the miss inside the same transaction: row gone vs row
            // at another version. Cross-owner ids fall in the first bucket.
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM entries WHERE id = ? AND owner = ?",
            )
            .bind(update.id.0.to_string())
            .bind(owner.0.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(backend_err)?;

            return Err(if exists > 0 {
                StoreError::VersionMismatch
            } else {
                StoreError::NotFound
            });
        }

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ? AND owner = ?"
        ))
        .bind(update.id.0.to_string())
        .bind(owner.0.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        entry_from_row(row)
    }

    async fn delete_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let result = sqlx::query("DELETE FROM entries WHERE id = ? AND owner = ?")
            .bind(entry_id.0.to_string())
            .bind(owner.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query("INSERT INTO tombstones(id, owner, deleted_at) VALUES(?, ?, ?)")
            .bind(entry_id.0.to_string())
            .bind(owner.0.to_string())
            .bind(Utc::now().timestamp_micros())
            .execute(&mut *tx)
            .await
            .map_err(insert_err)?;

        tx.commit().await.map_err(backend_err)
    }

    // ───────────────────────────────────── Sync ───────────────────────────────────────────

    async fn changed_since(
        &self,
        owner: &UserId,
        cursor: DateTime<Utc>,
    ) -> Result<ChangeSet, StoreError> {
        // Both reads run inside one transaction so the entries/tombstones
        // view is coherent.
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let entry_rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE owner = ? AND updated_at > ?
             ORDER BY updated_at ASC"
        ))
        .bind(owner.0.to_string())
        .bind(cursor.timestamp_micros())
        .fetch_all(&mut *tx)
        .await
        .map_err(backend_err)?;

        let deleted_rows = sqlx::query_scalar::<_, String>(
            "SELECT id FROM tombstones
             WHERE owner = ? AND deleted_at > ?
             ORDER BY deleted_at ASC",
        )
        .bind(owner.0.to_string())
        .bind(cursor.timestamp_micros())
        .fetch_all(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;

        let entries = entry_rows
            .into_iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let deleted_ids = deleted_rows
            .into_iter()
            .map(|id| parse_uuid(&id).map(EntryId))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChangeSet {
            entries,
            deleted_ids,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
