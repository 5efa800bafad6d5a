//! PostgreSQL storage backend.
//!
//! The production backend. Optimistic concurrency is a single predicated
//! UPDATE (`WHERE ... AND version = $n` with `version = version + 1`); the
//! rows-affected count is the sole determinant of success. Delete removes the
//! row and writes the tombstone in one transaction.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use lockbox_storage::{
    ChangeSet, Entry, EntryId, EntryKind, EntryUpdate, NewEntry, NewUser, Store, StoreError, User,
    UserId,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
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

type EntryRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    Vec<u8>,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    i64,
);

fn entry_from_row(row: EntryRow) -> Result<Entry, StoreError> {
    let (id, owner, kind, name, description, ciphertext, metadata, created_at, updated_at, version) =
        row;
    Ok(Entry {
        id: EntryId(id),
        owner: UserId(owner),
        kind: EntryKind::parse(&kind)
            .ok_or_else(|| StoreError::Backend(format!("unknown entry kind: {kind}")))?,
        name,
        description,
        ciphertext,
        metadata,
        created_at,
        updated_at,
        version,
    })
}

const ENTRY_COLUMNS: &str =
    "id, owner, kind, name, description, ciphertext, metadata, created_at, updated_at, version";

#[async_trait::async_trait]
impl Store for PostgresStore {
    // ───────────────────────────────────── Users ──────────────────────────────────────────

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users(id, username, password_verifier, created_at, updated_at)
             VALUES($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.password_verifier)
        .bind(now)
        .bind(now)
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
        let row = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, username, password_verifier, created_at, updated_at
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            id: UserId(row.0),
            username: row.1,
            password_verifier: row.2,
            created_at: row.3,
            updated_at: row.4,
        })
    }

    async fn get_user_by_id(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT id, username, password_verifier, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .ok_or(StoreError::NotFound)?;

        Ok(User {
            id: UserId(row.0),
            username: row.1,
            password_verifier: row.2,
            created_at: row.3,
            updated_at: row.4,
        })
    }

    // ───────────────────────────────────── Entries ────────────────────────────────────────

    async fn create_entry(&self, owner: &UserId, entry: &NewEntry) -> Result<Entry, StoreError> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO entries(id, owner, kind, name, description, ciphertext, metadata,
                                 created_at, updated_at, version)
             VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, 1)",
        )
        .bind(id)
        .bind(owner.0)
        .bind(entry.kind.as_str())
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(&entry.ciphertext)
        .bind(&entry.metadata)
        .bind(now)
        .bind(now)
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
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 AND owner = $2"
        ))
        .bind(entry_id.0)
        .bind(owner.0)
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
        // LIMIT NULL / OFFSET NULL mean "no limit" / "no offset" in Postgres.
        let rows = if let Some(kind) = kind {
            sqlx::query_as::<_, EntryRow>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE owner = $1 AND kind = $2
                 ORDER BY created_at DESC
                 LIMIT $3 OFFSET $4"
            ))
            .bind(owner.0)
            .bind(kind.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?
        } else {
            sqlx::query_as::<_, EntryRow>(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE owner = $1
                 ORDER BY created_at DESC
                 LIMIT $2 OFFSET $3"
            ))
            .bind(owner.0)
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
             SET name = $1, description = $2, ciphertext = $3, metadata = $4,
                 updated_at = $5, version = version + 1
             WHERE id = $6 AND owner = $7 AND version = $8",
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.ciphertext)
        .bind(&update.metadata)
        .bind(now)
        .bind(update.id.0)
        .bind(owner.0)
        .bind(update.expected_version)
        .execute(&mut *tx)
        .await
        .map_err(insert_err)?;

        if result.rows_affected() == 0 {
            // Resolve the miss inside the same transaction: row gone vs row
            // at another version. Cross-owner ids fall in the first bucket.
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM entries WHERE id = $1 AND owner = $2",
            )
            .bind(update.id.0)
            .bind(owner.0)
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
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 AND owner = $2"
        ))
        .bind(update.id.0)
        .bind(owner.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        entry_from_row(row)
    }

    async fn delete_entry(&self, owner: &UserId, entry_id: &EntryId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let result = sqlx::query("DELETE FROM entries WHERE id = $1 AND owner = $2")
            .bind(entry_id.0)
            .bind(owner.0)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query("INSERT INTO tombstones(id, owner, deleted_at) VALUES($1, $2, $3)")
            .bind(entry_id.0)
            .bind(owner.0)
            .bind(Utc::now())
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
             WHERE owner = $1 AND updated_at > $2
             ORDER BY updated_at ASC"
        ))
        .bind(owner.0)
        .bind(cursor)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend_err)?;

        let deleted_rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM tombstones
             WHERE owner = $1 AND deleted_at > $2
             ORDER BY deleted_at ASC",
        )
        .bind(owner.0)
        .bind(cursor)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;

        let entries = entry_rows
            .into_iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ChangeSet {
            entries,
            deleted_ids: deleted_rows.into_iter().map(EntryId).collect(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
