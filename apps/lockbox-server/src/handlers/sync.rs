//! Incremental sync handler.

use chrono::{DateTime, Utc};

use lockbox_proto::{SyncRequest, SyncResponse};
use lockbox_storage::Store;

use crate::error::ServiceError;
use crate::handlers::entry_payload;
use crate::server::{AuthPrincipal, LockboxServer};

/// Replay everything that changed for this owner since the presented cursor.
/// An absent cursor means full replay. The returned cursor is this server's
/// wall clock at response preparation; clients echo it back verbatim and
/// never synthesize their own.
pub async fn sync_changes(
    server: &LockboxServer,
    principal: &AuthPrincipal,
    req: SyncRequest,
) -> Result<SyncResponse, ServiceError> {
    let cursor = req.last_sync_at.unwrap_or(DateTime::UNIX_EPOCH);

    let changes = server.store.changed_since(&principal.id, cursor).await?;

    Ok(SyncResponse {
        entries: changes.entries.into_iter().map(entry_payload).collect(),
        deleted_ids: changes.deleted_ids.into_iter().map(|id| id.0).collect(),
        sync_cursor: Utc::now(),
    })
}
