//! Entry handlers: create, get, list, update, delete.

use lockbox_proto::{
    CreateEntryRequest, DeleteEntryRequest, DeleteEntryResponse, EntryPayload, GetEntryRequest,
    ListEntriesRequest, ListEntriesResponse, UpdateEntryRequest,
};
use lockbox_storage::{EntryId, EntryUpdate, NewEntry, Store, StoreError};

use crate::error::ServiceError;
use crate::handlers::{entry_payload, kind_from_wire};
use crate::server::{AuthPrincipal, LockboxServer};

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 200;

fn check_entry_fields(
    name: &str,
    description: &str,
    ciphertext: &[u8],
) -> Result<(), ServiceError> {
    if name.is_empty() {
        return Err(ServiceError::invalid("name is required"));
    }
    if name.chars().count() > NAME_MAX {
        return Err(ServiceError::invalid("name must be at most 100 characters"));
    }
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(ServiceError::invalid(
            "description must be at most 200 characters",
        ));
    }
    if ciphertext.is_empty() {
        return Err(ServiceError::invalid("data is required"));
    }
    Ok(())
}

pub async fn create_entry(
    server: &LockboxServer,
    principal: &AuthPrincipal,
    req: CreateEntryRequest,
) -> Result<EntryPayload, ServiceError> {
    check_entry_fields(&req.name, &req.description, &req.ciphertext)?;

    let entry = server
        .store
        .create_entry(
            &principal.id,
            &NewEntry {
                kind: kind_from_wire(req.kind),
                name: req.name,
                description: req.description,
                ciphertext: req.ciphertext,
                metadata: req.metadata,
            },
        )
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                ServiceError::Conflict("entry with this name already exists".to_string())
            }
            other => {
                tracing::error!(error = %other, "failed to create entry");
                ServiceError::Internal
            }
        })?;

    Ok(entry_payload(entry))
}

pub async fn get_entry(
    server: &LockboxServer,
    principal: &AuthPrincipal,
    req: GetEntryRequest,
) -> Result<EntryPayload, ServiceError> {
    let entry = server
        .store
        .get_entry(&principal.id, &EntryId(req.id))
        .await?;
    Ok(entry_payload(entry))
}

pub async fn list_entries(
    server: &LockboxServer,
    principal: &AuthPrincipal,
    req: ListEntriesRequest,
) -> Result<ListEntriesResponse, ServiceError> {
    if req.limit.is_some_and(|l| l < 0) {
        return Err(ServiceError::invalid("limit must not be negative"));
    }
    if req.offset.is_some_and(|o| o < 0) {
        return Err(ServiceError::invalid("offset must not be negative"));
    }

    let entries = server
        .store
        .list_entries(
            &principal.id,
            req.kind.map(kind_from_wire),
            req.limit,
            req.offset,
        )
        .await?;

    let entries: Vec<EntryPayload> = entries.into_iter().map(entry_payload).collect();
    Ok(ListEntriesResponse {
        total: entries.len() as i64,
        entries,
    })
}

pub async fn update_entry(
    server: &LockboxServer,
    principal: &AuthPrincipal,
    req: UpdateEntryRequest,
) -> Result<EntryPayload, ServiceError> {
    check_entry_fields(&req.name, &req.description, &req.ciphertext)?;
    if req.version < 1 {
        return Err(ServiceError::invalid("version must be at least 1"));
    }

    let entry = server
        .store
        .update_entry(
            &principal.id,
            &EntryUpdate {
                id: EntryId(req.id),
                name: req.name,
                description: req.description,
                ciphertext: req.ciphertext,
                metadata: req.metadata,
                expected_version: req.version,
            },
        )
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                ServiceError::Conflict("entry with this name already exists".to_string())
            }
            other => other.into(),
        })?;

    Ok(entry_payload(entry))
}

pub async fn delete_entry(
    server: &LockboxServer,
    principal: &AuthPrincipal,
    req: DeleteEntryRequest,
) -> Result<DeleteEntryResponse, ServiceError> {
    server
        .store
        .delete_entry(&principal.id, &EntryId(req.id))
        .await?;
    Ok(DeleteEntryResponse { success: true })
}
