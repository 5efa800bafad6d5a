//! Handler functions shared by both wire surfaces.
//!
//! Organized by domain:
//! - auth: register, login, token refresh
//! - entries: create, get, list, update, delete
//! - sync: incremental change sets
//! - otp: TOTP enrollment and code derivation
//!
//! Handlers validate arguments before any store transaction opens, call the
//! core services, and map storage failures into the service error taxonomy.
//! Transport concerns (status codes, envelopes, headers) stay in the
//! surfaces.

pub mod auth;
pub mod entries;
pub mod otp;
pub mod sync;

use lockbox_proto as proto;
use lockbox_storage::{Entry, EntryKind};

pub(crate) fn kind_from_wire(kind: proto::EntryKind) -> EntryKind {
    match kind {
        proto::EntryKind::Credentials => EntryKind::Credentials,
        proto::EntryKind::Text => EntryKind::Text,
        proto::EntryKind::Binary => EntryKind::Binary,
        proto::EntryKind::Card => EntryKind::Card,
    }
}

pub(crate) fn kind_to_wire(kind: EntryKind) -> proto::EntryKind {
    match kind {
        EntryKind::Credentials => proto::EntryKind::Credentials,
        EntryKind::Text => proto::EntryKind::Text,
        EntryKind::Binary => proto::EntryKind::Binary,
        EntryKind::Card => proto::EntryKind::Card,
    }
}

pub(crate) fn entry_payload(entry: Entry) -> proto::EntryPayload {
    proto::EntryPayload {
        id: entry.id.0,
        kind: kind_to_wire(entry.kind),
        name: entry.name,
        description: entry.description,
        ciphertext: entry.ciphertext,
        metadata: entry.metadata,
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        version: entry.version,
    }
}
