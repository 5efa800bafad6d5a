//! Entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntryId, UserId};

/// Category of a stored entry. The server records it but never interprets
/// the ciphertext behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credentials,
    Text,
    Binary,
    Card,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credentials => "credentials",
            EntryKind::Text => "text",
            EntryKind::Binary => "binary",
            EntryKind::Card => "card",
        }
    }

    /// Parse the stored/wire representation. Returns `None` for anything
    /// outside the four known kinds.
    pub fn parse(s: &str) -> Option<EntryKind> {
        match s {
            "credentials" => Some(EntryKind::Credentials),
            "text" => Some(EntryKind::Text),
            "binary" => Some(EntryKind::Binary),
            "card" => Some(EntryKind::Card),
            _ => None,
        }
    }
}

/// One encrypted secret owned by exactly one user.
///
/// `ciphertext` is an opaque byte string produced by the client; the server
/// stores it verbatim. `version` starts at 1 and increases by one on every
/// successful update.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    pub owner: UserId,
    pub kind: EntryKind,
    pub name: String,
    pub description: String,
    pub ciphertext: Vec<u8>,
    pub metadata: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Parameters for creating an entry. Id, timestamps and version are
/// server-assigned.
#[derive(Clone, Debug)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub name: String,
    pub description: String,
    pub ciphertext: Vec<u8>,
    pub metadata: String,
}

/// Parameters for an optimistic update. Kind is fixed at creation and is
/// deliberately absent here.
#[derive(Clone, Debug)]
pub struct EntryUpdate {
    pub id: EntryId,
    pub name: String,
    pub description: String,
    pub ciphertext: Vec<u8>,
    pub metadata: String,
    pub expected_version: i64,
}

/// Incremental sync delta for one owner: live entries modified after the
/// cursor (oldest first) and ids deleted after it. An entry created and then
/// deleted between cursors shows up only in `deleted_ids`.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub entries: Vec<Entry>,
    pub deleted_ids: Vec<EntryId>,
}
