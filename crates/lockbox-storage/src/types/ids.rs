//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// User (principal) identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

/// Entry identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryId(pub Uuid);
