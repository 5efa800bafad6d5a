//! API request/response types shared between clients and the server.
//! These map directly to JSON bodies on the wire; ciphertext travels as
//! base64 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a stored entry, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credentials,
    Text,
    Binary,
    Card,
}

// ───────────────────────────────────── Auth ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

// ──────────────────────────────────── Entries ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryPayload {
    pub id: Uuid,
    pub kind: EntryKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub metadata: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub kind: EntryKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEntryRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEntriesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntriesResponse {
    pub entries: Vec<EntryPayload>,
    pub total: i64,
}

/// Update body: kind is fixed at creation and absent here. `version` is the
/// version the client last saw; the update fails if the server has moved on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntryRequest {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub metadata: String,
    pub version: i64,
}

/// HTTP update body; the entry id comes from the request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntryBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(default)]
    pub metadata: String,
    pub version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEntryRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEntryResponse {
    pub success: bool,
}

// ───────────────────────────────────── Sync ─────────────────────────────────────

/// `last_sync_at` is the cursor returned by the previous sync; omitting it
/// asks for a full replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub entries: Vec<EntryPayload>,
    pub deleted_ids: Vec<Uuid>,
    /// Present this back as `last_sync_at` on the next call.
    pub sync_cursor: DateTime<Utc>,
}

// ───────────────────────────────────── TOTP ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpEnrollRequest {
    pub issuer: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpEnrollResponse {
    pub secret: String,
    pub enrollment_uri: String,
    pub backup_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpGenerateRequest {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpGenerateResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub time_remaining: i64,
}

// ──────────────────────────────────── Errors ────────────────────────────────────

/// HTTP error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
    pub message: String,
}

/// Serde adapter: `Vec<u8>` as standard base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
