//! RPC envelopes.
//!
//! One frame carries one envelope. Requests name the method, carry the bearer
//! token for private methods, and a method-specific JSON body. Responses echo
//! the request id and hold either a result body or a typed error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every operation the RPC surface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    Register,
    Login,
    RefreshToken,
    OtpEnroll,
    OtpGenerate,
    ListEntries,
    CreateEntry,
    GetEntry,
    UpdateEntry,
    DeleteEntry,
    SyncChanges,
}

impl RpcMethod {
    /// Public methods skip the authorization gate; everything else requires
    /// a valid bearer token in the envelope.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            RpcMethod::Register
                | RpcMethod::Login
                | RpcMethod::RefreshToken
                | RpcMethod::OtpEnroll
                | RpcMethod::OtpGenerate
        )
    }
}

/// Error codes mirroring the HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    Unauthenticated,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Client-chosen correlation id, echoed back verbatim.
    pub id: u64,
    pub method: RpcMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(id: u64, body: Value) -> Self {
        Self {
            id,
            ok: Some(body),
            error: None,
        }
    }

    pub fn err(id: u64, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}
