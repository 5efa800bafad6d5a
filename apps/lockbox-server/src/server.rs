//! Server state and the authorization gate.

use lockbox_auth::{AuthError, CredentialService};
use lockbox_storage::UserId;

use crate::backend::StoreBackend;
use crate::config::KeyMaterial;
use crate::error::ServiceError;

/// The principal resolved by the authorization gate. Private handlers read
/// the owner from here and nowhere else; request payloads never carry it.
#[derive(Clone, Debug)]
pub struct AuthPrincipal {
    pub id: UserId,
    pub username: String,
}

pub struct LockboxServer {
    pub store: StoreBackend,
    pub credentials: CredentialService,
    /// Held for surface-level payload re-encryption; the data plane never
    /// reads it.
    #[allow(dead_code)]
    pub key_material: KeyMaterial,
}

impl LockboxServer {
    pub fn new(
        store: StoreBackend,
        credentials: CredentialService,
        key_material: KeyMaterial,
    ) -> Self {
        Self {
            store,
            credentials,
            key_material,
        }
    }

    /// Validate a raw bearer token and resolve the principal. Missing,
    /// malformed, expired and tampered tokens all collapse into the same
    /// `Unauthenticated` answer.
    pub fn authenticate(&self, token: Option<&str>) -> Result<AuthPrincipal, ServiceError> {
        let token = token.ok_or(ServiceError::Unauthenticated("user not authenticated"))?;
        let claims = self.credentials.validate_token(token).map_err(|e| {
            match e {
                AuthError::TokenExpired => {
                    tracing::debug!("rejected expired token");
                }
                _ => {
                    tracing::debug!("rejected invalid token");
                }
            }
            ServiceError::Unauthenticated("user not authenticated")
        })?;

        Ok(AuthPrincipal {
            id: UserId(claims.sub),
            username: claims.username,
        })
    }

    /// Same gate, fed from an `Authorization` header. Anything that is not
    /// exactly the Bearer scheme is rejected.
    pub fn authenticate_bearer(&self, header: Option<&str>) -> Result<AuthPrincipal, ServiceError> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .filter(|t| !t.is_empty());
        self.authenticate(token)
    }
}
