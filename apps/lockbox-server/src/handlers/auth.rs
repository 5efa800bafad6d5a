//! Authentication handlers: register, login, token refresh.

use lockbox_proto::{AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest, UserInfo};
use lockbox_storage::{NewUser, Store, StoreError, User};

use crate::error::ServiceError;
use crate::server::LockboxServer;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;

pub async fn register(
    server: &LockboxServer,
    req: RegisterRequest,
) -> Result<AuthResponse, ServiceError> {
    if req.username.chars().count() < USERNAME_MIN {
        return Err(ServiceError::invalid(
            "username must be at least 3 characters",
        ));
    }
    if req.username.chars().count() > USERNAME_MAX {
        return Err(ServiceError::invalid(
            "username must be at most 50 characters",
        ));
    }
    if req.password.chars().count() < PASSWORD_MIN {
        return Err(ServiceError::invalid(
            "password must be at least 6 characters",
        ));
    }

    let verifier = server.credentials.hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "failed to hash password");
        ServiceError::Internal
    })?;

    let user = server
        .store
        .create_user(&NewUser {
            username: req.username,
            password_verifier: verifier,
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => {
                ServiceError::Conflict("username already exists".to_string())
            }
            other => {
                tracing::error!(error = %other, "failed to create user");
                ServiceError::Internal
            }
        })?;

    issue_response(server, user)
}

pub async fn login(
    server: &LockboxServer,
    req: LoginRequest,
) -> Result<AuthResponse, ServiceError> {
    if req.username.is_empty() {
        return Err(ServiceError::invalid("username is required"));
    }
    if req.password.is_empty() {
        return Err(ServiceError::invalid("password is required"));
    }

    // Unknown username and wrong password produce the same answer.
    let user = server
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => {
                tracing::warn!(username = %req.username, "login for unknown user");
                ServiceError::Unauthenticated("invalid credentials")
            }
            other => {
                tracing::error!(error = %other, "failed to look up user");
                ServiceError::Internal
            }
        })?;

    if !server
        .credentials
        .verify_password(&req.password, &user.password_verifier)
    {
        tracing::warn!(username = %user.username, "login with wrong password");
        return Err(ServiceError::Unauthenticated("invalid credentials"));
    }

    issue_response(server, user)
}

pub async fn refresh_token(
    server: &LockboxServer,
    req: RefreshTokenRequest,
) -> Result<AuthResponse, ServiceError> {
    if req.token.is_empty() {
        return Err(ServiceError::invalid("token is required"));
    }

    let (token, expires_at) = server.credentials.refresh_token(&req.token).map_err(|e| {
        tracing::warn!(error = %e, "token refresh rejected");
        ServiceError::Unauthenticated("invalid or expired token")
    })?;

    let claims = server.credentials.validate_token(&token).map_err(|e| {
        tracing::error!(error = %e, "freshly issued token failed validation");
        ServiceError::Internal
    })?;

    let user = server
        .store
        .get_user_by_id(&lockbox_storage::UserId(claims.sub))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to load user for refreshed token");
            ServiceError::Internal
        })?;

    Ok(AuthResponse {
        token,
        expires_at,
        user: user_info(&user),
    })
}

fn issue_response(server: &LockboxServer, user: User) -> Result<AuthResponse, ServiceError> {
    let (token, expires_at) = server
        .credentials
        .issue_token(user.id.0, &user.username)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to issue token");
            ServiceError::Internal
        })?;

    Ok(AuthResponse {
        token,
        expires_at,
        user: user_info(&user),
    })
}

fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: user.id.0,
        username: user.username.clone(),
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}
