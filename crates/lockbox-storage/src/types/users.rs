//! User types.

use chrono::{DateTime, Utc};

use super::UserId;

/// User record. The verifier is an argon2 PHC string; plaintext passwords
/// never reach storage.
#[derive(Clone, Debug)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_verifier: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a user.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub password_verifier: String,
}
