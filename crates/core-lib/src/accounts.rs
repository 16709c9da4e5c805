// ============================
// crates/core-lib/src/accounts.rs
// ============================
//! Account registration and deletion.
//!
//! Registration is an explicit pipeline: normalize, validate, hash, persist.
//! Hashing runs on the blocking pool.
//! Uniqueness of email and nickname is left to the store.

use metrics::counter;
use microfeed_common::{User, UserId};
use tracing::info;

use crate::auth::Credentials;
use crate::error::AppError;
use crate::metrics::{USER_DELETED, USER_REGISTERED};
use crate::storage::{NewUserRecord, Store};
use crate::validation::{
    normalize_email, normalize_name, normalize_nickname, validate_email, validate_name,
    validate_nickname,
};

/// Raw sign-up input
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub nickname: String,
    pub password: String,
}

impl NewUser {
    /// Trim and lowercase the fields that are compared case-insensitively
    pub fn normalize(self) -> Self {
        Self {
            name: normalize_name(&self.name),
            email: normalize_email(&self.email),
            nickname: normalize_nickname(&self.nickname),
            password: self.password,
        }
    }

    /// Validate every field except the password, which is gated by hashing
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        validate_nickname(&self.nickname)?;
        Ok(())
    }
}

/// Register a new user
pub async fn register<S: Store + ?Sized>(
    store: &S,
    credentials: &Credentials,
    new_user: NewUser,
) -> Result<User, AppError> {
    let mut new_user = new_user.normalize();
    new_user.validate()?;
    let password = std::mem::take(&mut new_user.password);
    let password_digest = credentials.hash_password_offloaded(password).await?;

    let user = store
        .insert_user(NewUserRecord {
            name: new_user.name,
            email: new_user.email,
            nickname: new_user.nickname,
            password_digest,
        })
        .await?;

    counter!(USER_REGISTERED).increment(1);
    info!(user = %user.id, nickname = %user.nickname, "user registered");
    Ok(user)
}

/// Delete a user along with their microposts and follow edges
pub async fn delete_account<S: Store + ?Sized>(store: &S, user_id: UserId) -> Result<(), AppError> {
    store.delete_user(user_id).await?;
    counter!(USER_DELETED).increment(1);
    info!(user = %user_id, "user deleted");
    Ok(())
}
