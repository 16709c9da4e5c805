use async_trait::async_trait;
use microfeed_common::{TokenKind, User, UserId};

use crate::error::AppError;

/// Session-facing credential flows over a store
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Check an email/password pair. Fails with `AuthenticationFailure`.
    async fn log_in(&self, email: &str, password: &str) -> Result<User, AppError>;

    /// Issue a remember token and store its digest in the user's single slot
    async fn remember(&self, user_id: UserId) -> Result<String, AppError>;

    /// The user a presented token of `kind` belongs to, if it is still valid
    async fn authenticated(
        &self,
        user_id: UserId,
        kind: TokenKind,
        token: &str,
    ) -> Result<Option<User>, AppError>;

    /// The user a presented remember token belongs to, if it is still valid
    async fn remembered_user(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        self.authenticated(user_id, TokenKind::Remember, token).await
    }

    /// Clear the remember digest, ending every persistent session
    async fn forget(&self, user_id: UserId) -> Result<(), AppError>;

    /// Issue an activation token for a newly registered user
    async fn create_activation(&self, user_id: UserId) -> Result<String, AppError>;

    /// Activate an account with its activation token
    async fn activate(&self, user_id: UserId, token: &str) -> Result<User, AppError>;

    /// Issue a password reset token for the account with `email`, if any
    async fn create_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AppError>;

    /// Replace the password with a still-valid reset token
    async fn reset_password(
        &self,
        user_id: UserId,
        token: &str,
        new_password: String,
    ) -> Result<User, AppError>;
}
