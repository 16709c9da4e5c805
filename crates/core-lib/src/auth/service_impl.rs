use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use microfeed_common::{TokenKind, User, UserId};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::auth::{
    authenticate, reset_expired, verify_password_offloaded, AuthService, Credentials,
};
use crate::error::AppError;
use crate::metrics::{
    ACTIVATION_ISSUED, LOGIN_FAILED, LOGIN_SUCCEEDED, PASSWORD_RESET, REMEMBER_FORGOTTEN,
    REMEMBER_ISSUED, RESET_ISSUED, USER_ACTIVATED,
};
use crate::storage::Store;
use crate::validation::normalize_email;

pub struct DefaultAuth {
    store: Arc<dyn Store>,
    credentials: Credentials,
    // verified against when the email is unknown, so both paths cost one hash
    dummy_digest: OnceCell<String>,
}

impl DefaultAuth {
    pub fn new(store: Arc<dyn Store>, credentials: Credentials) -> Self {
        Self {
            store,
            credentials,
            dummy_digest: OnceCell::new(),
        }
    }

    async fn require_user(&self, user_id: UserId) -> Result<User, AppError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(AppError::UserNotFound(user_id))
    }

    async fn dummy_digest(&self) -> Result<String, AppError> {
        let digest = self
            .dummy_digest
            .get_or_try_init(|| self.credentials.digest_offloaded(self.credentials.issue_token()))
            .await?;
        Ok(digest.clone())
    }

    /// Fill the `kind` slot with the digest of a fresh token and return the token
    async fn issue(&self, user_id: UserId, kind: TokenKind) -> Result<String, AppError> {
        let token = self.credentials.issue_token();
        let digest = self.credentials.digest_offloaded(token.clone()).await?;
        self.store.set_token_digest(user_id, kind, Some(digest)).await?;
        debug!(user = %user_id, %kind, "token issued");
        Ok(token)
    }

    async fn token_matches(&self, user: &User, kind: TokenKind, token: &str) -> bool {
        let user = user.clone();
        let token = token.to_string();
        tokio::task::spawn_blocking(move || authenticate(&user, kind, &token))
            .await
            .unwrap_or(false)
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn log_in(&self, email: &str, password: &str) -> Result<User, AppError> {
        let user = self.store.find_user_by_email(&normalize_email(email)).await?;
        let digest = match &user {
            Some(user) => user.password_digest.clone(),
            None => self.dummy_digest().await?,
        };
        let verified = verify_password_offloaded(password.to_string(), digest).await;

        match user {
            Some(user) if verified => {
                counter!(LOGIN_SUCCEEDED).increment(1);
                info!(user = %user.id, "user logged in");
                Ok(user)
            },
            _ => {
                counter!(LOGIN_FAILED).increment(1);
                warn!("failed login attempt");
                Err(AppError::AuthenticationFailure)
            },
        }
    }

    async fn remember(&self, user_id: UserId) -> Result<String, AppError> {
        self.require_user(user_id).await?;
        let token = self.issue(user_id, TokenKind::Remember).await?;

        counter!(REMEMBER_ISSUED).increment(1);
        Ok(token)
    }

    async fn authenticated(
        &self,
        user_id: UserId,
        kind: TokenKind,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(None);
        };
        if self.token_matches(&user, kind, token).await {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn forget(&self, user_id: UserId) -> Result<(), AppError> {
        self.require_user(user_id).await?;
        self.store
            .set_token_digest(user_id, TokenKind::Remember, None)
            .await?;

        counter!(REMEMBER_FORGOTTEN).increment(1);
        info!(user = %user_id, "remember digest cleared");
        Ok(())
    }

    async fn create_activation(&self, user_id: UserId) -> Result<String, AppError> {
        let user = self.require_user(user_id).await?;
        if user.is_activated() {
            return Err(AppError::AlreadyActivated);
        }
        let token = self.issue(user_id, TokenKind::Activation).await?;

        counter!(ACTIVATION_ISSUED).increment(1);
        Ok(token)
    }

    async fn activate(&self, user_id: UserId, token: &str) -> Result<User, AppError> {
        let user = self
            .authenticated(user_id, TokenKind::Activation, token)
            .await?
            .filter(|user| !user.is_activated())
            .ok_or(AppError::AuthenticationFailure)?;

        let user = self.store.activate_user(user.id).await?;
        counter!(USER_ACTIVATED).increment(1);
        info!(user = %user.id, "account activated");
        Ok(user)
    }

    async fn create_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, AppError> {
        let Some(user) = self.store.find_user_by_email(&normalize_email(email)).await? else {
            debug!("password reset requested for unknown email");
            return Ok(None);
        };
        let token = self.issue(user.id, TokenKind::Reset).await?;
        let user = self.require_user(user.id).await?;

        counter!(RESET_ISSUED).increment(1);
        Ok(Some((user, token)))
    }

    async fn reset_password(
        &self,
        user_id: UserId,
        token: &str,
        new_password: String,
    ) -> Result<User, AppError> {
        let user = self
            .authenticated(user_id, TokenKind::Reset, token)
            .await?
            .ok_or(AppError::AuthenticationFailure)?;
        if reset_expired(user.reset_sent_at, Utc::now()) {
            return Err(AppError::TokenExpired);
        }

        let digest = self.credentials.hash_password_offloaded(new_password).await?;
        self.store.set_password_digest(user.id, digest).await?;

        counter!(PASSWORD_RESET).increment(1);
        info!(user = %user.id, "password reset");
        self.require_user(user.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{verify_password, HashCost};
    use crate::storage::MemoryStore;

    fn auth() -> DefaultAuth {
        let credentials = Credentials::new(HashCost::Minimum).unwrap();
        DefaultAuth::new(Arc::new(MemoryStore::new()), credentials)
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies_a_digest() {
        let auth = auth();
        assert!(auth.dummy_digest.get().is_none());

        let err = auth.log_in("nobody@example.com", "password").await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailure));

        // the stand-in digest is a real hash at the configured cost
        let digest = auth.dummy_digest.get().cloned().unwrap();
        assert!(digest.starts_with("$scrypt$ln=4,"));
        assert!(!verify_password("password", &digest));

        // and it is computed once
        auth.log_in("other@example.com", "password").await.unwrap_err();
        assert_eq!(auth.dummy_digest.get(), Some(&digest));
    }
}
