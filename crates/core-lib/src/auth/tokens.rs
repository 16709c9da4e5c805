//! Random tokens and their digest checks.
//!
//! Every token kind (remember, activation, reset) is a random URL-safe string
//! of which only a digest is stored. A user has one slot per kind, so issuing
//! a new token replaces the digest and only the most recently issued token is
//! ever valid. Clearing a slot ends everything derived from it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use microfeed_common::{TokenKind, User};
use rand::RngCore;

use super::password::verify_password;

/// Token size in bytes when none is configured (256 bits)
pub const DEFAULT_TOKEN_BYTES: usize = 32;

/// How long a password reset token stays usable, in hours
pub const RESET_TOKEN_TTL_HOURS: i64 = 2;

/// URL-safe, unpadded base64 of `bytes` random bytes
pub(crate) fn random_token(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Check a presented remember token against the stored digest.
/// Fails closed on a blank token or an absent digest.
pub fn authenticate_remember(token: &str, stored_digest: Option<&str>) -> bool {
    if token.trim().is_empty() {
        return false;
    }
    match stored_digest {
        Some(digest) if !digest.is_empty() => verify_password(token, digest),
        _ => false,
    }
}

/// Check a presented token against `user`'s digest slot for `kind`
pub fn authenticate(user: &User, kind: TokenKind, token: &str) -> bool {
    authenticate_remember(token, user.token_digest(kind))
}

/// Whether a reset token sent at `sent_at` is past [`RESET_TOKEN_TTL_HOURS`].
/// A reset with no recorded send time counts as expired.
pub fn reset_expired(sent_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match sent_at {
        Some(sent_at) => now - sent_at > Duration::hours(RESET_TOKEN_TTL_HOURS),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{Credentials, HashCost};
    use microfeed_common::UserId;

    fn user_with(kind: TokenKind, digest: Option<String>) -> User {
        let mut user = User {
            id: UserId(1),
            name: "Michael".to_string(),
            email: "michael@example.com".to_string(),
            nickname: "michael".to_string(),
            password_digest: String::new(),
            remember_digest: None,
            activation_digest: None,
            activated_at: None,
            reset_digest: None,
            reset_sent_at: None,
            created_at: Utc::now(),
        };
        match kind {
            TokenKind::Remember => user.remember_digest = digest,
            TokenKind::Activation => user.activation_digest = digest,
            TokenKind::Reset => user.reset_digest = digest,
        }
        user
    }

    #[test]
    fn test_random_tokens_are_unique_and_url_safe() {
        let first = random_token(DEFAULT_TOKEN_BYTES);
        let second = random_token(DEFAULT_TOKEN_BYTES);
        assert_ne!(first, second);

        // 32 bytes encoded without padding is 43 characters
        assert_eq!(first.len(), 43);
        assert!(random_token(16).len() < first.len());
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_blank_token_or_missing_digest_fails_closed() {
        let creds = Credentials::new(HashCost::Minimum).unwrap();
        let token = creds.issue_token();
        let digest = creds.digest(&token).unwrap();

        assert!(!authenticate_remember(&token, Some("")));
        assert!(!authenticate_remember(&token, None));
        assert!(!authenticate_remember("", Some(&digest)));
        assert!(!authenticate_remember("   ", Some(&digest)));
    }

    #[test]
    fn test_matching_token_authenticates() {
        let creds = Credentials::new(HashCost::Minimum).unwrap();
        let token = creds.issue_token();
        let digest = creds.digest(&token).unwrap();

        assert!(authenticate_remember(&token, Some(&digest)));
        assert!(!authenticate_remember(&creds.issue_token(), Some(&digest)));
    }

    #[test]
    fn test_authenticate_checks_only_the_named_slot() {
        let creds = Credentials::new(HashCost::Minimum).unwrap();
        let token = creds.issue_token();
        let digest = creds.digest(&token).unwrap();

        for kind in [TokenKind::Remember, TokenKind::Activation, TokenKind::Reset] {
            let user = user_with(kind, Some(digest.clone()));
            assert!(authenticate(&user, kind, &token), "{kind} slot should verify");
            assert!(!authenticate(&user, kind, ""));

            let empty = user_with(kind, None);
            assert!(!authenticate(&empty, kind, &token), "empty {kind} slot must fail");
        }

        let user = user_with(TokenKind::Activation, Some(digest));
        assert!(!authenticate(&user, TokenKind::Remember, &token));
        assert!(!authenticate(&user, TokenKind::Reset, &token));
    }

    #[test]
    fn test_reset_expiry_window() {
        let now = Utc::now();
        assert!(!reset_expired(Some(now), now));
        assert!(!reset_expired(Some(now - Duration::minutes(119)), now));
        assert!(reset_expired(Some(now - Duration::hours(3)), now));
        assert!(reset_expired(None, now));
    }
}
