// ================
// common/src/lib.rs
// ================
//! Common record types shared by the `microfeed` core and its callers.
//! These are the persisted shapes of users, follow edges and microposts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a user. Assigned by the store, never reused.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Identifier of a micropost.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MicropostId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MicropostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which single-use or long-lived token a digest slot belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Persistent-session cookie token
    Remember,
    /// Account activation link token
    Activation,
    /// Password reset link token
    Reset,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Remember => "remember",
            TokenKind::Activation => "activation",
            TokenKind::Reset => "reset",
        };
        f.write_str(name)
    }
}

/// A registered account as it is persisted.
/// # Fields
/// * `nickname` - Handle other users mention as `@nickname`
/// * `password_digest` - PHC string of the password hash, never the password
/// * `remember_digest` - Digest of the single live remember token, if any
/// * `activation_digest` - Digest of the pending activation token, if any
/// * `reset_digest` - Digest of the pending password reset token, if any
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub nickname: String,
    pub password_digest: String,
    pub remember_digest: Option<String>,
    #[serde(default)]
    pub activation_digest: Option<String>,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reset_digest: Option<String>,
    #[serde(default)]
    pub reset_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The stored digest for `kind`, if that slot is filled
    pub fn token_digest(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Remember => self.remember_digest.as_deref(),
            TokenKind::Activation => self.activation_digest.as_deref(),
            TokenKind::Reset => self.reset_digest.as_deref(),
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated_at.is_some()
    }
}

/// Public view of a user (no secrets).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub nickname: String,
    pub activated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            nickname: user.nickname,
            activated: user.activated_at.is_some(),
            created_at: user.created_at,
        }
    }
}

/// Directed follow edge: `follower_id` sees `followed_id`'s posts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub follower_id: UserId,
    pub followed_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A short post owned by its author.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Micropost {
    pub id: MicropostId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Micropost {
    /// Feed ordering key: newest first, higher id first on equal timestamps.
    pub fn recency_key(&self) -> (DateTime<Utc>, MicropostId) {
        (self.created_at, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_drops_digests() {
        let user = User {
            id: UserId(7),
            name: "Example User".to_string(),
            email: "user@example.com".to_string(),
            nickname: "example".to_string(),
            password_digest: "$scrypt$ln=4,r=8,p=1$salt$hash".to_string(),
            remember_digest: Some("$scrypt$other".to_string()),
            activation_digest: Some("$scrypt$activation".to_string()),
            activated_at: None,
            reset_digest: None,
            reset_sent_at: None,
            created_at: Utc::now(),
        };

        let info = UserInfo::from(user.clone());
        let json = serde_json::to_string(&info).unwrap();

        assert_eq!(info.id, user.id);
        assert!(!json.contains("digest"));
        assert!(!json.contains("$scrypt$"));
        assert!(!info.activated);
    }

    #[test]
    fn test_token_digest_selects_slot() {
        let json = r#"{"id":1,"name":"n","email":"e@x.com","nickname":"n",
            "password_digest":"p","remember_digest":"r","created_at":"2024-01-01T00:00:00Z"}"#;
        let mut user: User = serde_json::from_str(json).unwrap();

        // snapshots written before activation/reset existed still load
        assert_eq!(user.token_digest(TokenKind::Remember), Some("r"));
        assert_eq!(user.token_digest(TokenKind::Activation), None);
        assert_eq!(user.token_digest(TokenKind::Reset), None);
        assert!(!user.is_activated());

        user.reset_digest = Some("x".to_string());
        assert_eq!(user.token_digest(TokenKind::Reset), Some("x"));
        assert_eq!(TokenKind::Activation.to_string(), "activation");
    }

    #[test]
    fn test_ids_serialize_as_numbers() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
        let id: MicropostId = serde_json::from_str("9").unwrap();
        assert_eq!(id, MicropostId(9));
    }
}
