// ============================
// crates/core-lib/src/storage.rs
// ============================
//! Storage abstraction with in-memory and flat-file implementations.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use microfeed_common::{Micropost, MicropostId, Relationship, TokenKind, User, UserId};
use serde::{Deserialize, Serialize};
use tokio::{fs as tokio_fs, sync::RwLock};
use tracing::debug;

use crate::error::AppError;
use crate::feed::{FeedCursor, FeedQuery};

const SNAPSHOT_FILE: &str = "store.json";

/// A user that passed normalization, validation and hashing, not yet stored
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub name: String,
    pub email: String,
    pub nickname: String,
    pub password_digest: String,
}

/// Trait for storage backends
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a user, enforcing unique email and nickname
    async fn insert_user(&self, record: NewUserRecord) -> Result<User, AppError>;

    /// Look a user up by id
    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError>;

    /// Look a user up by email (case-insensitive)
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Look a user up by nickname (case-insensitive)
    async fn find_user_by_nickname(&self, nickname: &str) -> Result<Option<User>, AppError>;

    /// Replace or clear one token digest slot. Filling the reset slot also
    /// stamps `reset_sent_at`.
    async fn set_token_digest(
        &self,
        id: UserId,
        kind: TokenKind,
        digest: Option<String>,
    ) -> Result<(), AppError>;

    /// Mark the account activated and clear its activation digest
    async fn activate_user(&self, id: UserId) -> Result<User, AppError>;

    /// Replace the password digest and void any pending reset token
    async fn set_password_digest(&self, id: UserId, digest: String) -> Result<(), AppError>;

    /// Delete a user with their microposts and follow edges
    async fn delete_user(&self, id: UserId) -> Result<(), AppError>;

    /// Insert a follow edge. Returns `false` if it already existed.
    async fn insert_relationship(
        &self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError>;

    /// Delete a follow edge. Returns `false` if there was none.
    async fn delete_relationship(
        &self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError>;

    /// Ids of the users `id` follows
    async fn following_ids(&self, id: UserId) -> Result<Vec<UserId>, AppError>;

    /// Ids of the users following `id`
    async fn follower_ids(&self, id: UserId) -> Result<Vec<UserId>, AppError>;

    /// Store a micropost
    async fn insert_micropost(
        &self,
        author_id: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<Micropost, AppError>;

    /// Microposts by one author, newest first
    async fn microposts_by(&self, author_id: UserId) -> Result<Vec<Micropost>, AppError>;

    /// Up to `limit` microposts matching `query` that sort strictly after
    /// `after` (older, or same instant with a lower id), newest first
    async fn feed_page(
        &self,
        query: &FeedQuery,
        after: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Micropost>, AppError>;
}

/// Serialized form of every table
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub next_user_id: u64,
    pub next_micropost_id: u64,
    pub users: Vec<User>,
    pub relationships: Vec<Relationship>,
    pub microposts: Vec<Micropost>,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    next_user_id: u64,
    next_micropost_id: u64,
    users: BTreeMap<UserId, User>,
    relationships: BTreeMap<(UserId, UserId), Relationship>,
    microposts: BTreeMap<MicropostId, Micropost>,
}

impl Tables {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            next_user_id: snapshot.next_user_id,
            next_micropost_id: snapshot.next_micropost_id,
            users: snapshot.users.into_iter().map(|u| (u.id, u)).collect(),
            relationships: snapshot
                .relationships
                .into_iter()
                .map(|r| ((r.follower_id, r.followed_id), r))
                .collect(),
            microposts: snapshot.microposts.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            next_user_id: self.next_user_id,
            next_micropost_id: self.next_micropost_id,
            users: self.users.values().cloned().collect(),
            relationships: self.relationships.values().cloned().collect(),
            microposts: self.microposts.values().cloned().collect(),
        }
    }

    fn require_user(&self, id: UserId) -> Result<(), AppError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(AppError::UserNotFound(id))
        }
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User, AppError> {
        self.users.get_mut(&id).ok_or(AppError::UserNotFound(id))
    }

    fn insert_user(&mut self, record: NewUserRecord) -> Result<User, AppError> {
        let email_taken = self
            .users
            .values()
            .any(|u| u.email.to_lowercase() == record.email.to_lowercase());
        if email_taken {
            return Err(AppError::EmailTaken);
        }
        let nickname_taken = self
            .users
            .values()
            .any(|u| u.nickname.to_lowercase() == record.nickname.to_lowercase());
        if nickname_taken {
            return Err(AppError::NicknameTaken);
        }

        self.next_user_id += 1;
        let user = User {
            id: UserId(self.next_user_id),
            name: record.name,
            email: record.email,
            nickname: record.nickname,
            password_digest: record.password_digest,
            remember_digest: None,
            activation_digest: None,
            activated_at: None,
            reset_digest: None,
            reset_sent_at: None,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_user_by_email(&self, email: &str) -> Option<User> {
        let email = email.to_lowercase();
        self.users.values().find(|u| u.email.to_lowercase() == email).cloned()
    }

    fn find_user_by_nickname(&self, nickname: &str) -> Option<User> {
        let nickname = nickname.to_lowercase();
        self.users
            .values()
            .find(|u| u.nickname.to_lowercase() == nickname)
            .cloned()
    }

    fn set_token_digest(
        &mut self,
        id: UserId,
        kind: TokenKind,
        digest: Option<String>,
    ) -> Result<(), AppError> {
        let user = self.user_mut(id)?;
        match kind {
            TokenKind::Remember => user.remember_digest = digest,
            TokenKind::Activation => user.activation_digest = digest,
            TokenKind::Reset => {
                user.reset_sent_at = digest.as_ref().map(|_| Utc::now());
                user.reset_digest = digest;
            },
        }
        Ok(())
    }

    fn activate_user(&mut self, id: UserId) -> Result<User, AppError> {
        let user = self.user_mut(id)?;
        user.activated_at = Some(Utc::now());
        user.activation_digest = None;
        Ok(user.clone())
    }

    fn set_password_digest(&mut self, id: UserId, digest: String) -> Result<(), AppError> {
        let user = self.user_mut(id)?;
        user.password_digest = digest;
        user.reset_digest = None;
        user.reset_sent_at = None;
        Ok(())
    }

    fn delete_user(&mut self, id: UserId) -> Result<(), AppError> {
        if self.users.remove(&id).is_none() {
            return Err(AppError::UserNotFound(id));
        }
        self.microposts.retain(|_, post| post.author_id != id);
        self.relationships
            .retain(|(follower, followed), _| *follower != id && *followed != id);
        Ok(())
    }

    fn insert_relationship(
        &mut self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError> {
        self.require_user(follower_id)?;
        self.require_user(followed_id)?;

        let key = (follower_id, followed_id);
        if self.relationships.contains_key(&key) {
            return Ok(false);
        }
        self.relationships.insert(
            key,
            Relationship {
                follower_id,
                followed_id,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    fn delete_relationship(&mut self, follower_id: UserId, followed_id: UserId) -> bool {
        self.relationships.remove(&(follower_id, followed_id)).is_some()
    }

    fn following_ids(&self, id: UserId) -> Vec<UserId> {
        self.relationships
            .keys()
            .filter(|(follower, _)| *follower == id)
            .map(|(_, followed)| *followed)
            .collect()
    }

    fn follower_ids(&self, id: UserId) -> Vec<UserId> {
        self.relationships
            .keys()
            .filter(|(_, followed)| *followed == id)
            .map(|(follower, _)| *follower)
            .collect()
    }

    fn insert_micropost(
        &mut self,
        author_id: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<Micropost, AppError> {
        self.require_user(author_id)?;

        self.next_micropost_id += 1;
        let post = Micropost {
            id: MicropostId(self.next_micropost_id),
            author_id,
            body,
            created_at,
        };
        self.microposts.insert(post.id, post.clone());
        Ok(post)
    }

    fn microposts_by(&self, author_id: UserId) -> Vec<Micropost> {
        let mut posts: Vec<Micropost> = self
            .microposts
            .values()
            .filter(|post| post.author_id == author_id)
            .cloned()
            .collect();
        newest_first(&mut posts);
        posts
    }

    fn feed_page(
        &self,
        query: &FeedQuery,
        after: Option<FeedCursor>,
        limit: usize,
    ) -> Vec<Micropost> {
        let mut posts: Vec<Micropost> = self
            .microposts
            .values()
            .filter(|post| after.map_or(true, |cursor| post.recency_key() < cursor))
            .filter(|post| query.matches(post))
            .cloned()
            .collect();
        newest_first(&mut posts);
        posts.truncate(limit);
        posts
    }
}

fn newest_first(posts: &mut [Micropost]) {
    posts.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
}

/// In-memory store. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::from_snapshot(snapshot))),
        }
    }

    /// Copy every table out
    pub async fn snapshot(&self) -> Snapshot {
        self.tables.read().await.to_snapshot()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, record: NewUserRecord) -> Result<User, AppError> {
        self.tables.write().await.insert_user(record)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.find_user_by_email(email))
    }

    async fn find_user_by_nickname(&self, nickname: &str) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.find_user_by_nickname(nickname))
    }

    async fn set_token_digest(
        &self,
        id: UserId,
        kind: TokenKind,
        digest: Option<String>,
    ) -> Result<(), AppError> {
        self.tables.write().await.set_token_digest(id, kind, digest)
    }

    async fn activate_user(&self, id: UserId) -> Result<User, AppError> {
        self.tables.write().await.activate_user(id)
    }

    async fn set_password_digest(&self, id: UserId, digest: String) -> Result<(), AppError> {
        self.tables.write().await.set_password_digest(id, digest)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), AppError> {
        self.tables.write().await.delete_user(id)
    }

    async fn insert_relationship(
        &self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError> {
        self.tables
            .write()
            .await
            .insert_relationship(follower_id, followed_id)
    }

    async fn delete_relationship(
        &self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError> {
        Ok(self
            .tables
            .write()
            .await
            .delete_relationship(follower_id, followed_id))
    }

    async fn following_ids(&self, id: UserId) -> Result<Vec<UserId>, AppError> {
        Ok(self.tables.read().await.following_ids(id))
    }

    async fn follower_ids(&self, id: UserId) -> Result<Vec<UserId>, AppError> {
        Ok(self.tables.read().await.follower_ids(id))
    }

    async fn insert_micropost(
        &self,
        author_id: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<Micropost, AppError> {
        self.tables
            .write()
            .await
            .insert_micropost(author_id, body, created_at)
    }

    async fn microposts_by(&self, author_id: UserId) -> Result<Vec<Micropost>, AppError> {
        Ok(self.tables.read().await.microposts_by(author_id))
    }

    async fn feed_page(
        &self,
        query: &FeedQuery,
        after: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Micropost>, AppError> {
        Ok(self.tables.read().await.feed_page(query, after, limit))
    }
}

/// Flat-file store: an in-memory store mirrored to `store.json`.
///
/// Each write runs against a copy of the tables. The copy replaces the live
/// tables only once its snapshot is on disk, so a failed write changes neither.
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    inner: MemoryStore,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let path = root.join(SNAPSHOT_FILE);
        let snapshot = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Snapshot::default()
        };

        Ok(Self {
            root,
            inner: MemoryStore::from_snapshot(snapshot),
        })
    }

    /// Path of the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    /// Apply `change` to a staged copy of the tables, write it out, then commit
    async fn write<T>(
        &self,
        change: impl FnOnce(&mut Tables) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut tables = self.inner.tables.write().await;
        let mut staged = tables.clone();
        let out = change(&mut staged)?;
        self.persist(&staged).await?;
        *tables = staged;
        Ok(out)
    }

    /// Write `tables` to disk, replacing the previous snapshot
    async fn persist(&self, tables: &Tables) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(&tables.to_snapshot())?;

        let tmp = self.root.join(format!("{SNAPSHOT_FILE}.tmp"));
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, self.snapshot_path()).await?;
        debug!(path = %self.snapshot_path().display(), "store snapshot written");
        Ok(())
    }
}

#[async_trait]
impl Store for FlatFileStorage {
    async fn insert_user(&self, record: NewUserRecord) -> Result<User, AppError> {
        self.write(|tables| tables.insert_user(record)).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_nickname(&self, nickname: &str) -> Result<Option<User>, AppError> {
        self.inner.find_user_by_nickname(nickname).await
    }

    async fn set_token_digest(
        &self,
        id: UserId,
        kind: TokenKind,
        digest: Option<String>,
    ) -> Result<(), AppError> {
        self.write(|tables| tables.set_token_digest(id, kind, digest)).await
    }

    async fn activate_user(&self, id: UserId) -> Result<User, AppError> {
        self.write(|tables| tables.activate_user(id)).await
    }

    async fn set_password_digest(&self, id: UserId, digest: String) -> Result<(), AppError> {
        self.write(|tables| tables.set_password_digest(id, digest)).await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), AppError> {
        self.write(|tables| tables.delete_user(id)).await
    }

    async fn insert_relationship(
        &self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError> {
        self.write(|tables| tables.insert_relationship(follower_id, followed_id))
            .await
    }

    async fn delete_relationship(
        &self,
        follower_id: UserId,
        followed_id: UserId,
    ) -> Result<bool, AppError> {
        self.write(|tables| Ok(tables.delete_relationship(follower_id, followed_id)))
            .await
    }

    async fn following_ids(&self, id: UserId) -> Result<Vec<UserId>, AppError> {
        self.inner.following_ids(id).await
    }

    async fn follower_ids(&self, id: UserId) -> Result<Vec<UserId>, AppError> {
        self.inner.follower_ids(id).await
    }

    async fn insert_micropost(
        &self,
        author_id: UserId,
        body: String,
        created_at: DateTime<Utc>,
    ) -> Result<Micropost, AppError> {
        self.write(|tables| tables.insert_micropost(author_id, body, created_at))
            .await
    }

    async fn microposts_by(&self, author_id: UserId) -> Result<Vec<Micropost>, AppError> {
        self.inner.microposts_by(author_id).await
    }

    async fn feed_page(
        &self,
        query: &FeedQuery,
        after: Option<FeedCursor>,
        limit: usize,
    ) -> Result<Vec<Micropost>, AppError> {
        self.inner.feed_page(query, after, limit).await
    }
}
