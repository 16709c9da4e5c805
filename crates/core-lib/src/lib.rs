// ============================
// microfeed-core/src/lib.rs
// ============================
//! Identity and feed core for the `microfeed` social app.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod microposts;
pub mod relationships;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use microfeed_common::{Micropost, User, UserId};

use crate::accounts::NewUser;
use crate::auth::{AuthService, Credentials, DefaultAuth};
use crate::config::Settings;
use crate::error::AppError;
use crate::feed::Feed;
use crate::storage::{FlatFileStorage, Store};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Password hasher
    pub credentials: Credentials,
    /// Settings
    pub settings: Arc<Settings>,
    /// Storage backend
    pub store: Arc<dyn Store>,
}

impl AppState {
    /// Create a new application state
    pub fn new(store: Arc<dyn Store>, settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;
        let credentials = Credentials::from_settings(&settings.credentials)?;
        let auth = Arc::new(DefaultAuth::new(store.clone(), credentials.clone()));

        Ok(Self {
            auth,
            credentials,
            settings: Arc::new(settings),
            store,
        })
    }

    /// Create an application state backed by the flat-file store in `data_dir`
    pub fn open(settings: Settings) -> anyhow::Result<Self> {
        let store = FlatFileStorage::new(&settings.data_dir)?;
        Ok(Self::new(Arc::new(store), settings)?)
    }

    /// Register a new user
    pub async fn register(&self, new_user: NewUser) -> Result<User, AppError> {
        accounts::register(self.store.as_ref(), &self.credentials, new_user).await
    }

    /// Follow another user
    pub async fn follow(&self, follower_id: UserId, followed_id: UserId) -> Result<(), AppError> {
        relationships::follow(self.store.as_ref(), follower_id, followed_id).await
    }

    /// Publish a micropost
    pub async fn post(&self, author_id: UserId, body: &str) -> Result<Micropost, AppError> {
        microposts::post(self.store.as_ref(), author_id, body).await
    }

    /// Feed of `viewer_id`, paged with the configured page size
    pub async fn feed(&self, viewer_id: UserId) -> Result<Feed<'_, dyn Store>, AppError> {
        feed::feed_for_with_page_size(self.store.as_ref(), viewer_id, self.settings.feed.page_size)
            .await
    }
}
