// ============================
// crates/core-lib/src/relationships.rs
// ============================
//! Follow graph operations over an explicit store handle.

use metrics::counter;
use microfeed_common::UserId;
use tracing::info;

use crate::error::AppError;
use crate::metrics::FOLLOW_CREATED;
use crate::storage::Store;

/// Follow `followed_id`. Following twice is a no-op.
pub async fn follow<S: Store + ?Sized>(
    store: &S,
    follower_id: UserId,
    followed_id: UserId,
) -> Result<(), AppError> {
    if store.insert_relationship(follower_id, followed_id).await? {
        counter!(FOLLOW_CREATED).increment(1);
        info!(follower = %follower_id, followed = %followed_id, "follow created");
    }
    Ok(())
}

/// Stop following `followed_id`. Unfollowing twice is a no-op.
pub async fn unfollow<S: Store + ?Sized>(
    store: &S,
    follower_id: UserId,
    followed_id: UserId,
) -> Result<(), AppError> {
    if store.delete_relationship(follower_id, followed_id).await? {
        info!(follower = %follower_id, followed = %followed_id, "follow removed");
    }
    Ok(())
}

/// Whether `follower_id` follows `followed_id`
pub async fn is_following<S: Store + ?Sized>(
    store: &S,
    follower_id: UserId,
    followed_id: UserId,
) -> Result<bool, AppError> {
    Ok(store.following_ids(follower_id).await?.contains(&followed_id))
}

/// Users `user_id` follows
pub async fn following_ids<S: Store + ?Sized>(
    store: &S,
    user_id: UserId,
) -> Result<Vec<UserId>, AppError> {
    require_user(store, user_id).await?;
    store.following_ids(user_id).await
}

/// Users following `user_id`
pub async fn follower_ids<S: Store + ?Sized>(
    store: &S,
    user_id: UserId,
) -> Result<Vec<UserId>, AppError> {
    require_user(store, user_id).await?;
    store.follower_ids(user_id).await
}

async fn require_user<S: Store + ?Sized>(store: &S, user_id: UserId) -> Result<(), AppError> {
    match store.find_user(user_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::UserNotFound(user_id)),
    }
}
