//! Micropost creation and listing.

use chrono::Utc;
use metrics::counter;
use microfeed_common::{Micropost, UserId};
use tracing::debug;

use crate::error::AppError;
use crate::metrics::MICROPOST_CREATED;
use crate::storage::Store;
use crate::validation::validate_micropost_body;

/// Publish a micropost as `author_id`
pub async fn post<S: Store + ?Sized>(
    store: &S,
    author_id: UserId,
    body: &str,
) -> Result<Micropost, AppError> {
    validate_micropost_body(body)?;
    let micropost = store
        .insert_micropost(author_id, body.to_string(), Utc::now())
        .await?;

    counter!(MICROPOST_CREATED).increment(1);
    debug!(author = %author_id, micropost = %micropost.id, "micropost created");
    Ok(micropost)
}

/// Microposts by one author, newest first
pub async fn microposts_by<S: Store + ?Sized>(
    store: &S,
    author_id: UserId,
) -> Result<Vec<Micropost>, AppError> {
    store.microposts_by(author_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, NewUserRecord};
    use crate::validation::ValidationError;

    #[tokio::test]
    async fn test_post_validates_body() {
        let store = MemoryStore::new();
        let author = store
            .insert_user(NewUserRecord {
                name: "Lana".to_string(),
                email: "lana@example.com".to_string(),
                nickname: "lana".to_string(),
                password_digest: "digest".to_string(),
            })
            .await
            .unwrap();

        let created = post(&store, author.id, "Danger zone").await.unwrap();
        assert_eq!(created.author_id, author.id);
        assert_eq!(microposts_by(&store, author.id).await.unwrap(), vec![created]);

        assert!(matches!(
            post(&store, author.id, " ").await,
            Err(AppError::Validation(ValidationError::InvalidMicropost(_)))
        ));
        assert!(matches!(
            post(&store, UserId(999), "orphan").await,
            Err(AppError::UserNotFound(_))
        ));
    }
}
