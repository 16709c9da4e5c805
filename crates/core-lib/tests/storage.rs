// ==========================
// crates/core-lib/tests/storage.rs
// ==========================
use std::sync::Arc;

use chrono::Utc;
use futures_util::TryStreamExt;
use microfeed_common::TokenKind;
use microfeed_core::{
    accounts::NewUser,
    config::Settings,
    error::AppError,
    storage::{FlatFileStorage, NewUserRecord, Store},
    AppState,
};
use tempfile::TempDir;

fn record(nickname: &str) -> NewUserRecord {
    NewUserRecord {
        name: nickname.to_string(),
        email: format!("{nickname}@example.com"),
        nickname: nickname.to_string(),
        password_digest: "digest".to_string(),
    }
}

#[tokio::test]
async fn test_flat_file_storage_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();

    let (a, b) = {
        let storage = FlatFileStorage::new(temp_dir.path()).unwrap();
        let a = storage.insert_user(record("archer")).await.unwrap();
        let b = storage.insert_user(record("lana")).await.unwrap();
        storage.insert_relationship(a.id, b.id).await.unwrap();
        storage
            .insert_micropost(b.id, "Danger zone".to_string(), Utc::now())
            .await
            .unwrap();
        storage
            .set_token_digest(a.id, TokenKind::Remember, Some("remember".to_string()))
            .await
            .unwrap();
        assert!(storage.snapshot_path().exists());
        (a, b)
    };

    let reopened = FlatFileStorage::new(temp_dir.path()).unwrap();
    let archer = reopened.find_user(a.id).await.unwrap().unwrap();
    assert_eq!(archer.remember_digest.as_deref(), Some("remember"));
    assert_eq!(reopened.following_ids(a.id).await.unwrap(), vec![b.id]);
    assert_eq!(reopened.microposts_by(b.id).await.unwrap().len(), 1);

    // ids keep counting up after a reload
    let c = reopened.insert_user(record("cyril")).await.unwrap();
    assert!(c.id > b.id);
}

#[tokio::test]
async fn test_failed_write_leaves_memory_and_disk_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let storage = FlatFileStorage::new(&data_dir).unwrap();
    let archer = storage.insert_user(record("archer")).await.unwrap();

    std::fs::remove_dir_all(&data_dir).unwrap();

    let err = storage.insert_user(record("lana")).await.unwrap_err();
    assert!(matches!(err, AppError::Io(_)));
    assert!(storage.find_user_by_email("lana@example.com").await.unwrap().is_none());

    let err = storage
        .insert_micropost(archer.id, "lost".to_string(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Io(_)));
    assert!(storage.microposts_by(archer.id).await.unwrap().is_empty());

    // once the directory is back the same writes go through
    std::fs::create_dir_all(&data_dir).unwrap();
    let lana = storage.insert_user(record("lana")).await.unwrap();
    assert_eq!(lana.id.0, archer.id.0 + 1);
    storage
        .insert_micropost(archer.id, "kept".to_string(), Utc::now())
        .await
        .unwrap();

    let reopened = FlatFileStorage::new(&data_dir).unwrap();
    assert!(reopened.find_user(lana.id).await.unwrap().is_some());
    assert_eq!(reopened.microposts_by(archer.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_app_state_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.data_dir = temp_dir.path().to_path_buf();
    settings.credentials.min_cost = true;
    settings.feed.page_size = 2;

    let storage = FlatFileStorage::new(&settings.data_dir).unwrap();
    let state = AppState::new(Arc::new(storage), settings).unwrap();

    let michael = state
        .register(NewUser {
            name: "Michael".to_string(),
            email: "USER@EXAMPLE.COM".to_string(),
            nickname: "michael".to_string(),
            password: "foobar".to_string(),
        })
        .await
        .unwrap();
    let lana = state
        .register(NewUser {
            name: "Lana".to_string(),
            email: "lana@example.com".to_string(),
            nickname: "lana".to_string(),
            password: "foobaz".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(michael.email, "user@example.com");

    state.follow(michael.id, lana.id).await.unwrap();
    state.post(lana.id, "one").await.unwrap();
    state.post(lana.id, "two").await.unwrap();
    state.post(michael.id, "three").await.unwrap();

    let feed = state.feed(michael.id).await.unwrap();
    let items: Vec<_> = feed.stream().try_collect().await.unwrap();
    assert_eq!(items.len(), 3);

    let user = state.auth.log_in("user@example.com", "foobar").await.unwrap();
    assert_eq!(user.id, michael.id);
}
