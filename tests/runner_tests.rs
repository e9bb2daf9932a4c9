mod common;

use common::storage_from;
use serde_json::{Value, json};
use state_migrations::{
    CURRENT_VERSION, ClientType, JsonFileStorage, MigrationConfig, MigrationError,
    MigrationRunner, StorageService, create_migration_builder, create_rollback_builder,
    current_version,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn v6_state() -> Value {
    json!({
        "global": { "stateVersion": 6, "theme": "dark" },
        "authenticatedAccounts": ["user1", "user2"],
        "user1": {
            "keys": { "legacyEtmKey": "etm", "cryptoSymmetricKey": "k1" },
            "settings": {
                "disableContextMenuItem": true,
                "neverDomains": { "a.com": null },
                "serverConfig": { "version": "2024.1" },
            },
            "profile": { "everHadUserKey": true },
        },
        "user2": {
            "keys": { "cryptoSymmetricKey": "k2" },
            "settings": { "disableContextMenuItem": true },
            "profile": {},
        },
    })
}

fn assert_fully_migrated(state: &Value) {
    assert_eq!(state["stateVersion"], json!(CURRENT_VERSION));
    assert_eq!(
        state["global"],
        json!({ "theme": "dark", "disableContextMenuItem": true, "neverDomains": { "a.com": null } })
    );
    assert_eq!(
        state["user1"],
        json!({ "keys": { "cryptoSymmetricKey": "k1" }, "settings": {}, "profile": {} })
    );
    assert_eq!(
        state["user2"],
        json!({ "keys": { "cryptoSymmetricKey": "k2" }, "settings": {}, "profile": {} })
    );
    assert_eq!(state["user_user1_crypto_everHadUserKey"], json!(true));
    assert_eq!(state["user_user2_crypto_everHadUserKey"], json!(false));
    assert_eq!(state["user_user1_config_serverConfig"], json!({ "version": "2024.1" }));
    assert!(state.get("user_user2_config_serverConfig").is_none());
}

fn runner_for(storage: Arc<dyn StorageService>) -> MigrationRunner {
    MigrationRunner::new(
        storage,
        MigrationConfig::new(ClientType::Browser).poll_interval(Duration::from_millis(5)),
    )
}

#[tokio::test]
async fn test_empty_store_is_stamped_with_current_version() {
    let storage = storage_from(json!({}));
    let runner = runner_for(storage.clone());

    let report = runner.run(&create_migration_builder().unwrap()).await.unwrap();

    assert!(report.steps.is_empty());
    assert_eq!(storage.get("stateVersion").await.unwrap(), Some(json!(CURRENT_VERSION)));
    assert_eq!(storage.writes().await.len(), 1);
}

#[tokio::test]
async fn test_full_chain_from_oldest_supported_version() {
    let storage = storage_from(v6_state());
    let runner = runner_for(storage.clone());

    let report = runner.run(&create_migration_builder().unwrap()).await.unwrap();

    assert_eq!(report.applied_count(), 5);
    assert_eq!(report.steps.first().map(|step| step.from_version), Some(6));
    assert_fully_migrated(&storage.to_json().await);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let storage = storage_from(v6_state());
    let runner = runner_for(storage.clone());
    let builder = create_migration_builder().unwrap();

    runner.run(&builder).await.unwrap();
    storage.clear_writes().await;
    let report = runner.run(&builder).await.unwrap();

    assert!(report.steps.is_empty());
    assert!(storage.writes().await.is_empty());
}

#[tokio::test]
async fn test_newer_store_is_left_alone() {
    let storage = storage_from(json!({ "stateVersion": CURRENT_VERSION + 3 }));
    let runner = runner_for(storage.clone());

    let report = runner.run(&create_migration_builder().unwrap()).await.unwrap();

    assert!(report.steps.is_empty());
    assert!(storage.writes().await.is_empty());
}

#[tokio::test]
async fn test_too_old_store_is_rejected() {
    let storage = storage_from(json!({ "global": { "stateVersion": 3 } }));
    let runner = runner_for(storage.clone());

    let err = runner.run(&create_migration_builder().unwrap()).await.unwrap_err();

    assert!(matches!(
        err,
        MigrationError::UnsupportedStateVersion { current: 3, minimum: 6 }
    ));
    assert!(storage.writes().await.is_empty());
}

#[tokio::test]
async fn test_rollback_restores_per_user_fields() {
    let storage = storage_from(v6_state());
    let runner = runner_for(storage.clone());
    runner.run(&create_migration_builder().unwrap()).await.unwrap();

    let builder = create_rollback_builder(CURRENT_VERSION, 9).unwrap();
    let report = runner.rollback(&builder).await.unwrap();

    assert_eq!(report.applied_count(), 2);
    assert_eq!(current_version(storage.as_ref()).await.unwrap(), Some(9));
    let state = storage.to_json().await;
    assert_eq!(state["user1"]["settings"]["serverConfig"], json!({ "version": "2024.1" }));
    assert_eq!(state["user1"]["profile"]["everHadUserKey"], json!(true));
    assert_eq!(state["user2"]["profile"]["everHadUserKey"], json!(false));
    assert!(!storage.has("user_user1_config_serverConfig").await.unwrap());
    assert!(!storage.has("user_user1_crypto_everHadUserKey").await.unwrap());
}

#[tokio::test]
async fn test_rollback_through_irreversible_step_fails() {
    let storage = storage_from(v6_state());
    let runner = runner_for(storage.clone());
    runner.run(&create_migration_builder().unwrap()).await.unwrap();

    let builder = create_rollback_builder(CURRENT_VERSION, 8).unwrap();
    let err = runner.rollback(&builder).await.unwrap_err();

    assert!(err.is_irreversible());
    assert_eq!(current_version(storage.as_ref()).await.unwrap(), Some(9));
}

#[tokio::test]
async fn test_wait_for_migrations_resolves_after_run() {
    let storage = storage_from(json!({ "stateVersion": 10 }));
    let waiter = runner_for(storage.clone());
    let writer = storage.clone();

    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.save("stateVersion", json!(CURRENT_VERSION)).await.unwrap();
    });

    tokio::time::timeout(Duration::from_secs(5), waiter.wait_for_migrations(CURRENT_VERSION))
        .await
        .expect("marker never reached the target")
        .unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_json_file_store_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&v6_state()).unwrap()).unwrap();

    {
        let storage = Arc::new(JsonFileStorage::open(&path).await.unwrap());
        let runner = runner_for(storage);
        runner.run(&create_migration_builder().unwrap()).await.unwrap();
    }

    let reopened = JsonFileStorage::open(&path).await.unwrap();
    assert_fully_migrated(&reopened.snapshot().await);
    assert!(!path.with_extension("tmp").exists());
}
