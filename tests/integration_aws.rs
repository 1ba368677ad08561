//! AWS Secrets Manager integration tests using LocalStack.
//!
//! These tests require LocalStack to be running on localhost:4566.
//!
//! Run with:
//!   docker run -d -p 4566:4566 localstack/localstack
//!   cargo test --test integration_aws --features aws -- --ignored
//!
//! Or run in CI where LocalStack is configured as a service.

#![cfg(feature = "aws")]

use secretmatch::backends::aws::AwsSecretsStore;
use secretmatch::store::{SecretStore, DEFAULT_RECOVERY_WINDOW_DAYS};
use secretmatch::{FileAction, StorageConfig, Synchronizer, TagSet};
use std::path::Path;
use std::sync::Arc;

fn aws_config(prefix: &str) -> StorageConfig {
    let endpoint = std::env::var("LOCALSTACK_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4566".to_string());

    StorageConfig::default()
        .with_region("us-east-1")
        .with_endpoint(endpoint)
        .with_path_prefix(prefix)
}

fn setup_store(config: &StorageConfig) -> Arc<AwsSecretsStore> {
    std::env::set_var("AWS_ACCESS_KEY_ID", "test");
    std::env::set_var("AWS_SECRET_ACCESS_KEY", "test");
    std::env::set_var("AWS_REGION", "us-east-1");

    Arc::new(AwsSecretsStore::new(config))
}

/// A prefix no other test run uses.
fn unique_prefix(test: &str) -> String {
    format!("secretmatch-it/{}-{}", test, chrono::Utc::now().timestamp_millis())
}

async fn cleanup(store: &AwsSecretsStore, prefix: &str) {
    let mut cursor: Option<String> = None;
    loop {
        let Ok(page) = store.list_secrets(prefix, cursor.as_deref()).await else {
            return;
        };
        for key in page.keys {
            store.delete_secret(&key, DEFAULT_RECOVERY_WINDOW_DAYS).await.ok();
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return,
        }
    }
}

fn write_file(root: &Path, relative: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
#[ignore] // Run only when LocalStack is available
async fn test_aws_create_and_get() {
    let prefix = unique_prefix("create");
    let store = setup_store(&aws_config(&prefix));
    let key = format!("{prefix}/certs/a.p12");

    // Create secret
    store
        .create_secret(&key, b"\x00binary\xff", &TagSet::new())
        .await
        .expect("Failed to create secret");

    // Retrieve secret
    let retrieved = store
        .get_secret_value(&key)
        .await
        .expect("Failed to get secret");
    assert_eq!(retrieved, b"\x00binary\xff");
    assert!(store.secret_exists(&key).await.unwrap());

    // Clean up
    cleanup(&store, &prefix).await;
}

#[tokio::test]
#[ignore]
async fn test_aws_missing_secret() {
    let prefix = unique_prefix("missing");
    let store = setup_store(&aws_config(&prefix));
    let key = format!("{prefix}/nope.cer");

    assert!(!store.secret_exists(&key).await.unwrap());
    assert!(store.get_secret_value(&key).await.unwrap_err().is_not_found());
    assert!(store
        .delete_secret(&key, DEFAULT_RECOVERY_WINDOW_DAYS)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
#[ignore]
async fn test_aws_sync_round_trip() {
    let prefix = unique_prefix("roundtrip");
    let config = aws_config(&prefix).with_tag("Project", "secretmatch");
    let store = setup_store(&config);

    // Upload from one session
    let mut first = Synchronizer::new(store.clone(), &config);
    first.download().await.expect("Failed to download");
    let root = first.working_directory().unwrap().to_path_buf();
    let files = vec![
        write_file(&root, "TEAM/certs/development/A.p12", b"key"),
        write_file(&root, "TEAM/certs/development/A.cer", b"not really a cert"),
    ];
    let report = first.upload_files(&files).await.expect("Failed to upload");
    assert_eq!(report.count(FileAction::Created), 2);
    first.clear_changes().unwrap();

    // Download into a second session
    let mut second = Synchronizer::new(store.clone(), &config);
    second.download().await.expect("Failed to download");
    let root = second.working_directory().unwrap();
    assert_eq!(
        std::fs::read(root.join("TEAM/certs/development/A.p12")).unwrap(),
        b"key"
    );

    // Update and delete
    let changed = write_file(root, "TEAM/certs/development/A.p12", b"new key");
    let report = second.upload_files(&[changed.clone()]).await.unwrap();
    assert_eq!(report.count(FileAction::Updated), 1);

    let report = second.delete_files(&[changed]).await.unwrap();
    assert_eq!(report.count(FileAction::Deleted), 1);

    // Clean up
    cleanup(&store, &prefix).await;
}

#[tokio::test]
#[ignore]
async fn test_aws_pagination() {
    let prefix = unique_prefix("pages");
    let store = setup_store(&aws_config(&prefix));

    for i in 0..105 {
        store
            .create_secret(&format!("{prefix}/certs/{i:03}.cer"), b"x", &TagSet::new())
            .await
            .expect("Failed to create secret");
    }

    let mut sync = Synchronizer::new(store.clone(), &aws_config(&prefix).with_concurrency(8));
    sync.download().await.expect("Failed to download");
    assert_eq!(sync.list_files(Some("certs"), "*", "cer").unwrap().len(), 105);

    cleanup(&store, &prefix).await;
}
