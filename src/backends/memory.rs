//! In-memory secret store for testing.
//!
//! This store keeps everything in memory and adds the hooks tests need:
//! a configurable page size to exercise pagination, a call log, and error
//! injection per operation (optionally per key).

use crate::registry::{BackendDescriptor, StorageRegistry};
use crate::storage::SecretsManagerStorage;
use crate::store::{SecretPage, SecretStore};
use crate::validation::validate_secret_name;
use crate::{Result, SecretEntry, SecretMatchError, TagSet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store operations, used to target error injection and to count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `list_secrets`
    List,
    /// `get_secret_value`
    Get,
    /// `secret_exists`
    Describe,
    /// `create_secret`
    Create,
    /// `put_secret_value`
    Put,
    /// `tag_resource`
    Tag,
    /// `delete_secret`
    Delete,
}

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `list_secrets(prefix, cursor)`
    List {
        prefix: String,
        cursor: Option<String>,
    },
    /// `get_secret_value(key)`
    Get(String),
    /// `secret_exists(key)`
    Describe(String),
    /// `create_secret(key, _, tags)`
    Create { key: String, tags: TagSet },
    /// `put_secret_value(key, _)`
    Put(String),
    /// `tag_resource(key, tags)`
    Tag { key: String, tags: TagSet },
    /// `delete_secret(key, window)`
    Delete {
        key: String,
        recovery_window_days: i64,
    },
}

impl StoreCall {
    /// The operation this call belongs to.
    pub fn operation(&self) -> Operation {
        match self {
            Self::List { .. } => Operation::List,
            Self::Get(_) => Operation::Get,
            Self::Describe(_) => Operation::Describe,
            Self::Create { .. } => Operation::Create,
            Self::Put(_) => Operation::Put,
            Self::Tag { .. } => Operation::Tag,
            Self::Delete { .. } => Operation::Delete,
        }
    }
}

/// Error to return from an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedError {
    /// Simulates expired or missing credentials
    Authentication,
    /// Simulates a missing secret
    NotFound,
    /// Simulates any other service failure
    Service(String),
}

impl InjectedError {
    fn to_error(&self, key: &str) -> SecretMatchError {
        match self {
            Self::Authentication => {
                SecretMatchError::authentication("The security token included in the request is expired")
            }
            Self::NotFound => SecretMatchError::NotFound(key.to_string()),
            Self::Service(msg) => SecretMatchError::Other(anyhow::anyhow!("{}", msg)),
        }
    }
}

#[derive(Debug, Clone)]
struct Failure {
    operation: Operation,
    key: Option<String>,
    error: InjectedError,
}

/// A secret scheduled for deletion.
#[derive(Debug, Clone)]
struct DeletedSecret {
    entry: SecretEntry,
    recovery_window_days: i64,
    deleted_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    secrets: BTreeMap<String, SecretEntry>,
    deleted: BTreeMap<String, DeletedSecret>,
    failures: Vec<Failure>,
    calls: Vec<StoreCall>,
}

/// In-memory secret store.
///
/// Cloning is cheap and clones share state, so a test can keep a handle while
/// the synchronizer owns another.
///
/// # Example
///
/// ```
/// use secretmatch::backends::memory::{InjectedError, MemorySecretStore, Operation};
/// use secretmatch::store::SecretStore;
///
/// #[tokio::main]
/// async fn main() -> secretmatch::Result<()> {
///     let store = MemorySecretStore::new();
///
///     // Pre-populate with test data
///     store.insert("match/certs/dev.cer", b"cert".to_vec()).await;
///
///     // Test error conditions
///     store.fail(Operation::Get, InjectedError::Authentication).await;
///
///     let result = store.get_secret_value("match/certs/dev.cer").await;
///     assert!(result.unwrap_err().is_authentication());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemorySecretStore {
    state: Arc<RwLock<State>>,
    page_size: usize,
}

impl MemorySecretStore {
    /// Default number of keys per listing page.
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many keys each `list_secrets` page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Pre-populates the store with a secret.
    pub async fn insert(&self, key: impl Into<String>, payload: Vec<u8>) {
        self.insert_with_tags(key, payload, TagSet::new()).await;
    }

    /// Pre-populates the store with a tagged secret.
    pub async fn insert_with_tags(&self, key: impl Into<String>, payload: Vec<u8>, tags: TagSet) {
        let entry = SecretEntry::new(key, payload, tags);
        let mut state = self.state.write().await;
        state.secrets.insert(entry.remote_key.clone(), entry);
    }

    /// Returns a live secret.
    pub async fn entry(&self, key: &str) -> Option<SecretEntry> {
        self.state.read().await.secrets.get(key).cloned()
    }

    /// Returns all live keys in order.
    pub async fn keys(&self) -> Vec<String> {
        self.state.read().await.secrets.keys().cloned().collect()
    }

    /// Returns the recovery window of a secret scheduled for deletion.
    pub async fn pending_deletion(&self, key: &str) -> Option<i64> {
        self.state
            .read()
            .await
            .deleted
            .get(key)
            .map(|d| d.recovery_window_days)
    }

    /// Cancels a scheduled deletion, making the secret live again.
    ///
    /// # Errors
    ///
    /// Returns [`SecretMatchError::NotFound`] if the key is not scheduled for
    /// deletion or its recovery window has passed.
    pub async fn restore(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let deleted = state
            .deleted
            .remove(key)
            .ok_or_else(|| SecretMatchError::NotFound(key.to_string()))?;

        let expires = deleted.deleted_at + chrono::Duration::days(deleted.recovery_window_days);
        if Utc::now() > expires {
            return Err(SecretMatchError::NotFound(key.to_string()));
        }
        state.secrets.insert(key.to_string(), deleted.entry);
        Ok(())
    }

    /// Makes every call to `operation` fail.
    pub async fn fail(&self, operation: Operation, error: InjectedError) {
        self.push_failure(operation, None, error).await;
    }

    /// Makes calls to `operation` fail for one key only.
    pub async fn fail_key(&self, operation: Operation, key: impl Into<String>, error: InjectedError) {
        self.push_failure(operation, Some(key.into()), error).await;
    }

    /// Removes all injected failures.
    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Returns every call made so far, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.state.read().await.calls.clone()
    }

    /// Counts calls to `operation`.
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forgets recorded calls.
    pub async fn reset_calls(&self) {
        self.state.write().await.calls.clear();
    }

    async fn push_failure(&self, operation: Operation, key: Option<String>, error: InjectedError) {
        self.state.write().await.failures.push(Failure {
            operation,
            key,
            error,
        });
    }

    /// Records `call` and returns the injected failure for it, if any.
    fn record(state: &mut State, call: StoreCall, key: &str) -> Result<()> {
        let operation = call.operation();
        state.calls.push(call);

        let failure = state.failures.iter().find(|f| {
            f.operation == operation && f.key.as_deref().map_or(true, |k| k == key)
        });
        match failure {
            Some(f) => Err(f.error.to_error(key)),
            None => Ok(()),
        }
    }
}

/// Registry key of the in-memory storage backend.
pub const BACKEND_TYPE: &str = "memory";

/// Registers the in-memory backend with `registry`.
///
/// Every storage created through the registry gets its own empty store.
pub fn register(registry: &mut StorageRegistry) {
    registry.register(BackendDescriptor {
        type_name: BACKEND_TYPE,
        options: crate::options::secrets_manager_options(),
        encryption: None,
        factory: |cfg| {
            let storage = SecretsManagerStorage::new(cfg, Arc::new(MemorySecretStore::new()))
                .with_backend_type(BACKEND_TYPE);
            Ok(Box::new(storage))
        },
    });
}

impl Default for MemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_secrets(&self, prefix_filter: &str, cursor: Option<&str>) -> Result<SecretPage> {
        let mut state = self.state.write().await;
        Self::record(
            &mut state,
            StoreCall::List {
                prefix: prefix_filter.to_string(),
                cursor: cursor.map(str::to_string),
            },
            prefix_filter,
        )?;

        let mut matching = state
            .secrets
            .keys()
            .filter(|k| k.starts_with(prefix_filter))
            .filter(|k| cursor.map_or(true, |c| k.as_str() > c));

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_cursor = match (matching.next(), keys.last()) {
            (Some(_), Some(last)) => Some(last.clone()),
            _ => None,
        };

        Ok(SecretPage { keys, next_cursor })
    }

    async fn get_secret_value(&self, key: &str) -> Result<Vec<u8>> {
        let mut state = self.state.write().await;
        Self::record(&mut state, StoreCall::Get(key.to_string()), key)?;

        state
            .secrets
            .get(key)
            .map(|e| e.payload.clone())
            .ok_or_else(|| SecretMatchError::NotFound(key.to_string()))
    }

    async fn secret_exists(&self, key: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        Self::record(&mut state, StoreCall::Describe(key.to_string()), key)?;
        Ok(state.secrets.contains_key(key))
    }

    async fn create_secret(&self, key: &str, payload: &[u8], tags: &TagSet) -> Result<()> {
        validate_secret_name(key)?;

        let mut state = self.state.write().await;
        Self::record(
            &mut state,
            StoreCall::Create {
                key: key.to_string(),
                tags: tags.clone(),
            },
            key,
        )?;

        if state.secrets.contains_key(key) {
            return Err(SecretMatchError::AlreadyExists(key.to_string()));
        }
        if state.deleted.contains_key(key) {
            return Err(SecretMatchError::Other(anyhow::anyhow!(
                "{} is scheduled for deletion",
                key
            )));
        }

        let entry = SecretEntry::new(key, payload.to_vec(), tags.clone());
        state.secrets.insert(key.to_string(), entry);
        Ok(())
    }

    async fn put_secret_value(&self, key: &str, payload: &[u8]) -> Result<()> {
        let mut state = self.state.write().await;
        Self::record(&mut state, StoreCall::Put(key.to_string()), key)?;

        let entry = state
            .secrets
            .get_mut(key)
            .ok_or_else(|| SecretMatchError::NotFound(key.to_string()))?;
        entry.replace_payload(payload.to_vec());
        Ok(())
    }

    async fn tag_resource(&self, key: &str, tags: &TagSet) -> Result<()> {
        let mut state = self.state.write().await;
        Self::record(
            &mut state,
            StoreCall::Tag {
                key: key.to_string(),
                tags: tags.clone(),
            },
            key,
        )?;

        let entry = state
            .secrets
            .get_mut(key)
            .ok_or_else(|| SecretMatchError::NotFound(key.to_string()))?;
        entry.merge_tags(tags);
        Ok(())
    }

    async fn delete_secret(&self, key: &str, recovery_window_days: i64) -> Result<()> {
        let mut state = self.state.write().await;
        Self::record(
            &mut state,
            StoreCall::Delete {
                key: key.to_string(),
                recovery_window_days,
            },
            key,
        )?;

        let entry = state
            .secrets
            .remove(key)
            .ok_or_else(|| SecretMatchError::NotFound(key.to_string()))?;
        state.deleted.insert(
            key.to_string(),
            DeletedSecret {
                entry,
                recovery_window_days,
                deleted_at: Utc::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemorySecretStore::new();
        let tags = TagSet::from([("Name".to_string(), "Alice".to_string())]);

        store
            .create_secret("match/a.cer", b"cert", &tags)
            .await
            .unwrap();

        assert_eq!(store.get_secret_value("match/a.cer").await.unwrap(), b"cert");
        assert_eq!(store.entry("match/a.cer").await.unwrap().tags, tags);
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let store = MemorySecretStore::new();
        store.insert("match/a.cer", b"cert".to_vec()).await;

        let result = store.create_secret("match/a.cer", b"x", &TagSet::new()).await;
        assert!(matches!(result, Err(SecretMatchError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_put_keeps_tags_and_tag_merges() {
        let store = MemorySecretStore::new();
        store
            .insert_with_tags(
                "match/a.cer",
                b"old".to_vec(),
                TagSet::from([("Team".to_string(), "ios".to_string())]),
            )
            .await;

        store.put_secret_value("match/a.cer", b"new").await.unwrap();
        store
            .tag_resource(
                "match/a.cer",
                &TagSet::from([("Name".to_string(), "Alice".to_string())]),
            )
            .await
            .unwrap();

        let entry = store.entry("match/a.cer").await.unwrap();
        assert_eq!(entry.payload, b"new");
        assert_eq!(entry.tags.len(), 2);
    }

    #[tokio::test]
    async fn test_pagination() {
        let store = MemorySecretStore::new().with_page_size(2);
        for name in ["a", "b", "c", "d", "e"] {
            store.insert(format!("match/{name}"), Vec::new()).await;
        }
        store.insert("other/z", Vec::new()).await;

        let first = store.list_secrets("match", None).await.unwrap();
        assert_eq!(first.keys, vec!["match/a", "match/b"]);
        let second = store
            .list_secrets("match", first.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["match/c", "match/d"]);
        let third = store
            .list_secrets("match", second.next_cursor.as_deref())
            .await
            .unwrap();
        assert_eq!(third.keys, vec!["match/e"]);
        assert_eq!(third.next_cursor, None);
    }

    #[tokio::test]
    async fn test_exact_page_multiple_has_no_trailing_cursor() {
        let store = MemorySecretStore::new().with_page_size(2);
        store.insert("match/a", Vec::new()).await;
        store.insert("match/b", Vec::new()).await;

        let page = store.list_secrets("match", None).await.unwrap();
        assert_eq!(page.keys.len(), 2);
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_soft_delete_and_restore() {
        let store = MemorySecretStore::new();
        store.insert("match/a.cer", b"cert".to_vec()).await;

        store.delete_secret("match/a.cer", 7).await.unwrap();
        assert!(!store.secret_exists("match/a.cer").await.unwrap());
        assert_eq!(store.pending_deletion("match/a.cer").await, Some(7));

        store.restore("match/a.cer").await.unwrap();
        assert_eq!(store.get_secret_value("match/a.cer").await.unwrap(), b"cert");
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = MemorySecretStore::new();
        let result = store.delete_secret("match/missing", 7).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_error_injection_per_key() {
        let store = MemorySecretStore::new();
        store.insert("match/a", Vec::new()).await;
        store.insert("match/b", Vec::new()).await;
        store
            .fail_key(Operation::Get, "match/b", InjectedError::Service("throttled".into()))
            .await;

        assert!(store.get_secret_value("match/a").await.is_ok());
        assert!(store.get_secret_value("match/b").await.is_err());

        store.clear_failures().await;
        assert!(store.get_secret_value("match/b").await.is_ok());
        assert_eq!(store.call_count(Operation::Get).await, 3);
    }
}
