//! Secret store capability interface.
//!
//! This module defines the [`SecretStore`] trait the synchronizer talks to.
//! It covers the operations needed to mirror a file tree and exposes no
//! vendor SDK types.

use crate::{Result, TagSet};
use async_trait::async_trait;

/// Retention window applied when soft-deleting secrets.
pub const DEFAULT_RECOVERY_WINDOW_DAYS: i64 = 7;

/// One page of a secret listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretPage {
    /// Full remote keys on this page
    pub keys: Vec<String>,
    /// Cursor for the next page; `None` when the listing is complete
    pub next_cursor: Option<String>,
}

/// A remote key/value secret store.
///
/// All implementations must be `Send + Sync` so per-file work can fan out
/// across async tasks.
///
/// # Errors
///
/// Every operation may fail with
/// [`SecretMatchError::Authentication`](crate::SecretMatchError::Authentication)
/// when credentials are missing or expired. Implementations must report it as
/// that variant (optionally wrapped in
/// [`StoreOperation`](crate::SecretMatchError::StoreOperation)) so callers can
/// abort instead of retrying per file.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the store name (e.g., "awssecrets", "memory").
    fn name(&self) -> &str;

    /// Lists one page of secrets whose name starts with `prefix_filter`.
    ///
    /// Pass the previous page's `next_cursor` to continue; `None` starts over.
    async fn list_secrets(&self, prefix_filter: &str, cursor: Option<&str>) -> Result<SecretPage>;

    /// Retrieves the binary payload of a secret.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::NotFound`](crate::SecretMatchError::NotFound):
    ///   Secret does not exist
    async fn get_secret_value(&self, key: &str) -> Result<Vec<u8>>;

    /// Checks if a secret exists.
    async fn secret_exists(&self, key: &str) -> Result<bool>;

    /// Creates a new secret with tags.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::AlreadyExists`](crate::SecretMatchError::AlreadyExists):
    ///   A secret with this key already exists
    async fn create_secret(&self, key: &str, payload: &[u8], tags: &TagSet) -> Result<()>;

    /// Replaces the payload of an existing secret, leaving its tags alone.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::NotFound`](crate::SecretMatchError::NotFound):
    ///   Secret does not exist
    async fn put_secret_value(&self, key: &str, payload: &[u8]) -> Result<()>;

    /// Adds or overwrites tags on a secret. Tags not named in `tags` are kept.
    async fn tag_resource(&self, key: &str, tags: &TagSet) -> Result<()>;

    /// Schedules a secret for deletion after `recovery_window_days`.
    ///
    /// # Errors
    ///
    /// - [`SecretMatchError::NotFound`](crate::SecretMatchError::NotFound):
    ///   Secret does not exist
    async fn delete_secret(&self, key: &str, recovery_window_days: i64) -> Result<()>;
}
